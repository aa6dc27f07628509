//! 错误类型
//!
//! 工具错误不走这里：它们是 ToolOutcome::Failure，作为数据回传给 LLM。
//! AgentError 只覆盖启动/配置阶段与传输层等致命错误。

use std::path::PathBuf;

use thiserror::Error;

use crate::llm::LlmError;

/// 致命错误：启动、配置、凭证、LLM 传输
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("API keys file not found at {}", .0.display())]
    CredentialsFileNotFound(PathBuf),

    #[error("Provider '{provider}' not found in {}", .path.display())]
    ProviderNotFound { provider: String, path: PathBuf },

    #[error("No requirements given: set workflow.requirements or workflow.requirements_file")]
    MissingRequirements,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

impl From<config::ConfigError> for AgentError {
    fn from(e: config::ConfigError) -> Self {
        AgentError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = AgentError::ProviderNotFound {
            provider: "anthropic".into(),
            path: PathBuf::from("/tmp/keys"),
        };
        assert_eq!(e.to_string(), "Provider 'anthropic' not found in /tmp/keys");

        let e: AgentError = LlmError::EmptyResponse.into();
        assert!(e.to_string().starts_with("LLM error"));
    }

    #[test]
    fn test_config_error_converts() {
        let e: AgentError = config::ConfigError::Message("missing field `kind`".into()).into();
        assert!(matches!(e, AgentError::Config(_)));
        assert_eq!(e.to_string(), "Config error: missing field `kind`");
    }
}
