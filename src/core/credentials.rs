//! API Key 加载
//!
//! 文件格式：每行 `<provider>:<api_key>`，空行与 `#` 开头的行跳过，provider 名大小写不敏感。

use std::path::{Path, PathBuf};

use crate::core::AgentError;

/// 默认凭证文件 ~/.llm_keys
pub fn default_keys_file() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".llm_keys")
}

/// 读取指定 provider 的 key；文件不存在或 provider 缺失都是启动期致命错误
pub fn load_api_key(keys_file: &Path, provider: &str) -> Result<String, AgentError> {
    if !keys_file.exists() {
        return Err(AgentError::CredentialsFileNotFound(keys_file.to_path_buf()));
    }
    let content = std::fs::read_to_string(keys_file)?;
    parse_api_key(&content, provider).ok_or_else(|| AgentError::ProviderNotFound {
        provider: provider.to_string(),
        path: keys_file.to_path_buf(),
    })
}

fn parse_api_key(content: &str, provider: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(provider))
        .map(|(_, key)| key.trim().to_string())
}
