//! LLM 客户端抽象
//!
//! 所有后端（Anthropic / Scripted Mock）实现 LlmClient：send 为阻塞式请求-响应，
//! 响应完整接收后才做本地处理，不与工具调度交错。

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::{LlmRequest, LlmResponse};

/// 传输 / 服务端错误；会话对此不重试，直接以 Incomplete 结束
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("provider returned no response")]
    EmptyResponse,
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 发送一次完整请求，返回完整响应
    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;
}
