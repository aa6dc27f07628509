//! LLM 层：请求/响应类型、客户端抽象与实现（Anthropic / Scripted Mock）

pub mod anthropic;
pub mod mock;
pub mod traits;
pub mod types;

pub use anthropic::AnthropicClient;
pub use mock::ScriptedLlmClient;
pub use traits::{LlmClient, LlmError};
pub use types::{LlmRequest, LlmResponse, StopReason, ToolChoice, ToolDefinition, Usage};
