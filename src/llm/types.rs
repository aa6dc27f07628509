//! LLM 请求 / 响应数据结构
//!
//! 与 Messages API 对齐：content 为 ContentSegment 列表，stop_reason 为封闭集合。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::memory::{ContentSegment, Turn};

/// 工具目录中的一项（名称、描述、输入 JSON Schema）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// 工具选择模式：Auto 为正常，None 为本次调用禁用工具（锁定后使用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    None,
}

/// 一次 LLM 调用的完整请求
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system: String,
    pub turns: Vec<Turn>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    /// 思考预算（token）；None 表示不启用
    pub thinking_budget: Option<u32>,
}

impl LlmRequest {
    pub fn tools_enabled(&self) -> bool {
        self.tool_choice == ToolChoice::Auto
    }
}

/// Token 使用统计（单次调用）
///
/// 计数字段缺失或为 null 时都按 0 处理。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, deserialize_with = "null_as_zero")]
    pub input_tokens: u64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub output_tokens: u64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub cache_read_input_tokens: u64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub cache_creation_input_tokens: u64,
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens
            + self.output_tokens
            + self.cache_read_input_tokens
            + self.cache_creation_input_tokens
    }
}

/// 停止原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ContextWindowExceeded,
    StopSequence,
    ToolUse,
    Other(String),
}

impl StopReason {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "end_turn" => Self::EndTurn,
            "max_tokens" => Self::MaxTokens,
            "model_context_window_exceeded" => Self::ContextWindowExceeded,
            "stop_sequence" => Self::StopSequence,
            "tool_use" => Self::ToolUse,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::EndTurn => "end_turn",
            Self::MaxTokens => "max_tokens",
            Self::ContextWindowExceeded => "model_context_window_exceeded",
            Self::StopSequence => "stop_sequence",
            Self::ToolUse => "tool_use",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次 LLM 调用的响应
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: Vec<ContentSegment>,
    pub usage: Usage,
    pub stop_reason: StopReason,
}

impl LlmResponse {
    /// 第一段文本（摘要调用取这个）
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|s| match s {
            ContentSegment::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }
}
