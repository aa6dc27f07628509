//! 对话日志：按时间顺序追加的 Turn 序列
//!
//! 只提供 push 与只读访问，不允许重排或修改已追加的 Turn；可挂载 MessageLog，
//! 每次追加同步写入旁路日志（审计用）。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::MessageLog;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// 内容片段：LLM 产出（Text / Thinking / RedactedThinking / ToolInvocation）或本地合成（ToolResult）
///
/// 序列化格式即 Messages API 的 content block，`type` 为标签。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentSegment {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// 被服务端加密的思考块；原样回传，不可修改
    RedactedThinking {
        data: String,
    },
    #[serde(rename = "tool_use")]
    ToolInvocation {
        #[serde(rename = "id")]
        invocation_id: String,
        name: String,
        #[serde(rename = "input")]
        parameters: Value,
    },
    ToolResult {
        #[serde(rename = "tool_use_id")]
        invocation_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    /// 无法识别的标签；由 TurnProcessor 标记为失败，且不会回传给 LLM
    #[serde(other)]
    Unrecognized,
}

impl ContentSegment {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// 片段的线上类型名（日志与失败键使用）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Thinking { .. } => "thinking",
            Self::RedactedThinking { .. } => "redacted_thinking",
            Self::ToolInvocation { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Turn 的内容：单段文本，或有序的片段列表
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Segments(Vec<ContentSegment>),
}

/// 对话中的一条记录
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(text.into()),
        }
    }

    pub fn user_segments(segments: Vec<ContentSegment>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Segments(segments),
        }
    }

    pub fn assistant_segments(segments: Vec<ContentSegment>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Segments(segments),
        }
    }

    /// 拼接所有 Text 内容（用于摘要、判定等）
    pub fn text(&self) -> String {
        match &self.content {
            TurnContent::Text(t) => t.clone(),
            TurnContent::Segments(segments) => segments
                .iter()
                .filter_map(|s| match s {
                    ContentSegment::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// 追加式对话：push 时同步镜像到可选的 MessageLog
#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
    log: Option<MessageLog>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(mut self, log: MessageLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn push(&mut self, turn: Turn) {
        if let Some(log) = &self.log {
            // 日志写失败不影响会话
            if let Err(e) = log.append(&turn) {
                tracing::warn!(error = %e, "message log append failed");
            }
        }
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
