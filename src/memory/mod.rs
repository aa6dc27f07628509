//! 记忆层：追加式对话与旁路消息日志

pub mod conversation;
pub mod message_log;

pub use conversation::{ContentSegment, Conversation, Role, Turn, TurnContent};
pub use message_log::MessageLog;
