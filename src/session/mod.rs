//! 会话层：错误策略、单轮处理、会话驱动

pub mod driver;
pub mod policy;
pub mod turn;

pub use driver::{
    lockout_message, CompletionGate, IncompleteReason, RoleKind, SessionConfig, SessionDriver,
    SessionOutcome, INCOMPLETE_RESULT, MISSING_COMPLETION_RESULT, SUMMARY_PLACEHOLDER,
};
pub use policy::{ErrorPolicy, PolicyThresholds, ToolCallKey};
pub use turn::{TurnProcessor, TurnReport};
