//! duet - 双角色（player / coach）LLM 智能体控制循环
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、凭证、运行目录、多角色编排
//! - **llm**: 请求/响应类型、LlmClient 抽象、Anthropic 客户端与脚本化 Mock
//! - **memory**: 追加式对话与 JSONL 消息日志
//! - **observability**: tracing 初始化
//! - **prompts**: 角色提示词（内置 + 文件覆盖）
//! - **session**: 错误/温度策略、单轮处理、会话驱动状态机
//! - **tools**: 工具注册表、执行器与内置工具

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod prompts;
pub mod session;
pub mod tools;

pub use crate::core::{AgentError, OrchestrationResult, Orchestrator};
pub use crate::session::{SessionConfig, SessionDriver, SessionOutcome};
