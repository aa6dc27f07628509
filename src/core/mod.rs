//! 核心层：错误类型、凭证、运行目录、多角色编排

pub mod credentials;
pub mod error;
pub mod orchestrator;
pub mod workdir;

pub use credentials::{default_keys_file, load_api_key};
pub use error::AgentError;
pub use orchestrator::{
    augment_task, OrchestrationResult, Orchestrator, Pipeline, PlayerCoachSetup, RoleSpec,
    Verdict, APPROVAL_VERDICT, COACH_FEEDBACK_PREFIX, EXPLANATION_ACCEPTED, EXPLANATION_REJECTED,
};
pub use workdir::{create_run_dir, default_work_root};
