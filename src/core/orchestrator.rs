//! 多角色编排
//!
//! - player/coach：player 在同一条对话上反复工作，coach 每轮用全新对话评审，最多 max_attempts 轮；
//! - pipeline：按固定顺序运行若干角色（如 证明写作 → 翻译 → 验证），每个角色全新对话，
//!   最后一个角色的结果按标记判定；被拒时把反馈与产物文件内容追加进任务，从头重跑。
//!
//! 未完成的会话不会中止编排：其结果 "Task execution incomplete" 照常交给下一个角色，
//! 由评审结论与尝试次数上限决定最终结果。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::llm::LlmClient;
use crate::memory::{Conversation, MessageLog, Turn};
use crate::session::{SessionConfig, SessionDriver, SessionOutcome};
use crate::tools::ToolExecutor;

/// coach 批准时 final_output 的精确内容（去首尾空白后比较）
pub const APPROVAL_VERDICT: &str = "IMPLEMENTATION_APPROVED";
pub const COACH_FEEDBACK_PREFIX: &str = "Coach feedback: Please fix this. \n\n";
pub const EXPLANATION_ACCEPTED: &str = "{{{EXPLANATION_ACCEPTED}}}";
pub const EXPLANATION_REJECTED: &str = "{{{EXPLANATION_REJECTED}}}";

/// 评审结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected,
}

impl Verdict {
    /// coach：只有精确的批准词才算通过
    pub fn from_coach(text: &str) -> Self {
        if text.trim() == APPROVAL_VERDICT {
            Self::Accepted
        } else {
            Self::Rejected
        }
    }

    /// 标记判定：包含 accept 且不包含 reject 才算通过
    pub fn from_markers(text: &str, accept: &str, reject: &str) -> Self {
        if text.contains(accept) && !text.contains(reject) {
            Self::Accepted
        } else {
            Self::Rejected
        }
    }
}

/// 编排结果
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestrationResult {
    /// 评审通过；result 为最后一个被评审的产出
    Approved { result: String, attempts: usize },
    /// 用尽尝试次数；feedback 为最后一次评审意见
    GaveUp { feedback: String, attempts: usize },
    /// 无评审者可纠正的会话未完成（仅 autocoding 关闭时的 player）
    Failed { role: String, reason: String },
    /// 未启用 autocoding，player 完成后直接结束
    PlayerOnly(String),
}

impl OrchestrationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Approved { .. } | Self::PlayerOnly(_))
    }
}

/// player/coach 流程的输入
#[derive(Debug, Clone)]
pub struct PlayerCoachSetup {
    pub requirements: String,
    pub player_system: String,
    pub coach_system: String,
    pub coach_preamble: String,
    pub player: SessionConfig,
    pub coach: SessionConfig,
    pub autocoding: bool,
}

/// 流水线中的一个角色
#[derive(Debug, Clone)]
pub struct RoleSpec {
    pub system: String,
    /// 首条用户消息的开头
    pub preamble: String,
    pub session: SessionConfig,
    /// 为 true 时首条消息附带产物文件的当前内容
    pub include_artifact: bool,
}

/// 固定顺序的角色链
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub roles: Vec<RoleSpec>,
    pub accept_marker: String,
    pub reject_marker: String,
    /// 被拒时附加到任务中的产物文件
    pub artifact: Option<PathBuf>,
}

pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    executor: Arc<ToolExecutor>,
    max_attempts: usize,
    log_path: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, executor: Arc<ToolExecutor>, max_attempts: usize) -> Self {
        Self {
            llm,
            executor,
            max_attempts: max_attempts.max(1),
            log_path: None,
        }
    }

    /// 每个会话的对话都镜像到该 JSONL 文件，以角色标签区分
    pub fn with_message_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    fn conversation(&self, label: &str) -> Conversation {
        match &self.log_path {
            Some(path) => Conversation::new().with_log(MessageLog::new(path, label)),
            None => Conversation::new(),
        }
    }

    async fn run_session(
        &self,
        config: &SessionConfig,
        conversation: &mut Conversation,
        system: &str,
        task_text: &str,
    ) -> SessionOutcome {
        SessionDriver::new(self.llm.as_ref(), self.executor.as_ref(), config.clone())
            .run(conversation, system, task_text)
            .await
    }

    /// 运行一个会话并取其角色结果；未完成的会话以 "Task execution incomplete" 交给下一个角色
    async fn run_role(
        &self,
        config: &SessionConfig,
        conversation: &mut Conversation,
        system: &str,
        task_text: &str,
    ) -> String {
        let outcome = self.run_session(config, conversation, system, task_text).await;
        if let SessionOutcome::Incomplete(reason) = &outcome {
            tracing::warn!(role = %config.label, reason = %reason, "session incomplete, passing result on");
        }
        outcome.into_role_result()
    }

    pub async fn run_player_coach(&self, setup: &PlayerCoachSetup) -> OrchestrationResult {
        let mut player_conv = self.conversation(&setup.player.label);
        player_conv.push(Turn::user(setup.requirements.clone()));

        tracing::info!(model = %setup.player.model, "player session");
        if !setup.autocoding {
            let outcome = self
                .run_session(&setup.player, &mut player_conv, &setup.player_system, &setup.requirements)
                .await;
            tracing::info!("autocoding disabled, exiting after player completion");
            // 没有评审者，未完成的 player 会话无法再被纠正
            return match outcome {
                SessionOutcome::Incomplete(reason) => OrchestrationResult::Failed {
                    role: setup.player.label.clone(),
                    reason: reason.to_string(),
                },
                other => OrchestrationResult::PlayerOnly(other.into_role_result()),
            };
        }

        let mut summary = self
            .run_role(&setup.player, &mut player_conv, &setup.player_system, &setup.requirements)
            .await;

        let mut feedback = String::new();
        for attempt in 1..=self.max_attempts {
            tracing::info!(
                model = %setup.coach.model,
                attempt,
                max_attempts = self.max_attempts,
                "coach session"
            );
            let mut coach_conv = self.conversation(&setup.coach.label);
            coach_conv.push(Turn::user(format!(
                "{}\n\n{}\n\n{}",
                setup.coach_preamble, setup.requirements, summary
            )));
            let verdict = self
                .run_role(&setup.coach, &mut coach_conv, &setup.coach_system, &setup.requirements)
                .await;

            tracing::info!(verdict = %verdict, "coach verdict");
            if Verdict::from_coach(&verdict) == Verdict::Accepted {
                tracing::info!(attempt, "implementation approved by coach");
                return OrchestrationResult::Approved {
                    result: summary,
                    attempts: attempt,
                };
            }

            tracing::info!(attempt, "player session with coach feedback");
            player_conv.push(Turn::user(format!("{COACH_FEEDBACK_PREFIX}{verdict}")));
            feedback = verdict;
            summary = self
                .run_role(&setup.player, &mut player_conv, &setup.player_system, &setup.requirements)
                .await;
        }

        tracing::warn!(attempts = self.max_attempts, "giving up after {} attempts", self.max_attempts);
        OrchestrationResult::GaveUp {
            feedback,
            attempts: self.max_attempts,
        }
    }

    pub async fn run_pipeline(&self, pipeline: &Pipeline, task: &str) -> OrchestrationResult {
        let mut task = task.to_string();
        let mut feedback = String::new();

        for attempt in 1..=self.max_attempts {
            let mut previous: Option<String> = None;
            for role in &pipeline.roles {
                tracing::info!(role = %role.session.label, attempt, "pipeline role");
                let mut message = format!("{}\n\n{}", role.preamble, task);
                if role.include_artifact {
                    if let Some(path) = &pipeline.artifact {
                        message.push_str(&artifact_section(path).await);
                    }
                }
                if let Some(prev) = &previous {
                    message.push_str("\n\n");
                    message.push_str(prev);
                }

                let mut conversation = self.conversation(&role.session.label);
                conversation.push(Turn::user(message));
                let result = self
                    .run_role(&role.session, &mut conversation, &role.system, &task)
                    .await;
                previous = Some(result);
            }

            let result = previous.unwrap_or_default();
            let verdict =
                Verdict::from_markers(&result, &pipeline.accept_marker, &pipeline.reject_marker);
            tracing::info!(attempt, verdict = ?verdict, "pipeline verdict");
            if verdict == Verdict::Accepted {
                return OrchestrationResult::Approved {
                    result,
                    attempts: attempt,
                };
            }

            task = augment_task(&task, &result, pipeline.artifact.as_deref()).await;
            feedback = result;
        }

        tracing::warn!(attempts = self.max_attempts, "giving up after {} attempts", self.max_attempts);
        OrchestrationResult::GaveUp {
            feedback,
            attempts: self.max_attempts,
        }
    }
}

async fn artifact_section(path: &Path) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => format!(
            "\n\nCurrent contents of {}:\n```\n{}\n```",
            path.display(),
            contents.trim_end()
        ),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "artifact not readable");
            format!("\n\n{} could not be read: {e}", path.display())
        }
    }
}

/// 被拒后的任务：原任务 + 反馈 + 产物内容
pub async fn augment_task(task: &str, feedback: &str, artifact: Option<&Path>) -> String {
    let mut out = format!(
        "{task}\n\nA previous attempt was rejected with this feedback:\n{feedback}"
    );
    if let Some(path) = artifact {
        out.push_str(&artifact_section(path).await);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coach_verdict_is_exact() {
        assert_eq!(Verdict::from_coach("  IMPLEMENTATION_APPROVED\n"), Verdict::Accepted);
        assert_eq!(
            Verdict::from_coach("IMPLEMENTATION_APPROVED but add tests"),
            Verdict::Rejected
        );
    }

    #[test]
    fn test_marker_verdict() {
        let v = |t: &str| Verdict::from_markers(t, EXPLANATION_ACCEPTED, EXPLANATION_REJECTED);
        assert_eq!(v("{{{EXPLANATION_ACCEPTED}}}"), Verdict::Accepted);
        assert_eq!(v("{{{EXPLANATION_REJECTED}}} wrong lemma"), Verdict::Rejected);
        assert_eq!(v("no marker at all"), Verdict::Rejected);
    }

    #[tokio::test]
    async fn test_augment_task_grows() {
        let dir = tempfile::tempdir().unwrap();
        let proof = dir.path().join("Main.lean");
        std::fs::write(&proof, "theorem t : True := trivial\n").unwrap();

        let once = augment_task("prove it", "too weak", Some(&proof)).await;
        assert!(once.starts_with("prove it"));
        assert!(once.contains("too weak"));
        assert!(once.contains("theorem t : True := trivial"));

        let twice = augment_task(&once, "still weak", Some(&proof)).await;
        assert!(twice.len() > once.len());
        assert!(twice.starts_with(&once));

        let missing = augment_task("t", "f", Some(&dir.path().join("nope.lean"))).await;
        assert!(missing.contains("could not be read"));
    }
}
