//! 会话驱动：SENDING → PROCESSING → {CONTINUE | RETRY | ESCALATE_LOCKOUT | TERMINATE}
//!
//! 每轮：整段对话发给 LLM → 记录 usage → 追加 assistant 轮 → TurnProcessor 执行工具 →
//! ErrorPolicy 更新温度 / 失败历史 → 按优先级决定下一步。
//! 主角色（Primary）在 end_turn 后追加一次无工具的摘要调用；评审角色（Review）返回完成工具的 payload。

use std::collections::HashSet;

use tracing::Instrument;

use crate::llm::{LlmClient, LlmError, LlmRequest, ToolChoice, Usage};
use crate::memory::{ContentSegment, Conversation, Turn};
use crate::session::{ErrorPolicy, PolicyThresholds, ToolCallKey, TurnProcessor};
use crate::tools::{ToolExecutor, FINAL_OUTPUT_TOOL};

/// 会话在 Incomplete 时回交给下一个角色的文本
pub const INCOMPLETE_RESULT: &str = "Task execution incomplete";
/// 摘要调用没有文本时的占位
pub const SUMMARY_PLACEHOLDER: &str = "Task completed";
pub const MISSING_COMPLETION_RESULT: &str =
    "ERROR: review role requires calling the final_output tool";

const DEFAULT_SUMMARY_PROMPT: &str = "Please provide a concise summary report of the work you have completed: \
which files were created or changed, what each change does, how it was tested, and anything left unfinished.";

/// 角色种类：决定 end_turn 后如何收尾
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    /// 做事的角色：结束后请求一次摘要
    Primary,
    /// 评审角色：必须调用完成工具
    Review,
}

/// 完成门槛：任务文本命中触发短语时，必须先调用 tool 才允许结束
#[derive(Debug, Clone)]
pub struct CompletionGate {
    pub tool: String,
    pub triggers: Vec<String>,
    pub reminder: String,
}

impl CompletionGate {
    /// 大小写不敏感的子串匹配
    pub fn applies_to(&self, task_text: &str) -> bool {
        let task = task_text.to_lowercase();
        self.triggers
            .iter()
            .any(|t| !t.is_empty() && task.contains(&t.to_lowercase()))
    }
}

/// 单个会话的参数
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 日志 / span 中的角色标签，如 "player"、"coach"
    pub label: String,
    pub role: RoleKind,
    pub model: String,
    pub max_tokens: u32,
    pub context_window: u64,
    pub baseline_temperature: f32,
    pub thinking_budget: Option<u32>,
    pub completion_tool: String,
    pub completion_gate: Option<CompletionGate>,
    pub max_reminders: usize,
    pub thresholds: PolicyThresholds,
    pub summary_prompt: String,
}

impl SessionConfig {
    pub fn new(label: impl Into<String>, role: RoleKind, model: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            role,
            model: model.into(),
            max_tokens: 64_000,
            context_window: 200_000,
            baseline_temperature: 0.0,
            thinking_budget: None,
            completion_tool: FINAL_OUTPUT_TOOL.to_string(),
            completion_gate: None,
            max_reminders: 3,
            thresholds: PolicyThresholds::default(),
            summary_prompt: DEFAULT_SUMMARY_PROMPT.to_string(),
        }
    }

    pub fn with_token_limits(mut self, max_tokens: u32, context_window: u64) -> Self {
        self.max_tokens = max_tokens;
        self.context_window = context_window;
        self
    }

    /// 启用思考预算；思考模式要求温度为 1.0，基线随之改为 `temperature`
    pub fn with_thinking(mut self, budget: u32, temperature: f32) -> Self {
        self.thinking_budget = Some(budget);
        self.baseline_temperature = temperature;
        self
    }

    pub fn with_completion_gate(mut self, gate: CompletionGate) -> Self {
        self.completion_gate = Some(gate);
        self
    }

    pub fn with_max_reminders(mut self, max_reminders: usize) -> Self {
        self.max_reminders = max_reminders;
        self
    }

    pub fn with_thresholds(mut self, thresholds: PolicyThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_summary_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.summary_prompt = prompt.into();
        self
    }

    fn special_tools(&self) -> Vec<String> {
        let mut tools = vec![self.completion_tool.clone()];
        if let Some(gate) = &self.completion_gate {
            if gate.tool != self.completion_tool {
                tools.push(gate.tool.clone());
            }
        }
        tools
    }
}

/// 未完成的原因
#[derive(Debug, Clone, PartialEq)]
pub enum IncompleteReason {
    Transport(LlmError),
    TokenLimit,
    ContextWindow,
    CompletionGateUnmet,
    StopReason(String),
}

impl std::fmt::Display for IncompleteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::TokenLimit => f.write_str("max_tokens reached"),
            Self::ContextWindow => f.write_str("context window exceeded"),
            Self::CompletionGateUnmet => f.write_str("completion gate unmet after reminders"),
            Self::StopReason(s) => write!(f, "stop reason '{s}'"),
        }
    }
}

/// 会话结果
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed(String),
    Incomplete(IncompleteReason),
    /// 评审角色结束时从未调用完成工具
    MissingCompletion,
}

impl SessionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// 交给下一个角色的文本
    pub fn into_role_result(self) -> String {
        match self {
            Self::Completed(text) => text,
            Self::Incomplete(_) => INCOMPLETE_RESULT.to_string(),
            Self::MissingCompletion => MISSING_COMPLETION_RESULT.to_string(),
        }
    }
}

/// 锁定后注入的纠正消息：工具名、失败参数、正确用法示例
pub fn lockout_message(key: &ToolCallKey, attempts: usize, examples: &[String]) -> String {
    let examples = if examples.is_empty() {
        "No examples available".to_string()
    } else {
        examples.join("\n")
    };
    format!(
        "You have attempted the same tool call {attempts} times with identical parameters and it has failed each time.\n\
         Tool: {}\n\
         Failed parameters: {}\n\
         Please explain what you're trying to do and consider an alternative approach. \
         When I re-enable tools, here are examples of correct usage:\n\
         {examples}\n\
         What are you trying to accomplish? Let's think about this differently.",
        key.tool, key.params
    )
}

/// 单会话驱动器；状态只存在于一次 run 调用内
pub struct SessionDriver<'a> {
    llm: &'a dyn LlmClient,
    executor: &'a ToolExecutor,
    config: SessionConfig,
}

impl<'a> SessionDriver<'a> {
    pub fn new(llm: &'a dyn LlmClient, executor: &'a ToolExecutor, config: SessionConfig) -> Self {
        Self {
            llm,
            executor,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 在已有对话上运行到终止；task_text 仅用于完成门槛的触发判断
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        system: &str,
        task_text: &str,
    ) -> SessionOutcome {
        let span = tracing::info_span!(
            "session",
            role = %self.config.label,
            id = %uuid::Uuid::new_v4()
        );
        self.run_loop(conversation, system, task_text)
            .instrument(span)
            .await
    }

    async fn run_loop(
        &self,
        conversation: &mut Conversation,
        system: &str,
        task_text: &str,
    ) -> SessionOutcome {
        let cfg = &self.config;
        let processor = TurnProcessor::new(self.executor, cfg.special_tools());
        let mut policy = ErrorPolicy::new(cfg.baseline_temperature, cfg.thresholds);
        let mut tools_disabled_next_call = false;
        let mut special_tools_seen: HashSet<String> = HashSet::new();
        let mut last_completion: Option<String> = None;
        let mut reminders_sent = 0usize;

        loop {
            let tool_choice = if std::mem::take(&mut tools_disabled_next_call) {
                tracing::warn!("tools disabled for this call after repeated failures");
                ToolChoice::None
            } else {
                ToolChoice::Auto
            };
            let temperature = policy.temperature();
            tracing::info!(
                turns = conversation.len(),
                temperature,
                tools_enabled = tool_choice == ToolChoice::Auto,
                "sending request"
            );

            let request = self.request(conversation, system, temperature, tool_choice);
            let response = match self.llm.send(&request).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(error = %e, "llm call failed, ending session");
                    return SessionOutcome::Incomplete(IncompleteReason::Transport(e));
                }
            };
            self.log_usage(&response.usage);
            conversation.push(Turn::assistant_segments(response.content.clone()));

            let report = processor.process(&response.content).await;
            let had_failures = report.has_failures();
            policy.observe(report.failures, report.had_tool_use);
            special_tools_seen.extend(report.special_tools);
            if report.completion.is_some() {
                last_completion = report.completion;
            }

            if let Some(key) = policy.take_lockout() {
                tracing::warn!(
                    tool = %key.tool,
                    threshold = cfg.thresholds.lockout,
                    "identical tool failures, locking tools for one call"
                );
                let examples = self.executor.examples_for(&key.tool);
                let mut segments = report.tool_results;
                segments.push(ContentSegment::text(lockout_message(
                    &key,
                    cfg.thresholds.lockout,
                    &examples,
                )));
                conversation.push(Turn::user_segments(segments));
                tools_disabled_next_call = true;
                continue;
            }

            if report.had_tool_use {
                conversation.push(Turn::user_segments(report.tool_results));
                continue;
            }

            if had_failures {
                tracing::warn!("turn produced failures without tool calls, retrying");
                continue;
            }

            match response.stop_reason {
                crate::llm::StopReason::MaxTokens => {
                    tracing::warn!("max_tokens stop reason received, stopping");
                    return SessionOutcome::Incomplete(IncompleteReason::TokenLimit);
                }
                crate::llm::StopReason::ContextWindowExceeded => {
                    tracing::warn!("context window exceeded, stopping");
                    return SessionOutcome::Incomplete(IncompleteReason::ContextWindow);
                }
                crate::llm::StopReason::EndTurn => {
                    tracing::info!("end_turn received");
                    if let Some(gate) = &cfg.completion_gate {
                        if !special_tools_seen.contains(&gate.tool) && gate.applies_to(task_text) {
                            if reminders_sent >= cfg.max_reminders {
                                tracing::warn!(
                                    tool = %gate.tool,
                                    reminders_sent,
                                    "required tool still not called, giving up"
                                );
                                return SessionOutcome::Incomplete(
                                    IncompleteReason::CompletionGateUnmet,
                                );
                            }
                            reminders_sent += 1;
                            tracing::warn!(tool = %gate.tool, reminders_sent, "required tool not called, reminding");
                            conversation.push(Turn::user(gate.reminder.clone()));
                            continue;
                        }
                    }

                    return match cfg.role {
                        RoleKind::Primary => self.summarize(conversation, system, &policy).await,
                        RoleKind::Review => match last_completion {
                            Some(text) => SessionOutcome::Completed(text),
                            None => {
                                tracing::warn!(
                                    tool = %cfg.completion_tool,
                                    "review ended without calling the completion tool"
                                );
                                SessionOutcome::MissingCompletion
                            }
                        },
                    };
                }
                other => {
                    tracing::warn!(stop_reason = %other, "unexpected stop reason, stopping");
                    return SessionOutcome::Incomplete(IncompleteReason::StopReason(
                        other.to_string(),
                    ));
                }
            }
        }
    }

    /// 追加摘要请求并发起一次无工具调用；取第一段文本
    async fn summarize(
        &self,
        conversation: &mut Conversation,
        system: &str,
        policy: &ErrorPolicy,
    ) -> SessionOutcome {
        conversation.push(Turn::user(self.config.summary_prompt.clone()));
        let request = self.request(conversation, system, policy.temperature(), ToolChoice::None);
        let response = match self.llm.send(&request).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "summary call failed");
                return SessionOutcome::Incomplete(IncompleteReason::Transport(e));
            }
        };
        self.log_usage(&response.usage);
        conversation.push(Turn::assistant_segments(response.content.clone()));

        match response.first_text() {
            Some(text) => {
                tracing::info!("got summary response");
                SessionOutcome::Completed(text.to_string())
            }
            None => {
                tracing::warn!("summary response had no text");
                SessionOutcome::Completed(SUMMARY_PLACEHOLDER.to_string())
            }
        }
    }

    fn request(
        &self,
        conversation: &Conversation,
        system: &str,
        temperature: f32,
        tool_choice: ToolChoice,
    ) -> LlmRequest {
        LlmRequest {
            model: self.config.model.clone(),
            system: system.to_string(),
            turns: conversation.turns().to_vec(),
            max_tokens: self.config.max_tokens,
            temperature,
            tools: self.executor.definitions(),
            tool_choice,
            thinking_budget: self.config.thinking_budget,
        }
    }

    fn log_usage(&self, usage: &Usage) {
        let remaining = self.config.context_window.saturating_sub(usage.total());
        tracing::info!(
            input = usage.input_tokens,
            output = usage.output_tokens,
            cache_read = usage.cache_read_input_tokens,
            cache_creation = usage.cache_creation_input_tokens,
            remaining,
            "usage"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gate_matching_is_case_insensitive() {
        let gate = CompletionGate {
            tool: "run_coverage_report".into(),
            triggers: vec!["write code".into(), "unit test".into()],
            reminder: "run it".into(),
        };
        assert!(gate.applies_to("Please WRITE CODE for a parser"));
        assert!(gate.applies_to("add a unit test"));
        assert!(!gate.applies_to("explain this function"));
    }

    #[test]
    fn test_role_results() {
        assert_eq!(
            SessionOutcome::Completed("ok".into()).into_role_result(),
            "ok"
        );
        assert_eq!(
            SessionOutcome::Incomplete(IncompleteReason::TokenLimit).into_role_result(),
            INCOMPLETE_RESULT
        );
        assert_eq!(
            SessionOutcome::MissingCompletion.into_role_result(),
            MISSING_COMPLETION_RESULT
        );
    }

    #[test]
    fn test_lockout_message_names_tool_and_params() {
        let key = ToolCallKey::new("call_shell", json!({"command": "bad"}));
        let msg = lockout_message(&key, 5, &["example one".to_string()]);
        assert!(msg.contains("5 times"));
        assert!(msg.contains("Tool: call_shell"));
        assert!(msg.contains(r#"{"command":"bad"}"#));
        assert!(msg.contains("example one"));

        let msg = lockout_message(&key, 5, &[]);
        assert!(msg.contains("No examples available"));
    }

    #[test]
    fn test_thinking_sets_baseline() {
        let cfg = SessionConfig::new("writer", RoleKind::Primary, "m").with_thinking(4096, 1.0);
        assert_eq!(cfg.thinking_budget, Some(4096));
        assert_eq!(cfg.baseline_temperature, 1.0);
        assert_eq!(cfg.special_tools(), vec![FINAL_OUTPUT_TOOL.to_string()]);
    }
}
