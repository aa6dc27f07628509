//! 会话驱动集成测试：脚本化 LLM + 真实工具 + 临时运行目录

#[cfg(test)]
mod tests {
    use std::path::Path;

    use duet::config::ToolsSection;
    use duet::llm::mock::{text_response, tool_response};
    use duet::llm::{LlmError, LlmResponse, ScriptedLlmClient, StopReason, ToolChoice, Usage};
    use duet::memory::{ContentSegment, Conversation, Role, Turn};
    use duet::session::{
        CompletionGate, IncompleteReason, RoleKind, SessionConfig, SessionDriver, SessionOutcome,
    };
    use duet::tools::{standard_registry, ToolExecutor, COVERAGE_TOOL};
    use serde_json::json;

    fn executor(dir: &Path) -> ToolExecutor {
        ToolExecutor::new(standard_registry(dir, &ToolsSection::default()), 30)
    }

    fn primary() -> SessionConfig {
        SessionConfig::new("player", RoleKind::Primary, "test-model")
    }

    fn coverage_gate() -> CompletionGate {
        CompletionGate {
            tool: COVERAGE_TOOL.to_string(),
            triggers: vec!["write code".to_string()],
            reminder: "You have not called the run_coverage_report tool yet.".to_string(),
        }
    }

    fn task(conv: &mut Conversation, text: &str) {
        conv.push(Turn::user(text));
    }

    #[tokio::test]
    async fn test_tool_turn_then_end_turn_summarizes() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        let llm = ScriptedLlmClient::new();
        llm.push(tool_response(
            "t1",
            "write_file",
            json!({"path": "a.txt", "content": "hi"}),
        ))
        .push(text_response("done", StopReason::EndTurn))
        .push(text_response("Summary: wrote a.txt", StopReason::EndTurn));

        let mut conv = Conversation::new();
        task(&mut conv, "create a.txt");
        let outcome = SessionDriver::new(&llm, &exec, primary())
            .run(&mut conv, "sys", "create a.txt")
            .await;

        assert_eq!(
            outcome,
            SessionOutcome::Completed("Summary: wrote a.txt".to_string())
        );
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "hi");
        assert_eq!(conv.len(), 6);

        // 工具结果以 user 轮回传，id 对应
        let results = &conv.turns()[2];
        assert_eq!(results.role, Role::User);
        assert!(matches!(
            &results.content,
            duet::memory::TurnContent::Segments(s)
                if matches!(&s[0], ContentSegment::ToolResult { invocation_id, is_error: false, .. } if invocation_id == "t1")
        ));

        let requests = llm.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].tool_choice, ToolChoice::Auto);
        assert_eq!(requests[1].tool_choice, ToolChoice::Auto);
        // 摘要调用不允许工具，但工具目录仍然发送
        assert_eq!(requests[2].tool_choice, ToolChoice::None);
        assert!(!requests[2].tools.is_empty());
        assert_eq!(requests[2].turns.len(), 5);
    }

    #[tokio::test]
    async fn test_summary_without_text_uses_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        let llm = ScriptedLlmClient::new();
        llm.push(text_response("done", StopReason::EndTurn))
            .push(LlmResponse {
                content: vec![ContentSegment::Thinking {
                    thinking: "nothing to say".into(),
                    signature: None,
                }],
                usage: Usage::default(),
                stop_reason: StopReason::EndTurn,
            });

        let mut conv = Conversation::new();
        task(&mut conv, "explain");
        let outcome = SessionDriver::new(&llm, &exec, primary())
            .run(&mut conv, "sys", "explain")
            .await;
        assert_eq!(outcome, SessionOutcome::Completed("Task completed".into()));
    }

    #[tokio::test]
    async fn test_unmet_gate_injects_reminder() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        let llm = ScriptedLlmClient::new();
        llm.push(text_response("done", StopReason::EndTurn))
            .push(tool_response(
                "c1",
                COVERAGE_TOOL,
                json!({"test_command": "echo 'TOTAL 100%'"}),
            ))
            .push(text_response("done", StopReason::EndTurn))
            .push(text_response("summary", StopReason::EndTurn));

        let mut conv = Conversation::new();
        task(&mut conv, "Please write code for a parser");
        let cfg = primary().with_completion_gate(coverage_gate());
        let outcome = SessionDriver::new(&llm, &exec, cfg)
            .run(&mut conv, "sys", "Please write code for a parser")
            .await;

        assert_eq!(outcome, SessionOutcome::Completed("summary".into()));
        let requests = llm.requests();
        assert_eq!(requests.len(), 4);
        let reminder = requests[1].turns.last().unwrap();
        assert_eq!(reminder.role, Role::User);
        assert!(reminder.text().contains("run_coverage_report"));
    }

    #[tokio::test]
    async fn test_gate_ignored_when_task_does_not_match() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        let llm = ScriptedLlmClient::new();
        llm.push(text_response("done", StopReason::EndTurn))
            .push(text_response("summary", StopReason::EndTurn));

        let mut conv = Conversation::new();
        task(&mut conv, "explain the module");
        let cfg = primary().with_completion_gate(coverage_gate());
        let outcome = SessionDriver::new(&llm, &exec, cfg)
            .run(&mut conv, "sys", "explain the module")
            .await;
        assert_eq!(outcome, SessionOutcome::Completed("summary".into()));
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_reminder_cap_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        let llm = ScriptedLlmClient::new();
        for _ in 0..3 {
            llm.push(text_response("done", StopReason::EndTurn));
        }

        let mut conv = Conversation::new();
        task(&mut conv, "write code");
        let cfg = primary()
            .with_completion_gate(coverage_gate())
            .with_max_reminders(2);
        let outcome = SessionDriver::new(&llm, &exec, cfg)
            .run(&mut conv, "sys", "write code")
            .await;

        assert_eq!(
            outcome,
            SessionOutcome::Incomplete(IncompleteReason::CompletionGateUnmet)
        );
        assert_eq!(llm.call_count(), 3);
        assert_eq!(llm.remaining(), 0);
    }

    #[tokio::test]
    async fn test_lockout_after_five_identical_failures() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        let llm = ScriptedLlmClient::new();
        let bad = json!({"path": "missing.txt", "old_str": "a", "new_str": "b"});
        for i in 0..5 {
            llm.push(tool_response(&format!("t{i}"), "str_replace", bad.clone()));
        }
        llm.push(tool_response(
            "w1",
            "write_file",
            json!({"path": "missing.txt", "content": "a"}),
        ))
        .push(text_response("done", StopReason::EndTurn))
        .push(text_response("summary", StopReason::EndTurn));

        let mut conv = Conversation::new();
        task(&mut conv, "edit the file");
        let outcome = SessionDriver::new(&llm, &exec, primary())
            .run(&mut conv, "sys", "edit the file")
            .await;
        assert_eq!(outcome, SessionOutcome::Completed("summary".into()));

        let requests = llm.requests();
        assert_eq!(requests.len(), 8);
        let choices: Vec<_> = requests.iter().map(|r| r.tool_choice).collect();
        assert_eq!(
            choices[..7],
            [
                ToolChoice::Auto,
                ToolChoice::Auto,
                ToolChoice::Auto,
                ToolChoice::Auto,
                ToolChoice::Auto,
                ToolChoice::None,
                ToolChoice::Auto,
            ]
        );

        // 升温：第 2 次相同失败之后变为 1.0，锁定时恢复基线
        let temps: Vec<_> = requests.iter().map(|r| r.temperature).collect();
        assert_eq!(temps[..7], [0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0]);

        // 锁定消息与最后一批工具结果在同一个 user 轮中
        let injected = requests[5].turns.last().unwrap();
        assert_eq!(injected.role, Role::User);
        let text = injected.text();
        assert!(text.contains("5 times"));
        assert!(text.contains("Tool: str_replace"));
        assert!(text.contains("missing.txt"));
        assert!(matches!(
            &injected.content,
            duet::memory::TurnContent::Segments(s)
                if matches!(&s[0], ContentSegment::ToolResult { invocation_id, is_error: true, .. } if invocation_id == "t4")
        ));
    }

    #[tokio::test]
    async fn test_clean_tool_turn_resets_temperature() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        let llm = ScriptedLlmClient::new();
        llm.push(tool_response("a", "call_shell", json!({"command": "exit 1"})))
            .push(tool_response("b", "call_shell", json!({"command": "exit 1"})))
            .push(tool_response("c", "call_shell", json!({"command": "echo ok"})))
            .push(text_response("done", StopReason::EndTurn))
            .push(text_response("summary", StopReason::EndTurn));

        let mut conv = Conversation::new();
        task(&mut conv, "run it");
        SessionDriver::new(&llm, &exec, primary())
            .run(&mut conv, "sys", "run it")
            .await;

        let temps: Vec<_> = llm.requests().iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![0.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_review_requires_completion_tool() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        let llm = ScriptedLlmClient::new();
        llm.push(text_response("looks fine to me", StopReason::EndTurn));

        let mut conv = Conversation::new();
        task(&mut conv, "review");
        let cfg = SessionConfig::new("coach", RoleKind::Review, "test-model");
        let outcome = SessionDriver::new(&llm, &exec, cfg)
            .run(&mut conv, "sys", "review")
            .await;
        assert_eq!(outcome, SessionOutcome::MissingCompletion);
        assert_eq!(
            outcome.into_role_result(),
            "ERROR: review role requires calling the final_output tool"
        );
    }

    #[tokio::test]
    async fn test_review_returns_completion_payload() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        let llm = ScriptedLlmClient::new();
        llm.push(tool_response(
            "f1",
            "final_output",
            json!({"summary": "IMPLEMENTATION_APPROVED"}),
        ))
        .push(text_response("bye", StopReason::EndTurn));

        let mut conv = Conversation::new();
        task(&mut conv, "review");
        let cfg = SessionConfig::new("coach", RoleKind::Review, "test-model");
        let outcome = SessionDriver::new(&llm, &exec, cfg)
            .run(&mut conv, "sys", "review")
            .await;
        assert_eq!(
            outcome,
            SessionOutcome::Completed("IMPLEMENTATION_APPROVED".into())
        );
        // 评审角色不做摘要调用
        assert_eq!(llm.call_count(), 2);
        assert!(dir.path().join("final_output.md").exists());
    }

    #[tokio::test]
    async fn test_transport_error_is_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        let llm = ScriptedLlmClient::new();
        llm.push_result(Err(LlmError::Transport("connection reset".into())));

        let mut conv = Conversation::new();
        task(&mut conv, "anything");
        let outcome = SessionDriver::new(&llm, &exec, primary())
            .run(&mut conv, "sys", "anything")
            .await;
        assert_eq!(
            outcome,
            SessionOutcome::Incomplete(IncompleteReason::Transport(LlmError::Transport(
                "connection reset".into()
            )))
        );
        assert_eq!(outcome.into_role_result(), "Task execution incomplete");
        assert_eq!(conv.len(), 1);
    }

    #[tokio::test]
    async fn test_budget_stop_reasons() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());

        let llm = ScriptedLlmClient::new();
        llm.push(text_response("partial", StopReason::MaxTokens));
        let mut conv = Conversation::new();
        task(&mut conv, "long task");
        let outcome = SessionDriver::new(&llm, &exec, primary())
            .run(&mut conv, "sys", "long task")
            .await;
        assert_eq!(outcome, SessionOutcome::Incomplete(IncompleteReason::TokenLimit));

        let llm = ScriptedLlmClient::new();
        llm.push(text_response("partial", StopReason::ContextWindowExceeded));
        let outcome = SessionDriver::new(&llm, &exec, primary())
            .run(&mut conv, "sys", "long task")
            .await;
        assert_eq!(
            outcome,
            SessionOutcome::Incomplete(IncompleteReason::ContextWindow)
        );

        let llm = ScriptedLlmClient::new();
        llm.push(text_response("halt", StopReason::StopSequence));
        let outcome = SessionDriver::new(&llm, &exec, primary())
            .run(&mut conv, "sys", "long task")
            .await;
        assert_eq!(
            outcome,
            SessionOutcome::Incomplete(IncompleteReason::StopReason("stop_sequence".into()))
        );
    }

    #[tokio::test]
    async fn test_unrecognized_segment_retries_without_appending() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        let llm = ScriptedLlmClient::new();
        llm.push(LlmResponse {
            content: vec![ContentSegment::Unrecognized],
            usage: Usage::default(),
            stop_reason: StopReason::EndTurn,
        })
        .push(text_response("done", StopReason::EndTurn))
        .push(text_response("summary", StopReason::EndTurn));

        let mut conv = Conversation::new();
        task(&mut conv, "anything");
        let outcome = SessionDriver::new(&llm, &exec, primary())
            .run(&mut conv, "sys", "anything")
            .await;
        assert_eq!(outcome, SessionOutcome::Completed("summary".into()));
        let requests = llm.requests();
        assert_eq!(requests.len(), 3);
        // 重试时只多了 assistant 轮，没有追加 user 轮
        assert_eq!(requests[1].turns.len(), 2);
        assert_eq!(requests[1].turns[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_conversation_is_mirrored_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path());
        let log_path = dir.path().join("messages.jsonl");
        let llm = ScriptedLlmClient::new();
        llm.push(text_response("done", StopReason::EndTurn))
            .push(text_response("summary", StopReason::EndTurn));

        let mut conv =
            Conversation::new().with_log(duet::memory::MessageLog::new(&log_path, "player"));
        task(&mut conv, "anything");
        SessionDriver::new(&llm, &exec, primary())
            .run(&mut conv, "sys", "anything")
            .await;

        let lines = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(lines.lines().count(), conv.len());
        for line in lines.lines() {
            let v: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(v["role_label"], "player");
        }
    }
}
