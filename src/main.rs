//! duet 入口：加载配置与凭证、创建运行目录，按配置运行 player/coach 或证明流水线。
//!
//! 用法：`duet [config.toml]`；环境变量 DUET__* 可覆盖任意配置项。

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use duet::config::{load_config, AppConfig, WorkflowKind};
use duet::core::{
    create_run_dir, default_keys_file, default_work_root, load_api_key, AgentError,
    OrchestrationResult, Orchestrator, Pipeline, PlayerCoachSetup, RoleSpec,
    EXPLANATION_ACCEPTED, EXPLANATION_REJECTED,
};
use duet::llm::AnthropicClient;
use duet::prompts::{with_tool_guidance, with_work_dir, Prompts};
use duet::session::{CompletionGate, PolicyThresholds, RoleKind, SessionConfig};
use duet::tools::{standard_registry, ToolExecutor, COVERAGE_TOOL};

fn session_config(cfg: &AppConfig, label: &str, role: RoleKind, model: &str) -> SessionConfig {
    SessionConfig::new(label, role, model)
        .with_token_limits(cfg.llm.max_tokens, cfg.llm.context_window)
        .with_max_reminders(cfg.session.max_reminders)
        .with_thresholds(PolicyThresholds {
            repeated_error: cfg.session.repeated_error_threshold,
            lockout: cfg.session.lockout_threshold,
            elevated_temperature: cfg.session.elevated_temperature,
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    duet::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).map_err(AgentError::from)?;
    let requirements = cfg.workflow.read_requirements()?;

    let keys_file = cfg.llm.keys_file.clone().unwrap_or_else(default_keys_file);
    let api_key = load_api_key(&keys_file, &cfg.llm.provider).context("Failed to load API key")?;

    let work_root = cfg.app.work_root.clone().unwrap_or_else(default_work_root);
    let run_dir = create_run_dir(&work_root)
        .with_context(|| format!("Failed to create run directory under {}", work_root.display()))?;

    let llm = Arc::new(
        AnthropicClient::new(&api_key, cfg.llm.base_url.as_deref(), cfg.llm.request_timeout_secs)
            .map_err(AgentError::from)?,
    );

    let prompts = Prompts::load();
    let registry = standard_registry(&run_dir, &cfg.tools);
    let tooled = |base: &str| with_work_dir(&with_tool_guidance(base, &registry), &run_dir);
    let player_system = tooled(&prompts.player_system);
    let write_system = tooled(&prompts.write_proof);
    let translate_system = tooled(&prompts.translate_proof);
    let verify_system = tooled(&prompts.verify_proof);

    let executor = Arc::new(ToolExecutor::new(registry, cfg.tools.tool_timeout_secs));
    let orchestrator = Orchestrator::new(llm, executor, cfg.workflow.max_attempts)
        .with_message_log(run_dir.join(&cfg.app.log_file_name));

    let result = match cfg.workflow.kind {
        WorkflowKind::PlayerCoach => {
            let player = session_config(&cfg, "player", RoleKind::Primary, &cfg.llm.player_model)
                .with_summary_prompt(prompts.summary_request.clone())
                .with_completion_gate(CompletionGate {
                    tool: COVERAGE_TOOL.to_string(),
                    triggers: cfg.workflow.coverage_triggers.clone(),
                    reminder: prompts.coverage_reminder.clone(),
                });
            let coach = session_config(&cfg, "coach", RoleKind::Review, &cfg.llm.coach_model);
            let setup = PlayerCoachSetup {
                requirements: requirements.clone(),
                coach_system: player_system.clone(),
                player_system,
                coach_preamble: prompts.coach_preamble.clone(),
                player,
                coach,
                autocoding: cfg.workflow.autocoding,
            };
            orchestrator.run_player_coach(&setup).await
        }
        WorkflowKind::Proof => {
            let mut writer = session_config(&cfg, "write_proof", RoleKind::Primary, &cfg.llm.player_model)
                .with_summary_prompt(prompts.summary_request.clone());
            if let Some(budget) = cfg.llm.thinking_budget {
                writer = writer.with_thinking(budget, cfg.session.thinking_temperature);
            }
            let pipeline = Pipeline {
                roles: vec![
                    RoleSpec {
                        system: write_system,
                        preamble: "# REQUIREMENTS".to_string(),
                        session: writer,
                        include_artifact: false,
                    },
                    RoleSpec {
                        system: translate_system,
                        preamble: "Translate what the following Lean 4 proof proves into everyday English. \
                                   The original question is included for context."
                            .to_string(),
                        session: session_config(&cfg, "translate_proof", RoleKind::Review, &cfg.llm.coach_model),
                        include_artifact: true,
                    },
                    RoleSpec {
                        system: verify_system,
                        preamble: "Here is the original question, followed by the explanation of what was proven."
                            .to_string(),
                        session: session_config(&cfg, "verify_proof", RoleKind::Review, &cfg.llm.coach_model),
                        include_artifact: false,
                    },
                ],
                accept_marker: EXPLANATION_ACCEPTED.to_string(),
                reject_marker: EXPLANATION_REJECTED.to_string(),
                artifact: Some(run_dir.join(&cfg.workflow.proof_file)),
            };
            orchestrator.run_pipeline(&pipeline, &requirements).await
        }
    };

    match &result {
        OrchestrationResult::Approved { attempts, .. } => {
            tracing::info!(attempts, run_dir = %run_dir.display(), "approved")
        }
        OrchestrationResult::PlayerOnly(_) => {
            tracing::info!(run_dir = %run_dir.display(), "player finished")
        }
        OrchestrationResult::GaveUp { attempts, feedback } => {
            tracing::warn!(attempts, feedback = %feedback, "giving up")
        }
        OrchestrationResult::Failed { role, reason } => {
            tracing::error!(role = %role, reason = %reason, "session failed")
        }
    }

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
