//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `DUET__*` 覆盖（双下划线表示嵌套，如 `DUET__LLM__PLAYER_MODEL=...`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AgentError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub session: SessionSection,
    pub tools: ToolsSection,
    pub workflow: WorkflowSection,
}

/// [app] 段：运行目录根与消息日志文件名
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// 每次运行在其下创建 `YYYYmmdd_HHMMSS` 子目录；未设置时用 ~/duet_scratch
    pub work_root: Option<PathBuf>,
    pub log_file_name: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            work_root: None,
            log_file_name: "messages.jsonl".to_string(),
        }
    }
}

/// [llm] 段：后端、模型、token 预算、凭证文件
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 凭证文件中的 provider 名
    pub provider: String,
    pub base_url: Option<String>,
    pub player_model: String,
    pub coach_model: String,
    pub max_tokens: u32,
    /// 用于日志中的剩余上下文估算
    pub context_window: u64,
    /// `provider:key` 文件；未设置时用 ~/.llm_keys
    pub keys_file: Option<PathBuf>,
    pub request_timeout_secs: u64,
    /// 证明写作角色的思考预算；None 表示不启用
    pub thinking_budget: Option<u32>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            base_url: None,
            player_model: "claude-sonnet-4-5".to_string(),
            coach_model: "claude-sonnet-4-5".to_string(),
            max_tokens: 64_000,
            context_window: 200_000,
            keys_file: None,
            request_timeout_secs: 600,
            thinking_budget: Some(10_000),
        }
    }
}

/// [session] 段：重复失败阈值、温度、提醒上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// 最近 K 次失败完全相同时升温
    pub repeated_error_threshold: usize,
    /// 最近 L 次失败完全相同时锁定工具一次
    pub lockout_threshold: usize,
    pub elevated_temperature: f32,
    /// 启用思考预算时的基线温度
    pub thinking_temperature: f32,
    /// 完成门槛未满足时最多提醒次数，超出后终止会话
    pub max_reminders: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            repeated_error_threshold: 2,
            lockout_threshold: 5,
            elevated_temperature: 1.0,
            thinking_temperature: 1.0,
            max_reminders: 3,
        }
    }
}

/// [tools] 段：超时、输出文件名、Shell 禁止子串
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub shell_timeout_secs: u64,
    pub coverage_timeout_secs: u64,
    /// 执行器对单次工具调用的外层超时（秒）
    pub tool_timeout_secs: u64,
    pub output_file_name: String,
    /// 覆盖默认的禁止子串列表
    pub forbidden_patterns: Option<Vec<String>>,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            shell_timeout_secs: 30,
            coverage_timeout_secs: 300,
            tool_timeout_secs: 600,
            output_file_name: "final_output.md".to_string(),
            forbidden_patterns: None,
        }
    }
}

/// 工作流种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    PlayerCoach,
    Proof,
}

/// [workflow] 段：流程种类、外层尝试次数、需求来源
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkflowSection {
    pub kind: WorkflowKind,
    pub max_attempts: usize,
    /// false 时 player 完成即退出，不进入 coach 循环
    pub autocoding: bool,
    pub requirements: Option<String>,
    pub requirements_file: Option<PathBuf>,
    /// 证明流程的产物文件（相对运行目录）
    pub proof_file: PathBuf,
    /// 任务文本包含这些短语之一时，player 必须调用 run_coverage_report 才能结束
    pub coverage_triggers: Vec<String>,
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            kind: WorkflowKind::PlayerCoach,
            max_attempts: 3,
            autocoding: true,
            requirements: None,
            requirements_file: None,
            proof_file: PathBuf::from("proof/Main.lean"),
            coverage_triggers: vec![
                "write code".into(),
                "implement".into(),
                "unit test".into(),
                "coverage".into(),
            ],
        }
    }
}

impl WorkflowSection {
    /// 需求文本：优先取内联的 requirements，其次读 requirements_file
    pub fn read_requirements(&self) -> Result<String, AgentError> {
        if let Some(text) = self.requirements.as_ref().filter(|t| !t.trim().is_empty()) {
            return Ok(text.clone());
        }
        match &self.requirements_file {
            Some(path) => Ok(std::fs::read_to_string(path)?),
            None => Err(AgentError::MissingRequirements),
        }
    }
}

/// 从 config 目录加载配置，环境变量 DUET__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 DUET__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if std::path::Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("DUET")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.session.repeated_error_threshold, 2);
        assert_eq!(cfg.session.lockout_threshold, 5);
        assert_eq!(cfg.session.elevated_temperature, 1.0);
        assert_eq!(cfg.tools.shell_timeout_secs, 30);
        assert_eq!(cfg.workflow.max_attempts, 3);
        assert_eq!(cfg.workflow.kind, WorkflowKind::PlayerCoach);
        assert_eq!(cfg.tools.output_file_name, "final_output.md");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(
            &path,
            r#"
[workflow]
kind = "proof"
max_attempts = 5

[session]
lockout_threshold = 4
"#,
        )
        .unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.workflow.kind, WorkflowKind::Proof);
        assert_eq!(cfg.workflow.max_attempts, 5);
        assert_eq!(cfg.session.lockout_threshold, 4);
        // 未出现的键保持默认
        assert_eq!(cfg.session.repeated_error_threshold, 2);
        assert!(cfg.workflow.autocoding);
    }

    #[test]
    fn test_read_requirements_sources() {
        let mut workflow = WorkflowSection::default();
        assert!(matches!(
            workflow.read_requirements(),
            Err(AgentError::MissingRequirements)
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("req.md");
        std::fs::write(&path, "Build a parser").unwrap();
        workflow.requirements_file = Some(path);
        assert_eq!(workflow.read_requirements().unwrap(), "Build a parser");

        // 内联文本优先，空白文本视为未设置
        workflow.requirements = Some("  ".into());
        assert_eq!(workflow.read_requirements().unwrap(), "Build a parser");
        workflow.requirements = Some("inline".into());
        assert_eq!(workflow.read_requirements().unwrap(), "inline");

        workflow.requirements = None;
        workflow.requirements_file = Some(dir.path().join("missing.md"));
        assert!(matches!(workflow.read_requirements(), Err(AgentError::Io(_))));
    }
}
