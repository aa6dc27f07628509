//! Shell 执行工具 call_shell
//!
//! 通过 sh -c 在运行目录下执行，带硬超时（默认 30s，超时即 kill 子进程）；
//! 退出码非 0 时返回 `Error (exit code N):\n<stderr>`。禁止少数破坏性子串。

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use crate::tools::{input_schema, parse_args, Tool, ToolReply};

/// 禁止的子串（破坏性操作）
pub const DEFAULT_FORBIDDEN: &[&str] = &[
    "rm -rf /",
    "rm -rf ~",
    "mkfs",
    "dd if=",
    "> /dev/sd",
    ":(){ :|:& };:", // fork bomb
];

/// 一次命令执行的原始结果
#[derive(Debug)]
pub(crate) struct CommandRun {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandRun {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// 执行命令；超时与启动失败直接返回 Err 文本
pub(crate) async fn run_shell(
    command: &str,
    cwd: &Path,
    timeout_secs: u64,
) -> Result<CommandRun, String> {
    let preview: String = command.lines().next().unwrap_or("").chars().take(80).collect();
    tracing::info!(command = %preview, "running command");

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| format!("Error: Command timed out after {timeout_secs} seconds"))?
        .map_err(|e| format!("Error executing command: {e}"))?;

    Ok(CommandRun {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

fn check_forbidden(command: &str, forbidden: &[String]) -> Result<(), String> {
    let lower = command.to_lowercase();
    match forbidden.iter().find(|f| lower.contains(f.as_str())) {
        Some(f) => Err(format!("Error: Forbidden pattern in command: {f}")),
        None => Ok(()),
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ShellArgs {
    /// Shell command to execute
    pub command: String,
}

/// call_shell 工具
pub struct ShellTool {
    root: PathBuf,
    timeout_secs: u64,
    forbidden: Vec<String>,
}

impl ShellTool {
    pub fn new(root: impl AsRef<Path>, timeout_secs: u64) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            timeout_secs,
            forbidden: DEFAULT_FORBIDDEN.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_forbidden(mut self, forbidden: Vec<String>) -> Self {
        self.forbidden = forbidden.into_iter().map(|s| s.to_lowercase()).collect();
        self
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "call_shell"
    }

    fn description(&self) -> &str {
        "Call shell command, use this to read directories or files. e.g. \"ls -al\" or \"grep -r example_string *.py\" or \"sed -n '21,32p' filename.txt\""
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<ShellArgs>()
    }

    fn examples(&self) -> &[&'static str] {
        &[
            r#"{"name": "call_shell", "input": {"command": "<YOUR COMMAND HERE>"}}"#,
            r#"{"name": "call_shell", "input": {"command": "ls -la"}}"#,
            r#"{"name": "call_shell", "input": {"command": "grep -r 'TODO' *.py"}}"#,
            r#"{"name": "call_shell", "input": {"command": "cat config.json"}}"#,
        ]
    }

    async fn execute(&self, args: Value) -> Result<ToolReply, String> {
        let args: ShellArgs = parse_args(args)?;
        let command = args.command.trim();
        if command.is_empty() {
            return Err("Error: Empty command".to_string());
        }
        check_forbidden(command, &self.forbidden)?;

        let run = run_shell(command, &self.root, self.timeout_secs).await?;
        if run.success() {
            Ok(run.stdout.into())
        } else {
            let code = run
                .code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            Err(format!("Error (exit code {}):\n{}", code, run.stderr))
        }
    }
}
