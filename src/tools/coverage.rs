//! 覆盖率报告工具 run_coverage_report
//!
//! 在运行目录下执行测试命令（与 call_shell 共用 run_shell），成功时返回报告全文，
//! 非零退出码作为工具失败回传。它是完成门槛要求 player 调用的工具。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::shell::run_shell;
use crate::tools::{input_schema, parse_args, Tool, ToolReply};

pub const COVERAGE_TOOL: &str = "run_coverage_report";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CoverageArgs {
    /// Command that runs the test suite with coverage enabled, e.g. "pytest --cov=. --cov-report=term"
    pub test_command: String,
}

/// 运行测试并返回覆盖率报告；是会话完成门槛检查的"报告类"工具
pub struct CoverageReportTool {
    root: PathBuf,
    timeout_secs: u64,
}

impl CoverageReportTool {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            timeout_secs: 300,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[async_trait]
impl Tool for CoverageReportTool {
    fn name(&self) -> &str {
        COVERAGE_TOOL
    }

    fn description(&self) -> &str {
        "Run the test suite with coverage and return the coverage report. You MUST call this after writing code."
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<CoverageArgs>()
    }

    fn examples(&self) -> &[&'static str] {
        &[
            r#"{"name": "run_coverage_report", "input": {"test_command": "pytest --cov=. --cov-report=term"}}"#,
            r#"{"name": "run_coverage_report", "input": {"test_command": "cargo llvm-cov --summary-only"}}"#,
        ]
    }

    async fn execute(&self, args: Value) -> Result<ToolReply, String> {
        let args: CoverageArgs = parse_args(args)?;
        let run = run_shell(&args.test_command, &self.root, self.timeout_secs).await?;
        let report = if run.stderr.trim().is_empty() {
            run.stdout.clone()
        } else {
            format!("{}\nstderr: {}", run.stdout.trim_end(), run.stderr.trim())
        };
        if run.success() {
            Ok(report.into())
        } else {
            Err(format!(
                "Error (exit code {}): tests failed\n{}",
                run.code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into()),
                report
            ))
        }
    }
}
