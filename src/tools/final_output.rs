//! 完成信号工具 final_output
//!
//! 写入 `<output_dir>/final_output.md` 前先轮转旧文件：`.k` → `.k+1`（从最大序号往下），
//! 再把未加后缀的文件改名为 `.1`。最新内容永远不带后缀，旧版本全部保留。
//! summary 作为 ToolReply.completion 返回，由会话状态接收，不使用全局变量。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::{input_schema, parse_args, Tool, ToolReply};

pub const FINAL_OUTPUT_TOOL: &str = "final_output";
pub const DEFAULT_OUTPUT_FILE: &str = "final_output.md";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FinalOutputArgs {
    /// What was accomplished - a detailed markdown summary of the work done
    pub summary: String,
}

fn versioned(dir: &Path, file_name: &str, n: usize) -> PathBuf {
    dir.join(format!("{file_name}.{n}"))
}

/// 轮转已有输出文件；返回本次轮转后 `.1` 之外最大的序号（无旧文件时为 0）
pub async fn rotate_outputs(dir: &Path, file_name: &str) -> std::io::Result<usize> {
    let current = dir.join(file_name);
    if !tokio::fs::try_exists(&current).await? {
        return Ok(0);
    }

    let mut highest = 0;
    while tokio::fs::try_exists(versioned(dir, file_name, highest + 1)).await? {
        highest += 1;
    }
    for n in (1..=highest).rev() {
        tokio::fs::rename(versioned(dir, file_name, n), versioned(dir, file_name, n + 1)).await?;
    }
    tokio::fs::rename(&current, versioned(dir, file_name, 1)).await?;
    Ok(highest + 1)
}

/// final_output 工具
pub struct FinalOutputTool {
    output_dir: PathBuf,
    file_name: String,
}

impl FinalOutputTool {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            file_name: DEFAULT_OUTPUT_FILE.to_string(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.file_name)
    }
}

#[async_trait]
impl Tool for FinalOutputTool {
    fn name(&self) -> &str {
        FINAL_OUTPUT_TOOL
    }

    fn description(&self) -> &str {
        "Signal task completion with a detailed summary of work done in markdown format. This tool should ONLY be used in review mode to signal completion of review and provide feedback."
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<FinalOutputArgs>()
    }

    fn examples(&self) -> &[&'static str] {
        &[
            r##"{"name": "final_output", "input": {"summary": "# Task Complete\n\nFixed bug in auth module."}}"##,
            r##"{"name": "final_output", "input": {"summary": "# Review Complete\n\nCode looks good. Approved."}}"##,
            r##"{"name": "final_output", "input": {"summary": "# Analysis Done\n\nFound 3 issues:\n- Missing tests\n- Unused imports\n- Type hints needed"}}"##,
        ]
    }

    async fn execute(&self, args: Value) -> Result<ToolReply, String> {
        let args: FinalOutputArgs = parse_args(args)?;
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| format!("Error saving final output: {e}"))?;
        let rotated = rotate_outputs(&self.output_dir, &self.file_name)
            .await
            .map_err(|e| format!("Error saving final output: {e}"))?;
        let path = self.output_path();
        tokio::fs::write(&path, &args.summary)
            .await
            .map_err(|e| format!("Error saving final output: {e}"))?;

        tracing::info!(path = %path.display(), rotated, "final output saved");
        Ok(ToolReply {
            text: format!("Successfully saved final output to {}", path.display()),
            completion: Some(args.summary),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read(dir: &Path, name: &str) -> String {
        std::fs::read_to_string(dir.join(name)).unwrap()
    }

    #[tokio::test]
    async fn test_rotation_keeps_every_version() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FinalOutputTool::new(dir.path());

        let first = tool.execute(json!({"summary": "one"})).await.unwrap();
        assert_eq!(first.completion.as_deref(), Some("one"));
        assert_eq!(read(dir.path(), "final_output.md"), "one");
        assert!(!dir.path().join("final_output.md.1").exists());

        tool.execute(json!({"summary": "two"})).await.unwrap();
        assert_eq!(read(dir.path(), "final_output.md"), "two");
        assert_eq!(read(dir.path(), "final_output.md.1"), "one");

        tool.execute(json!({"summary": "three"})).await.unwrap();
        assert_eq!(read(dir.path(), "final_output.md"), "three");
        assert_eq!(read(dir.path(), "final_output.md.1"), "two");
        assert_eq!(read(dir.path(), "final_output.md.2"), "one");
        assert!(!dir.path().join("final_output.md.3").exists());

        let count = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_rotate_without_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(rotate_outputs(dir.path(), "out.md").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rotate_shifts_from_highest() {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in [("out.md", "c"), ("out.md.1", "b"), ("out.md.2", "a")] {
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        assert_eq!(rotate_outputs(dir.path(), "out.md").await.unwrap(), 3);
        assert!(!dir.path().join("out.md").exists());
        assert_eq!(read(dir.path(), "out.md.1"), "c");
        assert_eq!(read(dir.path(), "out.md.2"), "b");
        assert_eq!(read(dir.path(), "out.md.3"), "a");
    }

    #[tokio::test]
    async fn test_custom_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FinalOutputTool::new(dir.path().join("out")).with_file_name("verdict.md");
        tool.execute(json!({"summary": "ok"})).await.unwrap();
        assert_eq!(read(&dir.path().join("out"), "verdict.md"), "ok");
    }
}
