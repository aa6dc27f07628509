//! 精确字符串替换工具 str_replace
//!
//! occurrence 为 1 起始的序号，-1（默认）表示全部替换。文件不存在、old_str 为空或不存在、
//! 序号越界时返回错误，文件保持不变。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::filesystem::resolve_path;
use crate::tools::{input_schema, parse_args, Tool, ToolReply};

fn default_occurrence() -> i64 {
    -1
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StrReplaceArgs {
    /// The file path (supports ~ for home directory)
    pub path: String,
    /// The exact string to find and replace (must match exactly including whitespace)
    pub old_str: String,
    /// The string to replace it with
    pub new_str: String,
    /// Which occurrence to replace (1-indexed, -1 for all occurrences)
    #[serde(default = "default_occurrence")]
    pub occurrence: i64,
}

/// 在内存中完成替换；返回 (新内容, 替换次数)
pub fn replace_occurrence(
    content: &str,
    old_str: &str,
    new_str: &str,
    occurrence: i64,
) -> Result<(String, usize), String> {
    if old_str.is_empty() {
        return Err("Error: old_str must not be empty".to_string());
    }
    let count = content.matches(old_str).count();
    if count == 0 {
        return Err("Error: Could not find the specified text".to_string());
    }

    if occurrence == -1 {
        return Ok((content.replace(old_str, new_str), count));
    }
    if occurrence < 1 || occurrence as usize > count {
        return Err(format!(
            "Error: Invalid occurrence {occurrence}. Found {count} occurrence(s)"
        ));
    }

    let (pos, _) = content
        .match_indices(old_str)
        .nth(occurrence as usize - 1)
        .ok_or_else(|| format!("Error: Invalid occurrence {occurrence}"))?;
    let mut out = String::with_capacity(content.len() + new_str.len());
    out.push_str(&content[..pos]);
    out.push_str(new_str);
    out.push_str(&content[pos + old_str.len()..]);
    Ok((out, 1))
}

/// str_replace 工具
pub struct StrReplaceTool {
    root: PathBuf,
}

impl StrReplaceTool {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for StrReplaceTool {
    fn name(&self) -> &str {
        "str_replace"
    }

    fn description(&self) -> &str {
        "Replace text in a file by specifying exact old and new strings. This is safer than line-number-based editing as it verifies the exact content before replacing."
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<StrReplaceArgs>()
    }

    fn examples(&self) -> &[&'static str] {
        &[
            r#"{"name": "str_replace", "input": {"path": "<FILE PATH>", "old_str": "<CONTENT TO REPLACE>", "new_str": "<NEW CONTENT>"}}"#,
            r#"{"name": "str_replace", "input": {"path": "main.py", "old_str": "def old()", "new_str": "def new()"}}"#,
            r#"{"name": "str_replace", "input": {"path": "config.py", "old_str": "DEBUG = False", "new_str": "DEBUG = True"}}"#,
            r#"{"name": "str_replace", "input": {"path": "test.py", "old_str": "import os", "new_str": "import sys", "occurrence": 1}}"#,
        ]
    }

    async fn execute(&self, args: Value) -> Result<ToolReply, String> {
        let args: StrReplaceArgs = parse_args(args)?;
        let path = resolve_path(&self.root, &args.path);
        if !path.exists() {
            return Err(format!("Error: File {} does not exist", path.display()));
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| format!("Error replacing text: {e}"))?;
        let (updated, replaced) =
            replace_occurrence(&content, &args.old_str, &args.new_str, args.occurrence)
                .map_err(|e| format!("{e} in {}", path.display()))?;
        tokio::fs::write(&path, updated)
            .await
            .map_err(|e| format!("Error replacing text: {e}"))?;

        Ok(format!(
            "Successfully replaced {} occurrence(s) in {}",
            replaced,
            path.display()
        )
        .into())
    }
}
