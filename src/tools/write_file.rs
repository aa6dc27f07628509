//! 文件写入工具 write_file
//!
//! 整文件写入：不存在则创建，存在则覆盖；自动创建父目录，返回写入字节数。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::filesystem::resolve_path;
use crate::tools::{input_schema, parse_args, Tool, ToolReply};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileArgs {
    /// The file path (supports ~ for home directory)
    pub path: String,
    /// The complete content to write to the file
    pub content: String,
}

/// write_file 工具
pub struct WriteFileTool {
    root: PathBuf,
    max_file_size: usize,
}

impl WriteFileTool {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_file_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating it if it doesn't exist or overwriting if it does."
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<WriteFileArgs>()
    }

    fn examples(&self) -> &[&'static str] {
        &[
            r#"{"name": "write_file", "input": {"path": "<FILE PATH>", "content": "<NEW CONTENT>"}}"#,
            r#"{"name": "write_file", "input": {"path": "test.py", "content": "print('hello')"}}"#,
            r#"{"name": "write_file", "input": {"path": "~/notes.txt", "content": "Meeting at 3pm"}}"#,
            r#"{"name": "write_file", "input": {"path": "config.json", "content": "{\"debug\": true}"}}"#,
        ]
    }

    async fn execute(&self, args: Value) -> Result<ToolReply, String> {
        let args: WriteFileArgs = parse_args(args)?;
        if args.content.len() > self.max_file_size {
            return Err(format!(
                "Error: Content too large: {} bytes (max: {})",
                args.content.len(),
                self.max_file_size
            ));
        }

        let path = resolve_path(&self.root, &args.path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("Error writing file: failed to create parent directory: {e}"))?;
        }
        tokio::fs::write(&path, args.content.as_bytes())
            .await
            .map_err(|e| format!("Error writing file: {e}"))?;

        tracing::info!(path = %path.display(), bytes = args.content.len(), "write_file");
        Ok(format!(
            "Successfully wrote {} bytes to {}",
            args.content.len(),
            path.display()
        )
        .into())
    }
}
