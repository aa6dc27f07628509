//! 旁路消息日志
//!
//! 每追加一条 Turn 就写一行 JSON（JSONL），只追加不改写，供事后审计。
//! 多个会话（player / coach）可共用同一个文件，以 role_label 区分。

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::memory::Turn;

/// 追加式 JSONL 日志：path + 会话标签
#[derive(Debug, Clone)]
pub struct MessageLog {
    path: PathBuf,
    label: String,
    session: String,
}

#[derive(Serialize)]
struct LogLine<'a> {
    ts: String,
    session: &'a str,
    role_label: &'a str,
    #[serde(flatten)]
    turn: &'a Turn,
}

impl MessageLog {
    pub fn new(path: impl AsRef<Path>, label: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            label: label.into(),
            session: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一行；父目录不存在时自动创建
    pub fn append(&self, turn: &Turn) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = LogLine {
            ts: chrono::Local::now().to_rfc3339(),
            session: &self.session,
            role_label: &self.label,
            turn,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&line)?)?;
        Ok(())
    }
}
