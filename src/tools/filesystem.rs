//! 文件类工具共用的路径解析
//!
//! 相对路径基于本次运行目录；以 `~` 开头的路径展开为 $HOME。

use std::path::{Path, PathBuf};

/// 解析工具参数中的路径
pub fn resolve_path(root: &Path, raw: &str) -> PathBuf {
    let raw = raw.trim();
    let expanded = if raw == "~" || raw.starts_with("~/") {
        match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(raw.trim_start_matches('~').trim_start_matches('/')),
            None => PathBuf::from(raw),
        }
    } else {
        PathBuf::from(raw)
    };
    if expanded.is_absolute() {
        expanded
    } else {
        root.join(expanded)
    }
}
