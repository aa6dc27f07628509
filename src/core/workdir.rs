//! 运行目录：`<work_root>/<YYYYmmdd_HHMMSS>/`，保存消息日志与 final_output 文件

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// 未配置 work_root 时使用 ~/duet_scratch
pub fn default_work_root() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("duet_scratch")
}

pub fn run_dir_name(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// 在 root 下创建以当前时间命名的子目录并返回其路径
pub fn create_run_dir(root: &Path) -> std::io::Result<PathBuf> {
    let dir = root.join(run_dir_name(Local::now()));
    std::fs::create_dir_all(&dir)?;
    tracing::info!(dir = %dir.display(), "run directory ready");
    Ok(dir)
}
