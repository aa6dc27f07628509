pub mod coverage;
pub mod executor;
pub mod filesystem;
pub mod final_output;
pub mod registry;
pub mod shell;
pub mod str_replace;
pub mod write_file;

use std::path::Path;

pub use coverage::{CoverageReportTool, COVERAGE_TOOL};
pub use executor::{ToolExecutor, ToolOutcome};
pub use final_output::{FinalOutputTool, FINAL_OUTPUT_TOOL};
pub use registry::{input_schema, parse_args, Tool, ToolRegistry, ToolReply};
pub use shell::ShellTool;
pub use str_replace::StrReplaceTool;
pub use write_file::WriteFileTool;

use crate::config::ToolsSection;

/// 标准工具集：call_shell / write_file / str_replace / final_output / run_coverage_report
///
/// 相对路径与 shell 的工作目录都基于 `root`（本次运行目录）。
pub fn standard_registry(root: &Path, cfg: &ToolsSection) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    let mut shell = ShellTool::new(root, cfg.shell_timeout_secs);
    if let Some(forbidden) = &cfg.forbidden_patterns {
        shell = shell.with_forbidden(forbidden.clone());
    }
    tools.register(shell);
    tools.register(WriteFileTool::new(root));
    tools.register(StrReplaceTool::new(root));
    tools.register(FinalOutputTool::new(root).with_file_name(cfg.output_file_name.clone()));
    tools.register(CoverageReportTool::new(root).with_timeout(cfg.coverage_timeout_secs));
    tools
}
