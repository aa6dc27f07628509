//! 角色提示词
//!
//! 内置默认文本；若 `config/prompts/<name>.txt`（或 `../config/prompts/<name>.txt`）存在则覆盖。
//! 工具用法说明由注册表的示例拼出，附加到需要调用工具的角色的 system prompt 末尾。

use std::path::{Path, PathBuf};

use crate::tools::ToolRegistry;

const PLAYER_SYSTEM: &str = r#"# SYSTEM PROMPT

You are a very experienced software engineer and coding assistant. You will be given requirements and must
implement them completely by creating and editing files in the current working directory.

Work iteratively: write the code, run it, write unit tests, run them, and fix anything that fails.
Prefer small, verifiable steps. Keep going until every requirement is met.

*VERY IMPORTANT*

DO NOT GENERATE REPORTS, DOCUMENTATION OR EXAMPLES THAT ARE NOT DIRECTLY NEEDED IN THE FINAL CODEBASE.

WHEN YOU ARE CONFIDENT YOU HAVE COMPLETED ALL THE TASKS THAT WERE SPECIFIED IN THE INSTRUCTIONS, YOU **MUST**:
- make sure all unit tests pass;
- call the run_coverage_report tool and make sure coverage is reasonable."#;

const COACH_PREAMBLE: &str = r#"You are a strict but fair senior reviewer (the coach). Below you will find the original requirements
followed by the implementer's summary of what was done. Inspect the files in the working directory and run the code
and tests yourself with the available tools. Do not trust the summary alone.

When you are done, you MUST call the final_output tool exactly once:
- if every requirement is implemented and the tests pass, the summary must be exactly: IMPLEMENTATION_APPROVED
- otherwise, the summary must be a concise, actionable list of what is missing or broken."#;

const SUMMARY_REQUEST: &str = "Please provide a concise summary report of the work you have completed: \
which files were created or changed, what each change does, how it was tested, and anything left unfinished.";

const COVERAGE_REMINDER: &str = "You have not called the run_coverage_report tool yet. According to the system prompt, \
you MUST call this tool when you have been asked to write code. Please run the coverage report now before completing.";

const WRITE_PROOF: &str = r#"# SYSTEM PROMPT

You are a very experienced software engineer with deep expertise in proving statements in Lean 4.
You will be supplied a few facts to be taken as axiomatic, and a question. You must answer that question
with a statement that you can prove via a Lean 4 proof, write the proof, and execute it to check that it works.

The question is given in the REQUIREMENTS section of the task.

Use the shell command `lake build` in the target directory to execute the proof.

WHEN YOU ARE CONFIDENT YOU HAVE COMPLETED ALL THE TASKS, YOU **MUST** make sure the proof builds."#;

const TRANSLATE_PROOF: &str = r#"You are a world-renowned mathematician with deep expertise in reading Lean 4 programs.
The program you will be given has already been proven. Read and understand it thoroughly, then translate
what it proves into everyday English. Your translation will be used to judge whether the proof matches the
original question.

When you are done, call the final_output tool with your translation as the summary."#;

const VERIFY_PROOF: &str = r#"You are a world-renowned mathematician with deep expertise in logic problems. You will be
given a problem statement and an explanation of a solution that was formally proven. Very carefully analyse the
original question and decide whether the explanation actually addresses it and looks correct.

**how to answer**
Call the final_output function with your answer as the summary: "{{{EXPLANATION_ACCEPTED}}}" if the explanation is
acceptable, or "{{{EXPLANATION_REJECTED}}}" followed by the reasons if not. e.g.
{"name": "final_output", "input": {"summary": "{{{EXPLANATION_ACCEPTED}}}"}}"#;

const TOOL_USE_GUIDANCE: &str = r#"**TOOL USE**

*Tool-First Philosophy*: Solve problems by actively using tools rather than just providing advice.

If you receive an error when executing a tool call, try again, but fix the call.
You MUST abandon a tool call if you have attempted the identical call 5 times or more and failed.

*IMPORTANT*: MAKE SURE TO INCLUDE ALL REQUIRED PARAMETERS. If you can't figure out how to call a tool,
try an alternative, e.g. use a shell command to write contents to a file instead of str_replace.

Examples of correct tool calls:"#;

/// 全部角色提示词
#[derive(Debug, Clone)]
pub struct Prompts {
    pub player_system: String,
    pub coach_preamble: String,
    pub summary_request: String,
    pub coverage_reminder: String,
    pub write_proof: String,
    pub translate_proof: String,
    pub verify_proof: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            player_system: PLAYER_SYSTEM.to_string(),
            coach_preamble: COACH_PREAMBLE.to_string(),
            summary_request: SUMMARY_REQUEST.to_string(),
            coverage_reminder: COVERAGE_REMINDER.to_string(),
            write_proof: WRITE_PROOF.to_string(),
            translate_proof: TRANSLATE_PROOF.to_string(),
            verify_proof: VERIFY_PROOF.to_string(),
        }
    }
}

fn override_from(dirs: &[PathBuf], name: &str, fallback: String) -> String {
    dirs.iter()
        .map(|d| d.join(format!("{name}.txt")))
        .find_map(|p| std::fs::read_to_string(p).ok())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(fallback)
}

impl Prompts {
    /// 从 config/prompts 与 ../config/prompts 加载覆盖
    pub fn load() -> Self {
        Self::load_from(&[
            PathBuf::from("config/prompts"),
            PathBuf::from("../config/prompts"),
        ])
    }

    /// 按顺序在 dirs 中查找 `<name>.txt`，第一个存在且非空的生效
    pub fn load_from(dirs: &[PathBuf]) -> Self {
        let d = Self::default();
        let prompts = Self {
            player_system: override_from(dirs, "player_system", d.player_system),
            coach_preamble: override_from(dirs, "coach_preamble", d.coach_preamble),
            summary_request: override_from(dirs, "summary_request", d.summary_request),
            coverage_reminder: override_from(dirs, "coverage_reminder", d.coverage_reminder),
            write_proof: override_from(dirs, "write_proof", d.write_proof),
            translate_proof: override_from(dirs, "translate_proof", d.translate_proof),
            verify_proof: override_from(dirs, "verify_proof", d.verify_proof),
        };
        tracing::debug!(dirs = ?dirs, "prompts loaded");
        prompts
    }
}

/// 在 system prompt 末尾附加工具用法与全部示例
pub fn with_tool_guidance(base: &str, registry: &ToolRegistry) -> String {
    format!(
        "{}\n\n{}\n\n{}",
        base.trim_end(),
        TOOL_USE_GUIDANCE,
        registry.collapsed_examples()
    )
}

/// 附加运行目录说明
pub fn with_work_dir(base: &str, work_dir: &Path) -> String {
    format!(
        "{}\n\nYour working directory is {}. Relative paths are resolved against it.",
        base.trim_end(),
        work_dir.display()
    )
}
