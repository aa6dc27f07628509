//! 单轮处理：按顺序执行一次 LLM 响应中的全部工具调用
//!
//! Text / Thinking / RedactedThinking 只记日志；每个 ToolInvocation 交给执行器，结果包装为带相同 id 的 ToolResult。
//! 模型不应产出的片段（Unrecognized、ToolResult）以合成键记为失败，使重试分支受锁定约束。

use serde_json::{json, Value};

use crate::memory::ContentSegment;
use crate::session::ToolCallKey;
use crate::tools::ToolExecutor;

/// 合成失败键使用的工具名
pub const UNRECOGNIZED_SEGMENT: &str = "<unrecognized_segment>";
pub const UNEXPECTED_TOOL_RESULT: &str = "<unexpected_tool_result>";

/// 文本日志预览最大字符数
const TEXT_PREVIEW_CHARS: usize = 300;

/// 一轮的汇总结果
#[derive(Debug, Default)]
pub struct TurnReport {
    /// 回传给 LLM 的 ToolResult 片段，顺序与调用一致
    pub tool_results: Vec<ContentSegment>,
    pub had_tool_use: bool,
    pub failures: Vec<ToolCallKey>,
    /// 本轮调用过的特殊工具名（完成工具、门槛工具）
    pub special_tools: Vec<String>,
    /// 本轮最后一次完成工具返回的 payload
    pub completion: Option<String>,
    pub unrecognized: usize,
}

impl TurnReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

fn preview(text: &str) -> String {
    let head: String = text.chars().take(TEXT_PREVIEW_CHARS).collect();
    if text.chars().count() > TEXT_PREVIEW_CHARS {
        format!("{head}...")
    } else {
        head
    }
}

pub struct TurnProcessor<'a> {
    executor: &'a ToolExecutor,
    special_tools: Vec<String>,
}

impl<'a> TurnProcessor<'a> {
    pub fn new(executor: &'a ToolExecutor, special_tools: Vec<String>) -> Self {
        Self {
            executor,
            special_tools,
        }
    }

    pub async fn process(&self, segments: &[ContentSegment]) -> TurnReport {
        let mut report = TurnReport::default();

        for segment in segments {
            match segment {
                ContentSegment::Text { text } => {
                    tracing::info!(text = %preview(text), "assistant");
                }
                ContentSegment::Thinking { thinking, .. } => {
                    tracing::debug!(thinking = %preview(thinking), "assistant thinking");
                }
                ContentSegment::RedactedThinking { .. } => {
                    tracing::debug!("assistant redacted thinking");
                }
                ContentSegment::ToolInvocation {
                    invocation_id,
                    name,
                    parameters,
                } => {
                    report.had_tool_use = true;
                    if self.special_tools.iter().any(|s| s == name) {
                        report.special_tools.push(name.clone());
                    }

                    let outcome = self.executor.execute(name, parameters.clone()).await;
                    if let Some(payload) = outcome.completion() {
                        report.completion = Some(payload.to_string());
                    }
                    let is_error = outcome.is_failure();
                    if is_error {
                        report
                            .failures
                            .push(ToolCallKey::new(name.clone(), parameters.clone()));
                    }
                    report.tool_results.push(ContentSegment::ToolResult {
                        invocation_id: invocation_id.clone(),
                        content: outcome.text().to_string(),
                        is_error,
                    });
                }
                ContentSegment::ToolResult { invocation_id, .. } => {
                    tracing::warn!(invocation_id = %invocation_id, "model emitted a tool_result segment");
                    report.failures.push(ToolCallKey::new(
                        UNEXPECTED_TOOL_RESULT,
                        json!({ "tool_use_id": invocation_id }),
                    ));
                }
                ContentSegment::Unrecognized => {
                    tracing::warn!("unrecognized content segment in response");
                    report.unrecognized += 1;
                    report
                        .failures
                        .push(ToolCallKey::new(UNRECOGNIZED_SEGMENT, Value::Null));
                }
            }
        }

        report
    }
}
