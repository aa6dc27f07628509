//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时。execute(tool_name, args) 永不向外抛错：未知工具、参数缺失/类型不符、
//! 工具返回 Err、工具 panic、超时都归一化为 ToolOutcome::Failure；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::llm::ToolDefinition;
use crate::tools::ToolRegistry;

/// 单次工具调用的归一化结果
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success {
        text: String,
        completion: Option<String>,
    },
    Failure {
        message: String,
        /// 工具执行过程中 panic（区别于工具自己返回的 Err）
        raised: bool,
    },
}

impl ToolOutcome {
    /// 构造失败结果；回传给 LLM 的文本统一以 "Error" 开头
    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.starts_with("Error") {
            message
        } else {
            format!("Error: {message}")
        };
        Self::Failure {
            message,
            raised: false,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// 回传给 LLM 的文本
    pub fn text(&self) -> &str {
        match self {
            Self::Success { text, .. } => text,
            Self::Failure { message, .. } => message,
        }
    }

    pub fn completion(&self) -> Option<&str> {
        match self {
            Self::Success { completion, .. } => completion.as_deref(),
            Self::Failure { .. } => None,
        }
    }
}

/// 工具执行器：参数校验 + 超时 + panic 隔离 + 审计日志
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub async fn execute(&self, tool_name: &str, args: Value) -> ToolOutcome {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let outcome = self.dispatch(tool_name, args).await;

        let label = match &outcome {
            ToolOutcome::Success { .. } => "ok",
            ToolOutcome::Failure { raised: true, .. } => "panic",
            ToolOutcome::Failure { .. } => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": !outcome.is_failure(),
            "outcome": label,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");
        outcome
    }

    async fn dispatch(&self, tool_name: &str, args: Value) -> ToolOutcome {
        let Some(tool) = self.registry.get(tool_name) else {
            return ToolOutcome::failure(format!(
                "Error: Unknown tool '{}'. Available tools: {}",
                tool_name,
                self.registry.tool_names().join(", ")
            ));
        };

        if let Err(problem) = validate_args(&tool.parameters_schema(), &args) {
            return ToolOutcome::failure(self.with_examples(
                tool_name,
                format!("Error calling tool '{tool_name}': {problem}"),
            ));
        }

        // 独立任务中执行，panic 以 JoinError 形式返回而不是拖垮会话
        let handle = tokio::spawn(async move { tool.execute(args).await });
        let abort = handle.abort_handle();
        match timeout(self.timeout, handle).await {
            Ok(Ok(Ok(reply))) => ToolOutcome::Success {
                text: reply.text,
                completion: reply.completion,
            },
            Ok(Ok(Err(message))) => ToolOutcome::failure(message),
            Ok(Err(join_err)) => ToolOutcome::Failure {
                message: format!("Error executing tool '{tool_name}': {join_err}"),
                raised: true,
            },
            Err(_) => {
                abort.abort();
                ToolOutcome::failure(format!(
                    "Error: tool '{}' timed out after {}s",
                    tool_name,
                    self.timeout.as_secs()
                ))
            }
        }
    }

    fn with_examples(&self, tool_name: &str, message: String) -> String {
        let examples = self.registry.examples_for(tool_name);
        if examples.is_empty() {
            return message;
        }
        format!(
            "{}\n\n *YOU MUST USE THE COMMAND WITH ALL THE PARAMETERS, FOR EXAMPLE*:\n{}",
            message,
            examples.join("\n")
        )
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    pub fn examples_for(&self, name: &str) -> Vec<String> {
        self.registry.examples_for(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }
}

/// 按 schema 校验：args 必须是对象、required 字段齐全、声明了 type 的字段类型匹配
fn validate_args(schema: &Value, args: &Value) -> Result<(), String> {
    let Some(obj) = args.as_object() else {
        return Err(format!("parameters must be a JSON object, got {}", json_type(args)));
    };

    let missing: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|req| {
            req.iter()
                .filter_map(Value::as_str)
                .filter(|f| !obj.contains_key(*f))
                .collect()
        })
        .unwrap_or_default();
    if !missing.is_empty() {
        return Err(format!("missing required parameter(s): {}", missing.join(", ")));
    }

    if let Some(props) = schema.get("properties").and_then(Value::as_object) {
        for (field, value) in obj {
            let Some(expected) = props.get(field).and_then(|p| p.get("type")) else {
                continue;
            };
            let actual = json_type(value);
            let accepted = match expected {
                Value::String(t) => type_matches(t, actual),
                Value::Array(ts) => ts
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|t| type_matches(t, actual)),
                _ => true,
            };
            if !accepted {
                return Err(format!(
                    "parameter '{field}' must be of type {expected}, got {actual}"
                ));
            }
        }
    }
    Ok(())
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_matches(expected: &str, actual: &str) -> bool {
    expected == actual || (expected == "number" && actual == "integer")
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
