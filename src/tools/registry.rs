//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / examples / execute），
//! 由 ToolRegistry 按名注册与查找，ToolExecutor 在调用时做参数校验、超时与结果归一化。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde_json::Value;

use crate::llm::ToolDefinition;

/// 工具成功返回：文本 + 可选的完成信号载荷（只有 completion 类工具会设置）
#[derive(Debug, Clone, PartialEq)]
pub struct ToolReply {
    pub text: String,
    pub completion: Option<String>,
}

impl From<String> for ToolReply {
    fn from(text: String) -> Self {
        Self {
            text,
            completion: None,
        }
    }
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、示例、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（tool_use 中的 name）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；required 与 properties.type 会被 ToolExecutor 用于校验
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 正确调用示例（参数缺失与锁定提示时展示给 LLM）
    fn examples(&self) -> &[&'static str] {
        &[]
    }

    /// 执行工具；Err 中的文本原样回传给 LLM
    async fn execute(&self, args: Value) -> Result<ToolReply, String>;
}

/// 由参数结构体生成 input_schema（去掉 $schema / title，只保留对象描述）
pub fn input_schema<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({}));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.remove("description");
    }
    value
}

/// 将 args 反序列化为参数结构体，失败文本交给 LLM 自行修正
pub fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("Error: invalid parameters: {e}"))
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// 按名称排序，保证请求中的工具目录稳定
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn examples_for(&self, name: &str) -> Vec<String> {
        self.tools
            .get(name)
            .map(|t| t.examples().iter().map(|e| e.to_string()).collect())
            .unwrap_or_default()
    }

    /// 工具目录（发给 LLM）
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tool_names()
            .into_iter()
            .filter_map(|name| {
                let tool = self.tools.get(&name)?;
                Some(ToolDefinition {
                    description: tool.description().to_string(),
                    input_schema: tool.parameters_schema(),
                    name,
                })
            })
            .collect()
    }

    /// 全部示例拼成一段（写入 system prompt 的工具用法部分）
    pub fn collapsed_examples(&self) -> String {
        self.tool_names()
            .iter()
            .flat_map(|n| self.examples_for(n))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    #[derive(JsonSchema, serde::Deserialize)]
    struct DemoArgs {
        /// The path
        path: String,
        count: Option<i64>,
    }

    struct Demo;

    #[async_trait]
    impl Tool for Demo {
        fn name(&self) -> &str {
            "demo"
        }
        fn description(&self) -> &str {
            "demo tool"
        }
        fn parameters_schema(&self) -> Value {
            input_schema::<DemoArgs>()
        }
        fn examples(&self) -> &[&'static str] {
            &[r#"{"name": "demo", "input": {"path": "a"}}"#]
        }
        async fn execute(&self, args: Value) -> Result<ToolReply, String> {
            let a: DemoArgs = parse_args(args)?;
            Ok(a.path.into())
        }
    }

    #[test]
    fn test_input_schema_lists_required_fields() {
        let schema = input_schema::<DemoArgs>();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], serde_json::json!(["path"]));
        assert_eq!(schema["properties"]["path"]["type"], "string");
        assert!(schema.get("$schema").is_none());
    }

    #[test]
    fn test_definitions_sorted_and_examples() {
        let mut reg = ToolRegistry::new();
        reg.register(Demo);
        let defs = reg.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "demo");
        assert_eq!(reg.examples_for("demo").len(), 1);
        assert!(reg.examples_for("missing").is_empty());
        assert!(reg.collapsed_examples().contains("\"demo\""));
    }
}
