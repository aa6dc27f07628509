//! Anthropic Messages API 客户端
//!
//! 非流式 POST {base_url}/v1/messages；system 以单个带 cache_control 的文本块发送，
//! 思考预算开启时附带 thinking 字段。Unrecognized 片段不会被回传。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::{LlmClient, LlmError, LlmRequest, LlmResponse, StopReason, Usage};
use crate::memory::{ContentSegment, Turn, TurnContent};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic 客户端：持有 reqwest Client、API Key 与 base_url
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url
                .unwrap_or(ANTHROPIC_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    content: Option<Vec<ContentSegment>>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Usage,
}

/// 去掉 Unrecognized 片段；片段被清空的 Turn 整条跳过
fn wire_turns(turns: &[Turn]) -> Vec<Turn> {
    turns
        .iter()
        .filter_map(|t| match &t.content {
            TurnContent::Text(_) => Some(t.clone()),
            TurnContent::Segments(segments) => {
                let kept: Vec<ContentSegment> = segments
                    .iter()
                    .filter(|s| !matches!(s, ContentSegment::Unrecognized))
                    .cloned()
                    .collect();
                if kept.is_empty() {
                    None
                } else {
                    Some(Turn {
                        role: t.role,
                        content: TurnContent::Segments(kept),
                    })
                }
            }
        })
        .collect()
}

/// 构造请求体（纯函数，便于测试）
pub fn request_body(request: &LlmRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "system": [{
            "type": "text",
            "text": request.system,
            "cache_control": {"type": "ephemeral"}
        }],
        "messages": wire_turns(&request.turns),
    });
    if !request.tools.is_empty() {
        body["tools"] = json!(request.tools);
        body["tool_choice"] = json!(request.tool_choice);
    }
    if let Some(budget) = request.thinking_budget {
        body["thinking"] = json!({"type": "enabled", "budget_tokens": budget});
    }
    body
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);
        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request_body(request))
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let wire: WireResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        let content = wire.content.ok_or(LlmError::EmptyResponse)?;
        Ok(LlmResponse {
            content,
            usage: wire.usage,
            stop_reason: StopReason::parse(wire.stop_reason.as_deref().unwrap_or("")),
        })
    }
}
