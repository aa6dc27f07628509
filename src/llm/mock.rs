//! 脚本化 LLM 客户端（用于测试，无需 API）
//!
//! 按顺序回放预置的响应，并记录每一次收到的请求，便于断言温度、工具开关与对话内容。
//! 队列耗尽时返回 EmptyResponse。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{LlmClient, LlmError, LlmRequest, LlmResponse, StopReason, Usage};
use crate::memory::ContentSegment;

#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: LlmResponse) -> &Self {
        self.push_result(Ok(response))
    }

    pub fn push_result(&self, result: Result<LlmResponse, LlmError>) -> &Self {
        if let Ok(mut q) = self.responses.lock() {
            q.push_back(result);
        }
        self
    }

    /// 已收到的请求快照
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        if let Ok(mut r) = self.requests.lock() {
            r.push(request.clone());
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or(Err(LlmError::EmptyResponse))
    }
}

/// 纯文本响应
pub fn text_response(text: &str, stop_reason: StopReason) -> LlmResponse {
    LlmResponse {
        content: vec![ContentSegment::text(text)],
        usage: Usage::default(),
        stop_reason,
    }
}

/// 单个工具调用响应
pub fn tool_response(id: &str, name: &str, parameters: Value) -> LlmResponse {
    LlmResponse {
        content: vec![ContentSegment::ToolInvocation {
            invocation_id: id.to_string(),
            name: name.to_string(),
            parameters,
        }],
        usage: Usage::default(),
        stop_reason: StopReason::ToolUse,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolChoice;

    fn request() -> LlmRequest {
        LlmRequest {
            model: "m".into(),
            system: String::new(),
            turns: vec![],
            max_tokens: 16,
            temperature: 0.0,
            tools: vec![],
            tool_choice: ToolChoice::Auto,
            thinking_budget: None,
        }
    }

    #[tokio::test]
    async fn test_replays_in_order_then_errors() {
        let llm = ScriptedLlmClient::new();
        llm.push(text_response("one", StopReason::EndTurn))
            .push(text_response("two", StopReason::EndTurn));

        let r1 = llm.send(&request()).await.unwrap();
        let r2 = llm.send(&request()).await.unwrap();
        assert_eq!(r1.first_text(), Some("one"));
        assert_eq!(r2.first_text(), Some("two"));
        assert_eq!(llm.send(&request()).await.unwrap_err(), LlmError::EmptyResponse);
        assert_eq!(llm.call_count(), 3);
    }
}
