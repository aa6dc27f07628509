//! 错误 / 温度策略
//!
//! 按顺序记录失败的 (工具, 参数)；最近 K 条完全相同时升温一次，最近 L 条完全相同时触发锁定。
//! 出现干净的工具轮或纯文本轮时清空历史并恢复基线温度。

use serde_json::Value;

/// 失败调用的键：工具名 + 参数，结构相等即视为重复
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallKey {
    pub tool: String,
    pub params: Value,
}

impl ToolCallKey {
    pub fn new(tool: impl Into<String>, params: Value) -> Self {
        Self {
            tool: tool.into(),
            params,
        }
    }
}

/// 阈值与温度参数
#[derive(Debug, Clone, Copy)]
pub struct PolicyThresholds {
    /// K：升温阈值
    pub repeated_error: usize,
    /// L：锁定阈值
    pub lockout: usize,
    pub elevated_temperature: f32,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            repeated_error: 2,
            lockout: 5,
            elevated_temperature: 1.0,
        }
    }
}

/// 会话内的失败历史与当前温度
#[derive(Debug)]
pub struct ErrorPolicy {
    thresholds: PolicyThresholds,
    baseline: f32,
    temperature: f32,
    escalated: bool,
    history: Vec<ToolCallKey>,
}

/// 最近 n 条是否完全相同（不足 n 条时为 false）
fn tail_identical(history: &[ToolCallKey], n: usize) -> bool {
    if n == 0 || history.len() < n {
        return false;
    }
    let tail = &history[history.len() - n..];
    tail.iter().all(|k| k == &tail[0])
}

impl ErrorPolicy {
    pub fn new(baseline: f32, thresholds: PolicyThresholds) -> Self {
        Self {
            thresholds,
            baseline,
            temperature: baseline,
            escalated: false,
            history: Vec::new(),
        }
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn is_escalated(&self) -> bool {
        self.escalated
    }

    pub fn history(&self) -> &[ToolCallKey] {
        &self.history
    }

    /// 根据本轮结果更新历史与温度
    pub fn observe(&mut self, failures: Vec<ToolCallKey>, had_tool_use: bool) {
        if !failures.is_empty() {
            self.history.extend(failures);
            if !self.escalated && tail_identical(&self.history, self.thresholds.repeated_error) {
                self.escalated = true;
                self.temperature = self.thresholds.elevated_temperature;
                if let Some(last) = self.history.last() {
                    tracing::info!(
                        tool = %last.tool,
                        temperature = self.temperature,
                        "repeated identical failures, raising temperature"
                    );
                }
            }
            return;
        }

        if had_tool_use {
            tracing::debug!("clean tool turn, clearing error history");
        }
        self.reset();
    }

    /// 最近 L 条失败完全相同时清空历史并返回该键；调用方负责禁用下一次调用的工具
    pub fn take_lockout(&mut self) -> Option<ToolCallKey> {
        if !tail_identical(&self.history, self.thresholds.lockout) {
            return None;
        }
        let key = self.history.last().cloned();
        self.reset();
        key
    }

    fn reset(&mut self) {
        self.history.clear();
        self.temperature = self.baseline;
        self.escalated = false;
    }
}
