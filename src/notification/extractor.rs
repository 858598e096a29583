//! 文本提取 - 按优先级从不同形状的 payload 中取出可读文本
//!
//! 不同应用使用不同的通知样式（普通、大文本、多行、聊天），
//! 提取链按顺序尝试每个策略，第一个非空结果胜出。

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::event::fields;
use crate::error::BridgeError;

/// 单个提取策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// 字符串字段
    Text(&'static str),
    /// 字符串数组，空格拼接，跳过空行
    Lines(&'static str),
    /// 记录数组，取每条记录的 text 子字段，空格拼接
    Messages(&'static str),
}

impl Strategy {
    /// 策略读取的字段名
    pub fn field(&self) -> &'static str {
        match self {
            Strategy::Text(f) | Strategy::Lines(f) | Strategy::Messages(f) => f,
        }
    }

    fn apply(&self, payload: &Map<String, Value>) -> Option<String> {
        let value = payload.get(self.field())?;
        let text = match self {
            Strategy::Text(_) => value.as_str().map(str::to_string),
            Strategy::Lines(_) => value.as_array().map(|lines| {
                join_non_empty(lines.iter().filter_map(Value::as_str))
            }),
            Strategy::Messages(_) => value.as_array().map(|messages| {
                join_non_empty(
                    messages
                        .iter()
                        .filter_map(|m| m.get(fields::MESSAGE_TEXT))
                        .filter_map(Value::as_str),
                )
            }),
        }?;

        // 只含空白的字段同样按空处理，继续尝试下一个字段
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// 默认提取链
pub const DEFAULT_CHAIN: [Strategy; 6] = [
    Strategy::Text(fields::BIG_TEXT),
    Strategy::Text(fields::TEXT),
    Strategy::Lines(fields::TEXT_LINES),
    Strategy::Messages(fields::MESSAGES),
    Strategy::Text(fields::INFO_TEXT),
    Strategy::Text(fields::SUB_TEXT),
];

/// 提取结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    /// 命中的字段
    pub field: &'static str,
}

/// 文本提取器
#[derive(Debug, Clone)]
pub struct Extractor {
    chain: Vec<Strategy>,
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            chain: DEFAULT_CHAIN.to_vec(),
        }
    }

    /// 使用自定义提取链
    pub fn with_chain(chain: Vec<Strategy>) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &[Strategy] {
        &self.chain
    }

    /// 提取文本，所有策略都为空时返回 `ExtractionFailed`
    pub fn extract(&self, payload: &Map<String, Value>) -> Result<Extraction, BridgeError> {
        for strategy in &self.chain {
            if let Some(text) = strategy.apply(payload) {
                debug!(field = strategy.field(), "Text extracted");
                return Ok(Extraction {
                    text,
                    field: strategy.field(),
                });
            }
        }

        Err(BridgeError::ExtractionFailed)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

fn join_non_empty<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 记录 payload 的全部字段（长值截断），用于排查未知通知格式
pub fn log_payload_for_debug(source_id: &str, payload: &Map<String, Value>) {
    if payload.is_empty() {
        warn!(source = %source_id, "Notification payload is empty");
        return;
    }

    for (key, value) in payload {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        debug!(
            source = %source_id,
            field = %key,
            value = %truncate_chars(&rendered, 100),
            "Payload field"
        );
    }
}

/// 按字符截断，避免切到多字节字符中间
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}
