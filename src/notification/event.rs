//! 通知事件结构
//!
//! `RawEvent` 是宿主系统投递的原始通知，`NotificationEvent` 是分类和文本提取之后交给消费方的结构化事件。
//! live 广播、持久化队列和补偿扫描三条路径共用同一个序列化格式。

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 原始通知 payload 中的字段名
pub mod fields {
    pub const TITLE: &str = "android.title";
    pub const BIG_TEXT: &str = "android.bigText";
    pub const TEXT: &str = "android.text";
    pub const TEXT_LINES: &str = "android.textLines";
    pub const MESSAGES: &str = "android.messages";
    pub const INFO_TEXT: &str = "android.infoText";
    pub const SUB_TEXT: &str = "android.subText";
    /// messages 数组中每条记录的文本字段
    pub const MESSAGE_TEXT: &str = "text";
}

/// 宿主投递的原始通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// 来源标识（包名）
    #[serde(alias = "packageName")]
    pub source_id: String,
    /// 每条通知实例的稳定键，同一通知更新时保持不变
    pub key: String,
    /// 发布时间（毫秒）
    #[serde(alias = "postTime")]
    pub post_time: i64,
    /// 字段集合，键和值的形状取决于发布方
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl RawEvent {
    pub fn new(source_id: impl Into<String>, key: impl Into<String>, post_time: i64) -> Self {
        Self {
            source_id: source_id.into(),
            key: key.into(),
            post_time,
            payload: Map::new(),
        }
    }

    /// 设置字段
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(name.to_string(), value.into());
        self
    }

    /// 通知标题，缺失时为空字符串
    pub fn title(&self) -> &str {
        self.string_field(fields::TITLE).unwrap_or("")
    }

    /// 读取字符串字段
    pub fn string_field(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(Value::as_str)
    }

    /// payload 中所有字段名（用于调试日志）
    pub fn field_names(&self) -> Vec<&str> {
        self.payload.keys().map(String::as_str).collect()
    }
}

/// 事件来源路径
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOrigin {
    /// 实时监听
    #[default]
    Live,
    /// 从持久化队列取出
    Queued,
    /// 补偿扫描重新生成
    Reprocessed,
}

/// 交给消费方的结构化事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// 来源标识（包名）
    #[serde(alias = "packageName")]
    pub source_id: String,
    /// 友好名称
    #[serde(alias = "appName")]
    pub label: String,
    /// 标题
    #[serde(default)]
    pub title: String,
    /// 提取出的文本
    pub text: String,
    /// 发布时间（毫秒）
    #[serde(alias = "timestamp")]
    pub timestamp_millis: i64,
    /// 来源路径，旧记录缺失时视为 live
    #[serde(default)]
    pub origin: EventOrigin,
    /// 稳定键（用于 mark_as_processed）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl NotificationEvent {
    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// 从 JSON 字符串解析
    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }

    /// 以新的来源路径返回副本
    pub fn with_origin(self, origin: EventOrigin) -> Self {
        Self { origin, ..self }
    }
}

/// 事件构建器
#[derive(Debug, Default)]
pub struct NotificationEventBuilder {
    source_id: Option<String>,
    label: Option<String>,
    title: Option<String>,
    text: Option<String>,
    timestamp_millis: Option<i64>,
    origin: EventOrigin,
    key: Option<String>,
}

impl NotificationEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从原始通知预填来源、标题、时间和稳定键
    pub fn from_raw(raw: &RawEvent) -> Self {
        Self::new()
            .source_id(&raw.source_id)
            .title(raw.title())
            .timestamp_millis(raw.post_time)
            .key(&raw.key)
    }

    pub fn source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn timestamp_millis(mut self, timestamp_millis: i64) -> Self {
        self.timestamp_millis = Some(timestamp_millis);
        self
    }

    pub fn origin(mut self, origin: EventOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// 构建事件
    pub fn build(self) -> Result<NotificationEvent, &'static str> {
        let source_id = self.source_id.ok_or("source_id is required")?;
        let label = self.label.ok_or("label is required")?;
        let text = self.text.ok_or("text is required")?;

        Ok(NotificationEvent {
            source_id,
            label,
            title: self.title.unwrap_or_default(),
            text,
            timestamp_millis: self
                .timestamp_millis
                .unwrap_or_else(|| Utc::now().timestamp_millis()),
            origin: self.origin,
            key: self.key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_raw() -> RawEvent {
        RawEvent::new("it.poste.postepay", "0|it.poste.postepay|7|null|10123", 1_700_000_000_000)
            .with_field(fields::TITLE, "Postepay")
            .with_field(fields::TEXT, "Pagamento di 42,00€")
    }

    #[test]
    fn test_raw_event_accessors() {
        let raw = sample_raw();
        assert_eq!(raw.title(), "Postepay");
        assert_eq!(raw.string_field(fields::TEXT), Some("Pagamento di 42,00€"));
        assert_eq!(raw.string_field(fields::BIG_TEXT), None);
        assert_eq!(raw.field_names().len(), 2);
    }

    #[test]
    fn test_raw_event_title_defaults_to_empty() {
        let raw = RawEvent::new("com.revolut.revolut", "k", 0).with_field(fields::TITLE, 5);
        assert_eq!(raw.title(), "");
    }

    #[test]
    fn test_raw_event_accepts_host_field_names() {
        let raw: RawEvent = serde_json::from_value(json!({
            "packageName": "com.revolut.revolut",
            "key": "k1",
            "postTime": 42,
        }))
        .unwrap();
        assert_eq!(raw.source_id, "com.revolut.revolut");
        assert_eq!(raw.post_time, 42);
        assert!(raw.payload.is_empty());
    }

    #[test]
    fn test_builder_from_raw() {
        let raw = sample_raw();
        let event = NotificationEventBuilder::from_raw(&raw)
            .label("postepay")
            .text("Pagamento di 42,00€")
            .build()
            .unwrap();

        assert_eq!(event.source_id, "it.poste.postepay");
        assert_eq!(event.title, "Postepay");
        assert_eq!(event.timestamp_millis, 1_700_000_000_000);
        assert_eq!(event.origin, EventOrigin::Live);
        assert_eq!(event.key.as_deref(), Some("0|it.poste.postepay|7|null|10123"));
    }

    #[test]
    fn test_builder_requires_fields() {
        assert_eq!(
            NotificationEventBuilder::new().label("x").text("y").build().unwrap_err(),
            "source_id is required"
        );
        assert_eq!(
            NotificationEventBuilder::new().source_id("a").label("x").build().unwrap_err(),
            "text is required"
        );
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let event = NotificationEventBuilder::new()
            .source_id("com.revolut.revolut")
            .label("revolut")
            .text("Hai speso 3€")
            .timestamp_millis(10)
            .origin(EventOrigin::Reprocessed)
            .build()
            .unwrap();

        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["sourceId"], "com.revolut.revolut");
        assert_eq!(value["timestampMillis"], 10);
        assert_eq!(value["origin"], "reprocessed");
        assert!(value.get("key").is_none());
    }

    #[test]
    fn test_legacy_record_backward_compat() {
        // 旧格式：packageName/appName/timestamp，无 origin
        let old = r#"{"packageName":"com.paypal.android.p2pmobile","appName":"paypal","title":"PayPal","text":"Hai ricevuto 5€","timestamp":1700000000000}"#;
        let event = NotificationEvent::from_json(old).unwrap();
        assert_eq!(event.source_id, "com.paypal.android.p2pmobile");
        assert_eq!(event.label, "paypal");
        assert_eq!(event.origin, EventOrigin::Live);
        assert!(event.key.is_none());
    }

    #[test]
    fn test_with_origin() {
        let event = NotificationEventBuilder::new()
            .source_id("a")
            .label("a")
            .text("t")
            .build()
            .unwrap()
            .with_origin(EventOrigin::Queued);
        assert_eq!(event.origin, EventOrigin::Queued);
    }
}
