//! Bank Notification Bridge - 捕获银行类应用的系统通知并交给消费方
//!
//! 监听服务把原始通知分类、提取正文后同时推到 live 广播和持久化队列；
//! 消费方离线期间错过的通知可以从队列取回，或从仍在显示的通知中补偿扫描。

pub mod config;
pub mod error;
pub mod listener;
pub mod notification;
pub mod plugin;
pub mod reprocessor;

pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use listener::{
    ConnectionState, FileHost, HostSignal, ListenerRegistry, ListenerService, NotificationHost,
};
pub use notification::{
    Classifier, EventOrigin, Extractor, JsonLinesSink, MemorySink, NotificationEvent,
    NotificationSink, PersistentQueue, RawEvent, SendResult,
};
pub use plugin::{ActiveNotification, NotificationListenerPlugin, ReprocessSummary, StopAck};
pub use reprocessor::{RecoveryMode, RecoveryOutcome, RecoveryScan, Reprocessor};
