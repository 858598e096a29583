//! 通知处理层 - 分类、提取、分发、持久化、去重
//!
//! # 数据流
//! ```text
//! RawEvent ─▶ Classifier ─▶ Extractor ─▶ NotificationDispatcher ─┬─▶ live 广播 ─▶ LiveBridge ─▶ sink
//!                                                                 └─▶ PersistentQueue
//! ```
//!
//! # 使用示例
//! ```ignore
//! use bank_notification_bridge::notification::{Classifier, Extractor};
//!
//! let classification = Classifier::new().classify("it.poste.postepay");
//! assert_eq!(classification.label, "postepay");
//! let text = Extractor::new().extract(&raw.payload)?.text;
//! ```

pub mod bridge;
pub mod channel;
pub mod channels;
pub mod classifier;
pub mod deduplicator;
pub mod dispatcher;
pub mod event;
pub mod extractor;
pub mod store;

pub use bridge::LiveBridge;
pub use channel::{deliver_logged, NotificationSink, SendResult};
pub use channels::{CallbackSink, JsonLinesSink, MemorySink};
pub use classifier::{Classification, Classifier};
pub use deduplicator::ProcessedKeySet;
pub use dispatcher::{DispatchOutcome, NotificationDispatcher};
pub use event::{EventOrigin, NotificationEvent, NotificationEventBuilder, RawEvent};
pub use extractor::{Extraction, Extractor, Strategy};
pub use store::PersistentQueue;
