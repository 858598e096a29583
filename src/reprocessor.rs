//! 补偿扫描 - 从仍然显示着的通知中重新生成事件
//!
//! 两种用法：
//! - 漏收检查：尊重去重集合，只看时间窗口内的通知
//! - 强制重处理：忽略去重集合，不限时间
//!
//! 结果直接交给 sink（或以列表返回），不经过分发器和持久化队列。

use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::listener::ListenerRegistry;
use crate::notification::{
    deliver_logged, Classifier, EventOrigin, Extractor, NotificationEvent,
    NotificationEventBuilder, NotificationSink, ProcessedKeySet,
};

/// 默认漏收检查窗口
pub const DEFAULT_RECOVERY_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// 扫描参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryMode {
    /// 只处理窗口内发布的通知，None 表示不限
    pub window: Option<Duration>,
    /// 是否跳过已处理的键并在投递后记录
    pub respect_dedup: bool,
}

impl RecoveryMode {
    /// 漏收检查
    pub fn missed(window: Duration) -> Self {
        Self {
            window: Some(window),
            respect_dedup: true,
        }
    }

    /// 强制重处理
    pub fn force() -> Self {
        Self {
            window: None,
            respect_dedup: false,
        }
    }
}

/// 扫描结果
#[derive(Debug, Clone, Default)]
pub struct RecoveryScan {
    /// 生成的事件（origin = reprocessed）
    pub events: Vec<NotificationEvent>,
    /// 活跃通知总数（含非银行通知）
    pub total_active: usize,
}

/// 投递结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryOutcome {
    /// 投递成功的数量
    pub delivered: usize,
    /// 活跃通知总数
    pub total_active: usize,
}

/// 补偿扫描器
#[derive(Clone)]
pub struct Reprocessor {
    registry: ListenerRegistry,
    classifier: Arc<Classifier>,
    extractor: Arc<Extractor>,
    processed: Arc<Mutex<ProcessedKeySet>>,
    sink: Arc<dyn NotificationSink>,
}

impl Reprocessor {
    pub fn new(
        registry: ListenerRegistry,
        classifier: Arc<Classifier>,
        extractor: Arc<Extractor>,
        processed: Arc<Mutex<ProcessedKeySet>>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            registry,
            classifier,
            extractor,
            processed,
            sink,
        }
    }

    /// 扫描并投递给 sink
    pub fn recover(&self, mode: RecoveryMode) -> BridgeResult<RecoveryOutcome> {
        self.recover_at(mode, Utc::now().timestamp_millis())
    }

    /// 扫描并投递（带时间戳，用于测试）
    pub fn recover_at(&self, mode: RecoveryMode, now_ms: i64) -> BridgeResult<RecoveryOutcome> {
        let scan = self.collect(mode, now_ms)?;
        let mut delivered = 0;

        for event in &scan.events {
            if deliver_logged(self.sink.as_ref(), event) {
                delivered += 1;
            } else if mode.respect_dedup {
                self.release(event);
            }
        }

        info!(
            delivered,
            total = scan.total_active,
            respect_dedup = mode.respect_dedup,
            "Active notifications reprocessed"
        );
        Ok(RecoveryOutcome {
            delivered,
            total_active: scan.total_active,
        })
    }

    /// 扫描并以列表返回（不经过 sink）
    pub fn scan(&self, mode: RecoveryMode) -> BridgeResult<RecoveryScan> {
        self.scan_at(mode, Utc::now().timestamp_millis())
    }

    /// 扫描并以列表返回（带时间戳，用于测试）
    pub fn scan_at(&self, mode: RecoveryMode, now_ms: i64) -> BridgeResult<RecoveryScan> {
        let scan = self.collect(mode, now_ms)?;
        info!(found = scan.events.len(), total = scan.total_active, "Missed notifications scanned");
        Ok(scan)
    }

    /// 生成候选事件
    ///
    /// 尊重去重时，每个候选键在同一次加锁内检查并占用，并发扫描不会拿到同一个键。
    fn collect(&self, mode: RecoveryMode, now_ms: i64) -> BridgeResult<RecoveryScan> {
        let handle = self.registry.current().ok_or(BridgeError::ServiceUnavailable)?;
        let active = handle.active_events()?;
        let cutoff = mode
            .window
            .map(|w| now_ms.saturating_sub(i64::try_from(w.as_millis()).unwrap_or(i64::MAX)));

        let mut events = Vec::new();
        for raw in &active {
            let classification = self.classifier.classify(&raw.source_id);
            if !classification.accepted {
                continue;
            }

            if cutoff.is_some_and(|cutoff| raw.post_time < cutoff) {
                debug!(key = %raw.key, "Skipping notification outside recovery window");
                continue;
            }

            let extraction = match self.extractor.extract(&raw.payload) {
                Ok(extraction) => extraction,
                Err(e) => {
                    warn!(source = %raw.source_id, key = %raw.key, error = %e, "[REPROCESS] Skipping notification");
                    continue;
                }
            };

            let event = match NotificationEventBuilder::from_raw(raw)
                .label(classification.label)
                .text(extraction.text)
                .origin(EventOrigin::Reprocessed)
                .build()
            {
                Ok(event) => event,
                Err(e) => {
                    warn!(source = %raw.source_id, error = %e, "Failed to build event");
                    continue;
                }
            };

            if mode.respect_dedup && !self.reserve(&raw.key, now_ms) {
                debug!(key = %raw.key, "Skipping already processed notification");
                continue;
            }
            events.push(event);
        }

        Ok(RecoveryScan {
            events,
            total_active: active.len(),
        })
    }

    /// 占用键，已被占用时返回 false
    fn reserve(&self, key: &str, now_ms: i64) -> bool {
        match self.processed.lock() {
            Ok(mut set) => set.insert_at(key, now_ms),
            Err(e) => {
                warn!(key = %key, error = %e, "Processed key set lock poisoned");
                false
            }
        }
    }

    /// 投递失败时释放占用，下次扫描可以重试
    fn release(&self, event: &NotificationEvent) {
        let Some(key) = event.key.as_deref() else {
            return;
        };
        match self.processed.lock() {
            Ok(mut set) => {
                set.remove(key);
            }
            Err(e) => warn!(key = %key, error = %e, "Processed key set lock poisoned"),
        }
    }
}
