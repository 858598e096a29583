//! 对外接口 - 组装整条管道并暴露给消费方的操作
//!
//! 插件持有分类器、提取器、队列、去重集合和 live 桥接，
//! 监听服务由 `create_listener` 创建，句柄通过共享的 `ListenerRegistry` 发布。

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::listener::{is_component_enabled, ListenerRegistry, ListenerService, NotificationHost};
use crate::notification::event::fields;
use crate::notification::{
    Classifier, Extractor, LiveBridge, NotificationDispatcher, NotificationEvent,
    NotificationSink, PersistentQueue, ProcessedKeySet, RawEvent,
};
use crate::reprocessor::{RecoveryMode, Reprocessor};

/// `stop_listening` 的回执
pub const STOP_MESSAGE: &str = "Service cannot be stopped programmatically";

/// 停止请求回执（监听服务只能由用户在系统设置中关闭）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopAck {
    pub message: String,
}

/// 强制重处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReprocessSummary {
    /// 投递给 sink 的数量
    pub reprocessed: usize,
    /// 活跃通知总数
    pub total: usize,
}

/// 活跃通知的调试视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveNotification {
    pub source_id: String,
    pub key: String,
    pub post_time: i64,
    pub title: String,
    pub text: String,
    pub big_text: String,
    pub payload_keys: Vec<String>,
}

impl From<&RawEvent> for ActiveNotification {
    fn from(raw: &RawEvent) -> Self {
        let field = |name: &str| raw.string_field(name).unwrap_or_default().to_string();
        Self {
            source_id: raw.source_id.clone(),
            key: raw.key.clone(),
            post_time: raw.post_time,
            title: field(fields::TITLE),
            text: field(fields::TEXT),
            big_text: field(fields::BIG_TEXT),
            payload_keys: raw.field_names().into_iter().map(String::from).collect(),
        }
    }
}

/// 银行通知插件
pub struct NotificationListenerPlugin {
    config: BridgeConfig,
    host: Arc<dyn NotificationHost>,
    registry: ListenerRegistry,
    classifier: Arc<Classifier>,
    extractor: Arc<Extractor>,
    queue: Arc<PersistentQueue>,
    dispatcher: NotificationDispatcher,
    bridge: LiveBridge,
    reprocessor: Reprocessor,
}

impl NotificationListenerPlugin {
    pub fn new(
        config: BridgeConfig,
        host: Arc<dyn NotificationHost>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let mut classifier = Classifier::new().with_keyword_heuristic(config.keyword_heuristic);
        for (source_id, label) in &config.extra_sources {
            classifier = classifier.with_source(source_id, label);
        }
        let classifier = Arc::new(classifier);
        let extractor = Arc::new(Extractor::new());

        let queue = Arc::new(PersistentQueue::new(config.queue_path()));
        let processed = Arc::new(Mutex::new(
            ProcessedKeySet::new()
                .with_window(config.recovery_window())
                .with_capacity(config.dedup_capacity),
        ));

        let (live, _) = broadcast::channel(config.live_channel_capacity.max(1));
        let dispatcher = NotificationDispatcher::new(live, queue.clone());
        let registry = ListenerRegistry::new();

        let bridge = LiveBridge::new(sink.clone(), processed.clone());
        let reprocessor = Reprocessor::new(
            registry.clone(),
            classifier.clone(),
            extractor.clone(),
            processed,
            sink,
        );

        debug!(queue = %queue.path().display(), "Notification plugin created");

        Self {
            config,
            host,
            registry,
            classifier,
            extractor,
            queue,
            dispatcher,
            bridge,
            reprocessor,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &PersistentQueue {
        &self.queue
    }

    /// 启动 live 桥接任务，所有发送端释放后任务结束并返回投递数量
    pub fn load(&self) -> JoinHandle<usize> {
        info!("NotificationListenerPlugin loaded");
        tokio::spawn(self.bridge.clone().run(self.dispatcher.subscribe()))
    }

    /// 创建监听服务并发布句柄
    pub fn create_listener(&self) -> ListenerService {
        ListenerService::create(
            self.host.clone(),
            self.registry.clone(),
            self.classifier.clone(),
            self.extractor.clone(),
            self.dispatcher.clone(),
        )
    }

    /// 等待设置生效后检查权限
    pub async fn is_enabled(&self) -> bool {
        tokio::time::sleep(self.config.settle_delay()).await;
        let enabled = self.check_enabled();
        info!(enabled, "Notification listener permission checked");
        enabled
    }

    /// 立即检查权限，查询失败视为未开启
    pub fn check_enabled(&self) -> bool {
        match self.host.enabled_listeners() {
            Ok(Some(flat)) => is_component_enabled(&flat, &self.config.listener_component),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Failed to read enabled listeners");
                false
            }
        }
    }

    /// 未开启时打开设置页，返回当前权限状态
    pub fn request_permission(&self) -> bool {
        if self.check_enabled() {
            return true;
        }

        match self.host.open_listener_settings() {
            Ok(()) => {
                info!("Opened notification listener settings");
                self.check_enabled()
            }
            Err(e) => {
                warn!(error = %e, "Failed to open notification listener settings");
                false
            }
        }
    }

    pub fn start_listening(&self) -> BridgeResult<bool> {
        if !self.check_enabled() {
            return Err(BridgeError::PermissionDenied);
        }
        info!("Notification listening started");
        Ok(true)
    }

    pub fn stop_listening(&self) -> StopAck {
        info!("Stop requested, listener is managed by system settings");
        StopAck {
            message: STOP_MESSAGE.to_string(),
        }
    }

    /// 取出并清空持久化队列
    pub fn get_pending_notifications(&self) -> BridgeResult<Vec<NotificationEvent>> {
        let events = self.queue.drain_all()?;
        info!(count = events.len(), "Pending notifications drained");
        Ok(events)
    }

    /// 漏收检查：窗口内、未处理过的银行通知；权限未开启或服务未运行时为空
    pub fn check_missed_notifications(&self) -> Vec<NotificationEvent> {
        if !self.check_enabled() {
            debug!("Listener not enabled, no missed notifications");
            return Vec::new();
        }

        match self
            .reprocessor
            .scan(RecoveryMode::missed(self.config.recovery_window()))
        {
            Ok(scan) => scan.events,
            Err(BridgeError::ServiceUnavailable) => {
                debug!("Listener not running, no missed notifications");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Error checking missed notifications");
                Vec::new()
            }
        }
    }

    /// 强制重处理所有活跃通知并投递给 sink
    pub fn reprocess_active_notifications(&self) -> BridgeResult<ReprocessSummary> {
        if !self.check_enabled() {
            return Err(BridgeError::PermissionDenied);
        }

        let outcome = self.reprocessor.recover(RecoveryMode::force())?;
        Ok(ReprocessSummary {
            reprocessed: outcome.delivered,
            total: outcome.total_active,
        })
    }

    /// 标记已处理（幂等）
    pub fn mark_as_processed(&self, key: &str) {
        self.bridge.mark_processed(key);
    }

    /// 所有活跃通知（不做分类），用于排查未识别的来源
    pub fn get_all_active_notifications(&self) -> BridgeResult<Vec<ActiveNotification>> {
        if !self.check_enabled() {
            return Err(BridgeError::PermissionDenied);
        }

        let handle = self
            .registry
            .current()
            .ok_or(BridgeError::ServiceUnavailable)?;
        let active: Vec<ActiveNotification> =
            handle.active_events()?.iter().map(ActiveNotification::from).collect();

        for notification in &active {
            info!(
                source = %notification.source_id,
                title = %notification.title,
                "[ACTIVE] notification"
            );
        }
        info!(count = active.len(), "Active notifications listed");
        Ok(active)
    }
}
