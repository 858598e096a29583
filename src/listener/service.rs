//! 监听服务 - 原始通知流的唯一入口
//!
//! 宿主回调被建模为 `HostSignal` 消息，由单个处理循环消费。
//! 回调边界内的任何错误（包括 panic）都在本地记录，不会传出去。

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::host::NotificationHost;
use super::registry::{ListenerHandle, ListenerRegistry};
use super::state::{ConnectionState, LifecycleEvent};
use crate::notification::extractor::log_payload_for_debug;
use crate::notification::{
    Classifier, EventOrigin, Extractor, NotificationDispatcher, NotificationEvent,
    NotificationEventBuilder, RawEvent,
};

/// 宿主投递的信号
#[derive(Debug, Clone)]
pub enum HostSignal {
    /// 宿主确认通知流已接通
    Connected,
    /// 宿主断开绑定
    Disconnected,
    /// 新通知（或同一通知的更新）
    Posted(RawEvent),
    /// 通知被清除
    Removed { key: String },
    /// 服务销毁
    Destroyed,
}

/// 监听服务
pub struct ListenerService {
    handle: Arc<ListenerHandle>,
    registry: ListenerRegistry,
    classifier: Arc<Classifier>,
    extractor: Arc<Extractor>,
    dispatcher: NotificationDispatcher,
}

impl ListenerService {
    /// 创建服务（Created 状态）并发布句柄
    pub fn create(
        host: Arc<dyn NotificationHost>,
        registry: ListenerRegistry,
        classifier: Arc<Classifier>,
        extractor: Arc<Extractor>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        let handle = Arc::new(ListenerHandle::new(host));
        registry.publish(handle.clone());
        info!("BankNotificationListenerService created");

        Self {
            handle,
            registry,
            classifier,
            extractor,
            dispatcher,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    /// 处理一个信号，返回服务是否仍然存活
    pub fn handle_signal(&self, signal: HostSignal) -> bool {
        match signal {
            HostSignal::Connected => self.apply(LifecycleEvent::Connect),
            HostSignal::Disconnected => self.apply(LifecycleEvent::Disconnect),
            HostSignal::Destroyed => self.apply(LifecycleEvent::Destroy),
            HostSignal::Posted(raw) => {
                if !self.state().is_alive() {
                    warn!(key = %raw.key, "Notification posted after destroy, ignoring");
                    return false;
                }
                guard_callback(&raw, || self.on_raw_event(&raw));
            }
            HostSignal::Removed { key } => {
                debug!(key = %key, "Notification removed");
            }
        }

        self.state().is_alive()
    }

    /// 处理单条原始通知，返回分发出去的事件
    pub fn on_raw_event(&self, raw: &RawEvent) -> Option<NotificationEvent> {
        debug!(source = %raw.source_id, key = %raw.key, "[ALL_NOTIF] notification posted");

        let classification = self.classifier.classify(&raw.source_id);
        if !classification.accepted {
            return None;
        }

        let extraction = match self.extractor.extract(&raw.payload) {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!(source = %raw.source_id, key = %raw.key, error = %e, "[SKIP] Could not extract text");
                log_payload_for_debug(&raw.source_id, &raw.payload);
                return None;
            }
        };

        let event = match NotificationEventBuilder::from_raw(raw)
            .label(classification.label)
            .text(extraction.text)
            .origin(EventOrigin::Live)
            .build()
        {
            Ok(event) => event,
            Err(e) => {
                warn!(source = %raw.source_id, error = %e, "Failed to build notification event");
                return None;
            }
        };

        info!(
            source = %event.source_id,
            label = %event.label,
            field = extraction.field,
            "Bank notification captured"
        );
        self.dispatcher.dispatch(&event);
        Some(event)
    }

    fn apply(&self, event: LifecycleEvent) {
        let current = self.state();
        let Some(transition) = current.on(event) else {
            warn!(state = %current, event = ?event, "Lifecycle event after destroy, ignoring");
            return;
        };

        self.handle.set_state(transition.next);
        info!(from = %current, to = %transition.next, "Listener state changed");

        if transition.next == ConnectionState::Destroyed {
            self.registry.clear_if(&self.handle);
        }
        if transition.rebind {
            self.request_rebind(transition.next);
        }
    }

    /// 请求宿主重新绑定（即发即忘，失败只记录）
    fn request_rebind(&self, state: ConnectionState) {
        let host = self.handle.host().clone();
        let rebind = move || match host.request_rebind() {
            Ok(()) => info!(state = %state, "requestRebind() called successfully"),
            Err(e) => warn!(state = %state, error = %e, "Error calling requestRebind"),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(rebind);
            }
            Err(_) => rebind(),
        }
    }

    /// 消费信号直到销毁或通道关闭
    pub async fn run(self, mut rx: mpsc::Receiver<HostSignal>) {
        while let Some(signal) = rx.recv().await {
            if !self.handle_signal(signal) {
                break;
            }
        }

        if self.state().is_alive() {
            debug!("Signal channel closed, destroying listener");
            self.apply(LifecycleEvent::Destroy);
        }
        info!("BankNotificationListenerService destroyed");
    }

    /// 在后台任务中运行
    pub fn spawn(self, rx: mpsc::Receiver<HostSignal>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }
}

/// 在回调边界内执行处理，panic 只记录日志；返回处理是否正常结束
fn guard_callback<T>(raw: &RawEvent, process: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(process)) {
        Ok(value) => Some(value),
        Err(_) => {
            error!(source = %raw.source_id, key = %raw.key, "Panic while processing notification");
            None
        }
    }
}
