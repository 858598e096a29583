//! 事件分发器 - 同时发到 live 广播和持久化队列
//!
//! live 广播即发即忘，订阅者数量可以为零；队列保证消费方离线时事件不丢。
//! 两步互不影响，任一步失败只记录日志。

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::event::NotificationEvent;
use super::store::PersistentQueue;

/// 分发结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// 收到 live 消息的订阅者数量
    pub live_receivers: usize,
    /// 是否写入队列
    pub queued: bool,
}

/// 事件分发器
#[derive(Clone)]
pub struct NotificationDispatcher {
    live: broadcast::Sender<String>,
    queue: Arc<PersistentQueue>,
}

impl NotificationDispatcher {
    pub fn new(live: broadcast::Sender<String>, queue: Arc<PersistentQueue>) -> Self {
        Self { live, queue }
    }

    /// 订阅 live 广播
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.live.subscribe()
    }

    /// 分发事件
    pub fn dispatch(&self, event: &NotificationEvent) -> DispatchOutcome {
        let live_receivers = self.publish_live(event);

        let queued = match self.queue.append(event) {
            Ok(total) => {
                debug!(source = %event.source_id, total, "Event queued");
                true
            }
            Err(e) => {
                warn!(source = %event.source_id, error = %e, "Failed to save notification to queue");
                false
            }
        };

        DispatchOutcome {
            live_receivers,
            queued,
        }
    }

    fn publish_live(&self, event: &NotificationEvent) -> usize {
        let data = match event.to_json() {
            Ok(data) => data,
            Err(e) => {
                warn!(source = %event.source_id, error = %e, "Failed to serialize live event");
                return 0;
            }
        };

        match self.live.send(data) {
            Ok(receivers) => {
                debug!(source = %event.source_id, receivers, "Event broadcast");
                receivers
            }
            Err(_) => {
                debug!(source = %event.source_id, "No live subscribers, relying on queue");
                0
            }
        }
    }
}
