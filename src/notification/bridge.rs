//! live 桥接 - 接收广播消息并推给消费方 sink
//!
//! live 路径不查去重集合：每条物理通知只广播一次。
//! 已处理键集合主要由补偿扫描读写，`mark_processed` 是消费方主动写入的入口。

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use super::channel::{deliver_logged, NotificationSink};
use super::deduplicator::ProcessedKeySet;
use super::event::NotificationEvent;
use crate::error::BridgeError;

/// live 桥接
#[derive(Clone)]
pub struct LiveBridge {
    sink: Arc<dyn NotificationSink>,
    processed: Arc<Mutex<ProcessedKeySet>>,
}

impl LiveBridge {
    pub fn new(sink: Arc<dyn NotificationSink>, processed: Arc<Mutex<ProcessedKeySet>>) -> Self {
        Self { sink, processed }
    }

    /// 解析 live 消息
    pub fn parse(data: &str) -> Result<NotificationEvent, BridgeError> {
        NotificationEvent::from_json(data).map_err(|e| BridgeError::ParseFailure(e.to_string()))
    }

    /// 处理一条 live 消息，返回是否投递成功；解析失败只记录日志
    pub fn handle_payload(&self, data: &str) -> bool {
        match Self::parse(data) {
            Ok(event) => {
                debug!(source = %event.source_id, "Live event received");
                deliver_logged(self.sink.as_ref(), &event)
            }
            Err(e) => {
                warn!(error = %e, "Dropping unparseable live event");
                false
            }
        }
    }

    /// 消费方主动标记已处理（幂等）
    pub fn mark_processed(&self, key: &str) {
        match self.processed.lock() {
            Ok(mut set) => {
                if set.insert(key) {
                    debug!(key = %key, "Marked notification as processed");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Processed key set lock poisoned"),
        }
    }

    /// 持续接收广播直到发送端关闭，返回投递数量
    pub async fn run(self, mut rx: broadcast::Receiver<String>) -> usize {
        info!(sink = self.sink.name(), "Live bridge started");
        let mut delivered = 0;

        loop {
            match rx.recv().await {
                Ok(data) => {
                    if self.handle_payload(&data) {
                        delivered += 1;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Live bridge lagged, events remain in the persistent queue");
                }
                Err(RecvError::Closed) => break,
            }
        }

        info!(delivered, "Live bridge stopped");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::channels::MemorySink;
    use crate::notification::event::NotificationEventBuilder;

    fn create_bridge() -> (LiveBridge, Arc<MemorySink>, Arc<Mutex<ProcessedKeySet>>) {
        let sink = Arc::new(MemorySink::new());
        let processed = Arc::new(Mutex::new(ProcessedKeySet::new()));
        let bridge = LiveBridge::new(sink.clone(), processed.clone());
        (bridge, sink, processed)
    }

    fn event_json(key: &str) -> String {
        NotificationEventBuilder::new()
            .source_id("com.revolut.revolut")
            .label("revolut")
            .text("Hai speso 3€")
            .key(key)
            .build()
            .unwrap()
            .to_json()
            .unwrap()
    }

    #[test]
    fn test_live_events_forwarded_without_dedup() {
        let (bridge, sink, processed) = create_bridge();
        processed.lock().unwrap().insert("k1");

        assert!(bridge.handle_payload(&event_json("k1")));
        assert!(bridge.handle_payload(&event_json("k1")));
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_malformed_payload_dropped() {
        let (bridge, sink, _) = create_bridge();
        assert!(!bridge.handle_payload("{not json"));
        assert!(!bridge.handle_payload(r#"{"sourceId": "x"}"#));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_mark_processed_idempotent() {
        let (bridge, _, processed) = create_bridge();
        bridge.mark_processed("k1");
        bridge.mark_processed("k1");
        let set = processed.lock().unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains("k1"));
    }

    #[tokio::test]
    async fn test_run_until_closed() {
        let (bridge, sink, _) = create_bridge();
        let (tx, rx) = broadcast::channel(8);
        let handle = tokio::spawn(bridge.run(rx));

        tx.send(event_json("a")).unwrap();
        tx.send("garbage".to_string()).unwrap();
        tx.send(event_json("b")).unwrap();
        drop(tx);

        assert_eq!(handle.await.unwrap(), 2);
        assert_eq!(sink.len(), 2);
    }
}
