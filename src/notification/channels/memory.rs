//! 内存 sink - 收集所有投递的事件，供嵌入方轮询或测试断言

use anyhow::Result;
use std::sync::Mutex;

use crate::notification::channel::{NotificationSink, SendResult};
use crate::notification::event::NotificationEvent;

/// 内存 sink
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<NotificationEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已收到的事件副本
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// 取出并清空
    pub fn take(&self) -> Vec<NotificationEvent> {
        self.events
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn deliver(&self, event: &NotificationEvent) -> Result<SendResult> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink lock poisoned"))?;
        events.push(event.clone());
        Ok(SendResult::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::event::NotificationEventBuilder;

    #[test]
    fn test_collect_and_take() {
        let sink = MemorySink::new();
        let event = NotificationEventBuilder::new()
            .source_id("it.bnl.apps.banking")
            .label("bnl")
            .text("Prelievo 50€")
            .build()
            .unwrap();

        assert_eq!(sink.deliver(&event).unwrap(), SendResult::Delivered);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.events()[0].text, "Prelievo 50€");

        assert_eq!(sink.take().len(), 1);
        assert!(sink.is_empty());
    }
}
