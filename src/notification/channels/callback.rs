//! 回调 sink - 每个事件调用一次消费方闭包

use anyhow::Result;

use crate::notification::channel::{NotificationSink, SendResult};
use crate::notification::event::NotificationEvent;

/// 回调 sink
pub struct CallbackSink<F>
where
    F: Fn(&NotificationEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: Fn(&NotificationEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> NotificationSink for CallbackSink<F>
where
    F: Fn(&NotificationEvent) + Send + Sync,
{
    fn name(&self) -> &str {
        "callback"
    }

    fn deliver(&self, event: &NotificationEvent) -> Result<SendResult> {
        (self.callback)(event);
        Ok(SendResult::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::event::NotificationEventBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_callback_invoked_once_per_event() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let sink = CallbackSink::new(move |_event: &NotificationEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let event = NotificationEventBuilder::new()
            .source_id("com.revolut.revolut")
            .label("revolut")
            .text("x")
            .build()
            .unwrap();
        sink.deliver(&event).unwrap();
        sink.deliver(&event).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
