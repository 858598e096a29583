//! 消费方 sink trait 定义
//!
//! 每次调用投递一个 `NotificationEvent`。live 桥接和补偿扫描都通过 sink 推送给消费方。

use anyhow::Result;

use super::event::NotificationEvent;

/// 投递结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// 投递成功
    Delivered,
    /// 跳过
    Skipped(String),
    /// 投递失败
    Failed(String),
}

/// 消费方 sink
pub trait NotificationSink: Send + Sync {
    /// sink 名称（用于日志）
    fn name(&self) -> &str;

    /// 投递单个事件
    fn deliver(&self, event: &NotificationEvent) -> Result<SendResult>;
}

/// 投递并吞掉错误，返回是否成功
///
/// 调用方处在宿主回调或后台任务里，错误只能记录不能上抛。
pub fn deliver_logged(sink: &dyn NotificationSink, event: &NotificationEvent) -> bool {
    match sink.deliver(event) {
        Ok(SendResult::Delivered) => true,
        Ok(SendResult::Skipped(reason)) => {
            tracing::debug!(sink = sink.name(), reason = %reason, "Sink skipped event");
            false
        }
        Ok(SendResult::Failed(reason)) => {
            tracing::warn!(sink = sink.name(), reason = %reason, "Sink failed to deliver event");
            false
        }
        Err(e) => {
            tracing::warn!(sink = sink.name(), error = %e, "Sink returned error");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::event::NotificationEventBuilder;

    struct FixedSink(SendResult);

    impl NotificationSink for FixedSink {
        fn name(&self) -> &str {
            "fixed"
        }

        fn deliver(&self, _event: &NotificationEvent) -> Result<SendResult> {
            Ok(self.0.clone())
        }
    }

    struct ErrSink;

    impl NotificationSink for ErrSink {
        fn name(&self) -> &str {
            "err"
        }

        fn deliver(&self, _event: &NotificationEvent) -> Result<SendResult> {
            Err(anyhow::anyhow!("consumer detached"))
        }
    }

    fn event() -> NotificationEvent {
        NotificationEventBuilder::new()
            .source_id("com.revolut.revolut")
            .label("revolut")
            .text("Hai speso 3€")
            .build()
            .unwrap()
    }

    #[test]
    fn test_deliver_logged() {
        assert!(deliver_logged(&FixedSink(SendResult::Delivered), &event()));
        assert!(!deliver_logged(&FixedSink(SendResult::Skipped("x".into())), &event()));
        assert!(!deliver_logged(&FixedSink(SendResult::Failed("x".into())), &event()));
        assert!(!deliver_logged(&ErrSink, &event()));
    }
}
