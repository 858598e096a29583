//! JSONL sink - 每个事件写一行 JSON（CLI 输出到 stdout）

use anyhow::Result;
use std::io::{self, Write};
use std::sync::Mutex;
use tracing::debug;

use crate::notification::channel::{NotificationSink, SendResult};
use crate::notification::event::NotificationEvent;

/// JSONL sink
pub struct JsonLinesSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// 写到标准输出
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }
}

impl NotificationSink for JsonLinesSink {
    fn name(&self) -> &str {
        "json_lines"
    }

    fn deliver(&self, event: &NotificationEvent) -> Result<SendResult> {
        let line = event.to_json()?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("json_lines sink lock poisoned"))?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        debug!(sink = "json_lines", source = %event.source_id, "Event written");
        Ok(SendResult::Delivered)
    }
}
