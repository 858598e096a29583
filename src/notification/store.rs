//! 持久化队列 - 消费方不在线时暂存事件
//!
//! 单个 JSON 数组文件，append 在尾部追加，drain 一次性取出全部并重置为 `[]`。
//! 读-改-写都在同一把排他文件锁内完成，写入走临时文件 + rename。

use anyhow::Result;
use fs2::FileExt;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::event::{EventOrigin, NotificationEvent};

/// 持久化队列
#[derive(Debug, Clone)]
pub struct PersistentQueue {
    path: PathBuf,
}

impl PersistentQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 队列文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    /// 在排他锁保护下执行读-改-写
    fn with_locked_queue<F, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Value>) -> Result<T>,
    {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(self.lock_path())?;
        lock_file.lock_exclusive()?;

        let result = (|| {
            let mut records = self.read_records()?;
            let result = operation(&mut records)?;
            self.write_records(&records)?;
            Ok(result)
        })();

        let _ = lock_file.unlock();

        result
    }

    /// 读取原始记录（不加锁）
    ///
    /// 文件不存在视为空；顶层不是 JSON 数组时整个文件已无法使用，记录警告后视为空。
    fn read_records(&self) -> Result<Vec<Value>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(records)) => Ok(records),
            Ok(other) => {
                warn!(
                    path = %self.path.display(),
                    kind = %json_kind(&other),
                    "Queue file is not a JSON array, discarding"
                );
                Ok(Vec::new())
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Queue file is corrupt, discarding"
                );
                Ok(Vec::new())
            }
        }
    }

    /// 写入记录（不加锁），临时文件 + 原子替换
    fn write_records(&self, records: &[Value]) -> Result<()> {
        let temp_path = self.path.with_extension("json.tmp");
        {
            let mut temp_file = File::create(&temp_path)?;
            temp_file.write_all(serde_json::to_string(records)?.as_bytes())?;
            temp_file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// 追加事件，返回追加后的队列长度
    pub fn append(&self, event: &NotificationEvent) -> Result<usize> {
        let record = serde_json::to_value(event)?;
        let total = self.with_locked_queue(|records| {
            records.push(record);
            Ok(records.len())
        })?;

        debug!(source = %event.source_id, total, "Notification saved to persistent queue");
        Ok(total)
    }

    /// 取出全部事件并清空队列
    ///
    /// 无法解析的记录单独跳过，不影响其余记录；无论是否有坏记录，队列都会被清空。
    pub fn drain_all(&self) -> Result<Vec<NotificationEvent>> {
        let records = self.with_locked_queue(|records| Ok(std::mem::take(records)))?;

        let total = records.len();
        let events: Vec<NotificationEvent> = records
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| match decode_record(record) {
                Ok(event) => Some(event.with_origin(EventOrigin::Queued)),
                Err(e) => {
                    warn!(index, error = %e, "Skipping malformed queue record");
                    None
                }
            })
            .collect();

        info!(found = total, returned = events.len(), "Pending notifications drained");
        Ok(events)
    }

    /// 当前队列长度（只读，不清空）
    pub fn len(&self) -> Result<usize> {
        let lock_file = File::open(self.lock_path()).ok();
        if let Some(f) = &lock_file {
            f.lock_shared()?;
        }
        let count = self.read_records().map(|r| r.len());
        if let Some(f) = &lock_file {
            let _ = f.unlock();
        }
        count
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// 解析单条记录：对象形式或序列化后的字符串形式
fn decode_record(record: Value) -> serde_json::Result<NotificationEvent> {
    match record {
        Value::String(data) => NotificationEvent::from_json(&data),
        other => serde_json::from_value(other),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
