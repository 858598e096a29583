//! 已处理键集合 - 防止补偿扫描重复投递同一条通知
//!
//! 以通知的稳定键去重。集合有界：
//! 1. 超过时间窗口（默认 24 小时，与漏收检查窗口一致）的记录被清理
//! 2. 超过容量时先淘汰最早插入的记录

use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// 已处理键集合
#[derive(Debug)]
pub struct ProcessedKeySet {
    /// 稳定键 -> 插入时间（毫秒）
    entries: HashMap<String, i64>,
    /// 保留窗口
    window: Duration,
    /// 最大容量
    capacity: usize,
}

impl ProcessedKeySet {
    /// 默认 24 小时窗口，容量 4096
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            window: Duration::from_secs(24 * 60 * 60),
            capacity: 4096,
        }
    }

    /// 设置保留窗口
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// 设置最大容量（至少为 1）
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// 标记为已处理，返回是否为新键
    pub fn insert(&mut self, key: &str) -> bool {
        self.insert_at(key, Utc::now().timestamp_millis())
    }

    /// 标记为已处理（带时间戳，用于测试）
    pub fn insert_at(&mut self, key: &str, now_ms: i64) -> bool {
        self.cleanup_expired(now_ms);
        let is_new = self.entries.insert(key.to_string(), now_ms).is_none();
        self.evict_over_capacity();
        is_new
    }

    /// 移除键，返回键是否存在
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// 是否已处理
    pub fn contains(&self, key: &str) -> bool {
        self.contains_at(key, Utc::now().timestamp_millis())
    }

    /// 是否已处理（带时间戳，用于测试）；过期记录视为不存在
    pub fn contains_at(&self, key: &str, now_ms: i64) -> bool {
        self.entries
            .get(key)
            .map(|inserted| !self.is_expired(*inserted, now_ms))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }

    fn is_expired(&self, inserted_ms: i64, now_ms: i64) -> bool {
        now_ms.saturating_sub(inserted_ms) >= self.window_ms()
    }

    /// 清理过期记录
    fn cleanup_expired(&mut self, now_ms: i64) {
        let window_ms = self.window_ms();
        let before = self.entries.len();
        self.entries
            .retain(|_, inserted| now_ms.saturating_sub(*inserted) < window_ms);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "Expired processed keys evicted");
        }
    }

    /// 超出容量时淘汰最早的记录
    fn evict_over_capacity(&mut self) {
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, inserted)| **inserted)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl Default for ProcessedKeySet {
    fn default() -> Self {
        Self::new()
    }
}
