//! 配置加载
//!
//! 存储位置：`~/.config/bank-notification-bridge/config.json`，文件不存在时使用默认值。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认的监听组件名（与 enabled_notification_listeners 中的条目对应）
pub const DEFAULT_LISTENER_COMPONENT: &str =
    "com.gestore.spese/com.gestore.spese.BankNotificationListenerService";

/// 桥接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// 数据目录（队列文件所在位置）
    pub data_dir: Option<PathBuf>,
    /// 监听组件名
    pub listener_component: String,
    /// 检查权限前等待系统设置生效的时间（毫秒）
    pub settle_delay_ms: u64,
    /// 漏收检查的时间窗口（小时）
    pub recovery_window_hours: u64,
    /// 去重集合最大容量
    pub dedup_capacity: usize,
    /// 是否接受包名含银行关键词但不在注册表中的来源
    pub keyword_heuristic: bool,
    /// 额外注册的来源：包名 -> 标签
    pub extra_sources: BTreeMap<String, String>,
    /// live 广播通道容量
    pub live_channel_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            listener_component: DEFAULT_LISTENER_COMPONENT.to_string(),
            settle_delay_ms: 300,
            recovery_window_hours: 24,
            dedup_capacity: 4096,
            keyword_heuristic: true,
            extra_sources: BTreeMap::new(),
            live_channel_capacity: 64,
        }
    }
}

impl BridgeConfig {
    /// 默认配置目录
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("bank-notification-bridge")
    }

    /// 默认配置文件路径
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// 从默认位置加载
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// 从指定文件加载，文件不存在时返回默认配置
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: BridgeConfig = serde_json::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// 实际使用的数据目录
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(Self::config_dir)
    }

    /// 待处理队列文件路径
    pub fn queue_path(&self) -> PathBuf {
        self.data_dir().join("pending_notifications.json")
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn recovery_window(&self) -> Duration {
        Duration::from_secs(self.recovery_window_hours * 60 * 60)
    }
}
