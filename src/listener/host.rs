//! 宿主系统接口
//!
//! 监听服务只通过这个 trait 与宿主交互：查询活跃通知、请求重新绑定、读取权限设置、打开设置页。
//! `FileHost` 用目录里的文件模拟宿主，供 CLI 和集成测试使用。

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::notification::RawEvent;

/// 宿主系统
pub trait NotificationHost: Send + Sync {
    /// 当前所有未清除的通知（全系统范围）
    fn active_notifications(&self) -> Result<Vec<RawEvent>>;

    /// 请求宿主重新绑定监听服务
    fn request_rebind(&self) -> Result<()>;

    /// 已启用的监听组件列表（`:` 分隔），未设置时为 None
    fn enabled_listeners(&self) -> Result<Option<String>>;

    /// 打开监听权限设置页
    fn open_listener_settings(&self) -> Result<()>;
}

/// 基于目录的宿主
///
/// - `active.json`: 活跃通知（`RawEvent` 数组）
/// - `enabled_listeners`: 已启用的监听组件
/// - `rebind_requested`: 最近一次 rebind 请求时间
#[derive(Debug, Clone)]
pub struct FileHost {
    dir: PathBuf,
}

impl FileHost {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn active_path(&self) -> PathBuf {
        self.dir.join("active.json")
    }

    pub fn enabled_listeners_path(&self) -> PathBuf {
        self.dir.join("enabled_listeners")
    }

    pub fn rebind_marker_path(&self) -> PathBuf {
        self.dir.join("rebind_requested")
    }

    /// 写入活跃通知（测试和 replay 使用）
    pub fn set_active(&self, events: &[RawEvent]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.active_path(), serde_json::to_string_pretty(events)?)?;
        Ok(())
    }

    /// 写入已启用的监听组件
    pub fn set_enabled_listeners(&self, flat: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.enabled_listeners_path(), flat)?;
        Ok(())
    }
}

impl NotificationHost for FileHost {
    fn active_notifications(&self) -> Result<Vec<RawEvent>> {
        let path = self.active_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)?;
        let events = serde_json::from_str(&content)
            .with_context(|| format!("invalid active notifications file {}", path.display()))?;
        Ok(events)
    }

    fn request_rebind(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.rebind_marker_path(), Utc::now().to_rfc3339())?;
        Ok(())
    }

    fn enabled_listeners(&self) -> Result<Option<String>> {
        let path = self.enabled_listeners_path();
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?.trim().to_string()))
    }

    fn open_listener_settings(&self) -> Result<()> {
        info!(
            path = %self.enabled_listeners_path().display(),
            "Add the listener component to this file to grant access"
        );
        Ok(())
    }
}

/// 检查组件是否在已启用列表中
pub fn is_component_enabled(flat: &str, component: &str) -> bool {
    flat.split(':').map(str::trim).any(|entry| entry == component)
}
