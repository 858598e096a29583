//! 监听服务句柄注册表
//!
//! 句柄在 Created 时发布、Destroyed 时清除。补偿扫描和插件通过注册表拿到当前句柄，
//! 拿不到即视为服务未运行。

use anyhow::Result;
use std::sync::{Arc, Mutex, RwLock};
use tracing::warn;

use super::host::NotificationHost;
use super::state::ConnectionState;
use crate::notification::RawEvent;

/// 运行中监听服务的句柄
pub struct ListenerHandle {
    host: Arc<dyn NotificationHost>,
    state: Mutex<ConnectionState>,
}

impl ListenerHandle {
    pub fn new(host: Arc<dyn NotificationHost>) -> Self {
        Self {
            host,
            state: Mutex::new(ConnectionState::Created),
        }
    }

    pub fn host(&self) -> &Arc<dyn NotificationHost> {
        &self.host
    }

    pub fn state(&self) -> ConnectionState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(ConnectionState::Destroyed)
    }

    pub(crate) fn set_state(&self, next: ConnectionState) {
        match self.state.lock() {
            Ok(mut state) => *state = next,
            Err(e) => warn!(error = %e, "Listener state lock poisoned"),
        }
    }

    /// 当前所有未清除的通知
    pub fn active_events(&self) -> Result<Vec<RawEvent>> {
        self.host.active_notifications()
    }
}

/// 句柄注册表
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    slot: Arc<RwLock<Option<Arc<ListenerHandle>>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发布句柄（替换已有的）
    pub fn publish(&self, handle: Arc<ListenerHandle>) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = Some(handle);
        }
    }

    /// 只在当前句柄就是 `handle` 时清除
    pub fn clear_if(&self, handle: &Arc<ListenerHandle>) {
        if let Ok(mut slot) = self.slot.write() {
            if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, handle)) {
                *slot = None;
            }
        }
    }

    /// 当前句柄
    pub fn current(&self) -> Option<Arc<ListenerHandle>> {
        self.slot.read().ok().and_then(|slot| slot.clone())
    }

    pub fn is_available(&self) -> bool {
        self.current().is_some()
    }

    /// 活跃通知；服务未运行或查询失败时为空
    pub fn active_events(&self) -> Vec<RawEvent> {
        let Some(handle) = self.current() else {
            return Vec::new();
        };

        match handle.active_events() {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Failed to query active notifications");
                Vec::new()
            }
        }
    }
}
