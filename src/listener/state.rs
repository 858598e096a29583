//! 监听服务连接状态机
//!
//! ```text
//! Created ──▶ Connected ◀──▶ Disconnected
//!    │            │               │
//!    └────────────┴───────────────┴──▶ Destroyed（终态）
//! ```

use serde::Serialize;

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Created,
    Connected,
    Disconnected,
    Destroyed,
}

/// 生命周期事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Connect,
    Disconnect,
    Destroy,
}

/// 状态迁移结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: ConnectionState,
    /// 是否需要向宿主请求重新绑定
    pub rebind: bool,
}

impl ConnectionState {
    /// 句柄是否可用
    pub fn is_alive(&self) -> bool {
        !matches!(self, ConnectionState::Destroyed)
    }

    /// 计算迁移；Destroyed 之后的任何事件返回 None
    pub fn on(self, event: LifecycleEvent) -> Option<Transition> {
        use ConnectionState::*;

        let transition = match (self, event) {
            (Destroyed, _) => return None,
            (Created, LifecycleEvent::Connect) | (Disconnected, LifecycleEvent::Connect) => {
                Transition { next: Connected, rebind: true }
            }
            (Connected, LifecycleEvent::Connect) => Transition { next: Connected, rebind: false },
            (_, LifecycleEvent::Disconnect) => Transition { next: Disconnected, rebind: true },
            (_, LifecycleEvent::Destroy) => Transition { next: Destroyed, rebind: false },
        };

        Some(transition)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Created => "created",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}
