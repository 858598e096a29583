//! 监听服务 - 生命周期、宿主接口、句柄注册表

pub mod host;
pub mod registry;
pub mod service;
pub mod state;

pub use host::{is_component_enabled, FileHost, NotificationHost};
pub use registry::{ListenerHandle, ListenerRegistry};
pub use service::{HostSignal, ListenerService};
pub use state::{ConnectionState, LifecycleEvent, Transition};
