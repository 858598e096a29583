//! 对外暴露的错误类型
//!
//! 内部统一使用 `anyhow::Result`，只有需要调用方区分处理的情况才落到 `BridgeError`。

use thiserror::Error;

/// 桥接层错误
#[derive(Debug, Error)]
pub enum BridgeError {
    /// 通知监听权限未开启
    #[error("Notification listener not enabled")]
    PermissionDenied,
    /// 监听服务未运行（句柄不存在）
    #[error("NotificationListenerService not running")]
    ServiceUnavailable,
    /// 所有文本字段都为空
    #[error("no text found in any known field")]
    ExtractionFailed,
    /// 队列记录或 live 消息无法解析
    #[error("failed to parse notification data: {0}")]
    ParseFailure(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            BridgeError::PermissionDenied.to_string(),
            "Notification listener not enabled"
        );
        assert_eq!(
            BridgeError::ServiceUnavailable.to_string(),
            "NotificationListenerService not running"
        );
        assert!(BridgeError::ParseFailure("eof".into())
            .to_string()
            .contains("eof"));
    }

    #[test]
    fn test_anyhow_converts() {
        let err: BridgeError = anyhow::anyhow!("disk full").into();
        assert_eq!(err.to_string(), "disk full");
    }
}
