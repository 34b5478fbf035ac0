//! 会话层错误类型定义

use pendulum_protocol::{Mode, ProtocolError};
use pendulum_serial::TransportError;
use std::time::Duration;
use thiserror::Error;

/// 会话层错误类型
#[derive(Error, Debug)]
pub enum SessionError {
    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 协议解析错误（操作员输入的数值等）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 居中超时（致命：没有居中结果就没有控制参考点）
    #[error("Centering timed out after {0:?}")]
    CenteringTimeout(Duration),

    /// 流式模式握手超时（可恢复）
    #[error("Handshake timeout in {mode} mode while waiting for {waiting_for}")]
    HandshakeTimeout { mode: Mode, waiting_for: &'static str },

    /// 操作员中断
    #[error("Interrupted by operator")]
    Interrupted,

    /// 连续重连失败
    #[error("Reconnect failed after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// 导出失败
    #[error("Export failed: {0}")]
    Export(String),

    /// 运行计划错误
    #[error("Run plan error: {0}")]
    Plan(String),

    /// 遥测读取线程错误
    #[error("Telemetry reader error: {0}")]
    ReaderThread(String),
}

impl SessionError {
    /// 是否需要终止会话
    ///
    /// 致命错误在尽力导出后向上传播；其它错误由会话就地处理。
    pub fn is_fatal(&self) -> bool {
        match self {
            SessionError::Transport(e) => e.is_fatal(),
            SessionError::CenteringTimeout(_)
            | SessionError::ReconnectExhausted { .. }
            | SessionError::ReaderThread(_)
            | SessionError::Plan(_) => true,
            SessionError::Protocol(_)
            | SessionError::HandshakeTimeout { .. }
            | SessionError::Interrupted
            | SessionError::Export(_) => false,
        }
    }
}

impl From<anyhow::Error> for SessionError {
    fn from(e: anyhow::Error) -> Self {
        SessionError::Export(format!("{:#}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        let e = SessionError::CenteringTimeout(Duration::from_secs(20));
        assert_eq!(e.to_string(), "Centering timed out after 20s");

        let e = SessionError::HandshakeTimeout {
            mode: Mode::RunningPid,
            waiting_for: "acknowledgement",
        };
        assert_eq!(
            e.to_string(),
            "Handshake timeout in pid mode while waiting for acknowledgement"
        );

        let e = SessionError::ReconnectExhausted { attempts: 3 };
        assert!(e.to_string().contains("3 attempts"));

        let e = SessionError::from(TransportError::NotOpen);
        assert_eq!(e.to_string(), "Transport error: Transport not open");

        let e = SessionError::from(ProtocolError::UnknownMode("x".to_string()));
        assert!(e.to_string().starts_with("Protocol error:"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(SessionError::CenteringTimeout(Duration::ZERO).is_fatal());
        assert!(SessionError::ReconnectExhausted { attempts: 1 }.is_fatal());
        assert!(SessionError::Transport(TransportError::NotOpen).is_fatal());
        assert!(!SessionError::Interrupted.is_fatal());
        assert!(
            !SessionError::HandshakeTimeout {
                mode: Mode::SettingSpeed,
                waiting_for: "x"
            }
            .is_fatal()
        );
        let timeout = std::io::Error::new(std::io::ErrorKind::TimedOut, "t");
        assert!(!SessionError::Transport(TransportError::Io(timeout)).is_fatal());
    }

    #[test]
    fn test_anyhow_maps_to_export() {
        let e: SessionError = anyhow::anyhow!("disk full").context("write csv").into();
        assert_eq!(e.to_string(), "Export failed: write csv: disk full");
    }
}
