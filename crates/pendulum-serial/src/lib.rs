//! # Pendulum Serial Transport
//!
//! 控制器串口传输层，提供统一的行式收发接口。
//!
//! - `SerialTransport`: 真实串口（`serial` feature）
//! - `MockTransport`: 可编排应答的内存传输（`mock` feature）

use thiserror::Error;

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(feature = "serial")]
pub use serial::{PortInfo, SerialTransport, list_ports};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockTransport;

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serial port error: {0}")]
    Port(String),
    #[error("Transport not open")]
    NotOpen,
    #[error("Device disconnected: {0}")]
    Disconnected(String),
}

impl TransportError {
    /// 端口不可用（需要重新打开）
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut)
    }
}

/// 行式传输接口
///
/// 所有行都不含换行符：`send_line` 负责追加 `\n`，
/// `read_line` / `read_all` 返回去掉 `\r\n` 的文本。
pub trait Transport: Send {
    /// 打开连接（已打开时为空操作）
    fn open(&mut self) -> Result<(), TransportError>;

    /// 关闭连接（幂等）
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// 发送一行
    fn send_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// 读取一行，读超时返回 `Ok(None)`
    fn read_line(&mut self) -> Result<Option<String>, TransportError>;

    /// 读取当前已缓冲的所有完整行（不等待）
    fn read_all(&mut self) -> Result<Vec<String>, TransportError>;

    /// 清空接收缓冲区
    fn clear_input(&mut self) -> Result<(), TransportError>;

    /// 用于日志的端点名称
    fn name(&self) -> &str {
        "transport"
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> Result<(), TransportError> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        (**self).send_line(line)
    }

    fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        (**self).read_line()
    }

    fn read_all(&mut self) -> Result<Vec<String>, TransportError> {
        (**self).read_all()
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        (**self).clear_input()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// 把字节流切分成完整行，未结束的部分留在 `pending` 中
#[cfg_attr(not(feature = "serial"), allow(dead_code))]
pub(crate) fn split_lines(pending: &mut Vec<u8>, out: &mut std::collections::VecDeque<String>) {
    while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
        let raw: Vec<u8> = pending.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&raw);
        out.push_back(text.trim_end_matches(['\r', '\n']).to_string());
    }
}
