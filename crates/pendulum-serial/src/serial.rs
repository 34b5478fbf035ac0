//! 真实串口传输（基于 `serialport`）
//!
//! 端口以 8N1、无流控打开。读取以字节为单位进行，
//! 不完整的行保留在内部缓冲区中，直到收到换行符。

use crate::{Transport, TransportError, split_lines};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::{debug, info, trace};

impl From<serialport::Error> for TransportError {
    fn from(e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::Io(kind) => TransportError::Io(std::io::Error::new(kind, e.description)),
            _ => TransportError::Port(e.description),
        }
    }
}

/// 串口传输
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
    pending: Vec<u8>,
    lines: VecDeque<String>,
}

impl SerialTransport {
    /// 创建（尚未打开）
    pub fn new(port_name: impl Into<String>, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            timeout,
            port: None,
            pending: Vec::new(),
            lines: VecDeque::new(),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::NotOpen)
    }

    /// 读取一次（最多等待一个读超时），返回是否读到了数据
    fn fill(&mut self, wait: bool) -> Result<bool, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;
        let available = port.bytes_to_read()? as usize;
        if available == 0 && !wait {
            return Ok(false);
        }

        let mut buf = vec![0u8; available.max(256)];
        match port.read(&mut buf) {
            Ok(0) => Ok(false),
            Ok(n) => {
                self.pending.extend_from_slice(&buf[..n]);
                split_lines(&mut self.pending, &mut self.lines);
                Ok(true)
            },
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        if self.port.is_some() {
            return Ok(());
        }

        let port = serialport::new(&self.port_name, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.timeout)
            .open()?;

        self.pending.clear();
        self.lines.clear();
        self.port = Some(port);
        info!("Serial port '{}' opened at {} baud", self.port_name, self.baud_rate);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(port) = self.port.take() {
            drop(port);
            self.pending.clear();
            self.lines.clear();
            info!("Serial port '{}' closed", self.port_name);
        } else {
            trace!("Serial port '{}' already closed", self.port_name);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        let port = self.port_mut()?;
        port.write_all(line.as_bytes())?;
        port.write_all(b"\n")?;
        port.flush()?;
        debug!("-> {}", line);
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        if self.lines.is_empty() {
            self.fill(true)?;
        }
        let line = self.lines.pop_front();
        if let Some(line) = &line {
            trace!("<- {}", line);
        }
        Ok(line)
    }

    fn read_all(&mut self) -> Result<Vec<String>, TransportError> {
        while self.fill(false)? {}
        Ok(self.lines.drain(..).collect())
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.port_mut()?.clear(ClearBuffer::Input)?;
        self.pending.clear();
        self.lines.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.port_name
    }
}

/// 串口描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub description: String,
}

/// 列出可用串口
pub fn list_ports() -> Result<Vec<PortInfo>, TransportError> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()?
        .into_iter()
        .map(|p| {
            let description = match p.port_type {
                SerialPortType::UsbPort(info) => {
                    let product = info.product.unwrap_or_default();
                    format!("USB {:04x}:{:04x} {}", info.vid, info.pid, product)
                        .trim_end()
                        .to_string()
                },
                SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                SerialPortType::PciPort => "PCI".to_string(),
                SerialPortType::Unknown => String::new(),
            };
            PortInfo {
                name: p.port_name,
                description,
            }
        })
        .collect();
    ports.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(ports)
}
