//! 命令定义和实现

pub mod analyze;
pub mod config;
pub mod console;
pub mod grid;
pub mod ports;
pub mod sweep;

pub use analyze::AnalyzeCommand;
pub use config::ConfigCommand;
pub use console::ConsoleCommand;
pub use grid::GridCommand;
pub use ports::PortsCommand;
pub use sweep::SweepCommand;

use anyhow::Result;
use pendulum_serial::SerialTransport;
use pendulum_tools::SessionConfig;

/// 按配置创建串口传输（尚未打开）
pub fn serial_transport(config: &SessionConfig) -> Result<SerialTransport> {
    let port = config
        .serial
        .port
        .clone()
        .ok_or_else(|| anyhow::anyhow!("未配置串口：使用 --port 或在配置文件中设置 serial.port"))?;
    Ok(SerialTransport::new(
        port,
        config.serial.baud_rate,
        config.serial.read_timeout(),
    ))
}
