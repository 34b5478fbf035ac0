//! 串口列表命令

use anyhow::Result;
use clap::Args;
use pendulum_serial::list_ports;

#[derive(Args, Debug)]
pub struct PortsCommand {}

impl PortsCommand {
    pub fn execute(&self) -> Result<()> {
        let ports = list_ports()?;
        if ports.is_empty() {
            println!("(没有可用串口)");
            return Ok(());
        }
        for port in ports {
            if port.description.is_empty() {
                println!("{}", port.name);
            } else {
                println!("{:<24} {}", port.name, port.description);
            }
        }
        Ok(())
    }
}
