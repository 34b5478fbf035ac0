//! 手动会话命令
//!
//! 操作员逐个输入命令令牌，运行结束后导出数据并询问是否重连。

use crate::commands::serial_transport;
use crate::terminal::{ConsoleInput, PrintSink};
use anyhow::{Context, Result};
use clap::Args;
use pendulum_driver::{ReconnectMode, Session};
use pendulum_tools::SessionConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// 手动会话参数
#[derive(Args, Debug)]
pub struct ConsoleCommand {
    /// 振幅文件：运行中写入新数值即发送振幅更新
    #[arg(long)]
    pub amplitude_file: Option<PathBuf>,

    /// 采样打印间隔（毫秒）
    #[arg(long, default_value_t = 500)]
    pub print_interval_ms: u64,
}

impl ConsoleCommand {
    pub fn execute(&self, config: SessionConfig) -> Result<()> {
        let transport = serial_transport(&config)?;
        let data_dir = config.export.data_dir.clone();

        let interrupt = Arc::new(AtomicBool::new(false));
        let flag = interrupt.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nInterrupted, closing the current run...");
            flag.store(true, Ordering::Release);
        })
        .context("设置 Ctrl+C 处理失败")?;

        println!("⏳ 连接到 {}...", transport.port_name());
        let input = ConsoleInput::new(interrupt.clone()).with_amplitude_file(self.amplitude_file.clone());
        let mut session = Session::new(transport, config)
            .with_input(input)
            .with_snapshot_sink(PrintSink::new(Duration::from_millis(self.print_interval_ms)))
            .with_interrupt(interrupt)
            .with_reconnect(ReconnectMode::Manual);

        let result = session.run();

        if let Some(report) = session.last_run() {
            println!(
                "Last run: {} mode, {} samples, ended by {:?}",
                report.mode, report.samples, report.end
            );
            if let Some(path) = &report.export {
                println!("  导出: {}", path.display());
            }
        }
        println!("数据目录: {}", data_dir.display());

        result.context("会话异常结束")
    }
}
