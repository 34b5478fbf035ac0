//! # Pendulum CLI
//!
//! Command-line interface for the cart-pendulum rig.
//!
//! ```bash
//! # 写入默认配置并设置串口
//! pendulum-cli config init
//! pendulum-cli --port /dev/ttyACM0 console
//!
//! # 自动试验
//! pendulum-cli sweep --plan fixed --sets sets.txt
//! pendulum-cli analyze --top 5
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod terminal;

use commands::{AnalyzeCommand, ConfigCommand, ConsoleCommand, GridCommand, PortsCommand, SweepCommand};
use pendulum_tools::SessionConfig;

/// Pendulum CLI - 倒立摆串口会话工具
#[derive(Parser, Debug)]
#[command(name = "pendulum-cli")]
#[command(about = "Command-line interface for the cart-pendulum rig", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 ~/.config/pendulum/config.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 串口名称（覆盖配置）
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// 波特率（覆盖配置）
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 交互式手动会话
    Console {
        #[command(flatten)]
        args: ConsoleCommand,
    },

    /// 自动 PID 试验
    Sweep {
        #[command(flatten)]
        args: SweepCommand,
    },

    /// 打印 PID 参数网格
    Grid {
        #[command(flatten)]
        args: GridCommand,
    },

    /// 评分已导出的试验
    Analyze {
        #[command(flatten)]
        args: AnalyzeCommand,
    },

    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 列出可用串口
    Ports(PortsCommand),
}

impl Cli {
    fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => SessionConfig::default_path(),
        }
    }

    fn apply_overrides(&self, config: &mut SessionConfig) {
        if let Some(port) = &self.port {
            config.serial.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
    }

    /// 加载配置并应用命令行覆盖
    fn load_config(&self) -> Result<SessionConfig> {
        let mut config = SessionConfig::load_or_default(self.config_path()?)?;
        self.apply_overrides(&mut config);
        Ok(config)
    }
}

fn main() -> Result<()> {
    // 初始化日志
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pendulum_cli=info,pendulum_driver=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Console { args } => args.execute(cli.load_config()?),
        Commands::Sweep { args } => args.execute(cli.load_config()?),
        Commands::Grid { args } => args.execute(),
        Commands::Analyze { args } => args.execute(&cli.load_config()?),
        Commands::Config(cmd) => cmd.execute(&cli.config_path()?, |config| cli.apply_overrides(config)),
        Commands::Ports(cmd) => cmd.execute(),
    }
}
