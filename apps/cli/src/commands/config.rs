//! 配置管理命令
//!
//! 配置文件路径见 [`SessionConfig::default_path`]，可用全局 `--config` 覆盖。

use anyhow::Result;
use clap::Subcommand;
use pendulum_tools::SessionConfig;
use std::path::Path;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 写入默认配置（包含命令行中的 --port / --baud）
    Init {
        /// 覆盖已存在的文件
        #[arg(short, long)]
        force: bool,
    },

    /// 显示生效的配置
    Show,
}

impl ConfigCommand {
    pub fn execute(&self, path: &Path, overrides: impl Fn(&mut SessionConfig)) -> Result<()> {
        match self {
            ConfigCommand::Init { force } => Self::init_(path, *force, overrides),
            ConfigCommand::Show => Self::show_(path, overrides),
        }
    }

    fn init_(path: &Path, force: bool, overrides: impl Fn(&mut SessionConfig)) -> Result<()> {
        if path.exists() && !force {
            anyhow::bail!("配置文件已存在: {}（使用 --force 覆盖）", path.display());
        }
        let mut config = SessionConfig::default();
        overrides(&mut config);
        config.save_to_file(path)?;
        println!("✅ 已写入配置: {}", path.display());
        Ok(())
    }

    fn show_(path: &Path, overrides: impl Fn(&mut SessionConfig)) -> Result<()> {
        let mut config = SessionConfig::load_or_default(path)?;
        overrides(&mut config);
        if path.exists() {
            println!("# {}", path.display());
        } else {
            println!("# {} (不存在，使用默认值)", path.display());
        }
        print!("{}", config.to_toml()?);
        Ok(())
    }
}
