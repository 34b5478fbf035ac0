//! 网格命令

use anyhow::{Context, Result};
use clap::Args;
use pendulum_tools::generate_grid;
use std::fs;
use std::path::PathBuf;

/// 打印或保存参数网格
#[derive(Args, Debug)]
pub struct GridCommand {
    /// 写入文件（可直接作为 `sweep --plan fixed --sets` 的输入）
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl GridCommand {
    pub fn execute(&self) -> Result<()> {
        let lines: Vec<String> = generate_grid().iter().map(|p| p.to_wire()).collect();

        match &self.output {
            Some(path) => {
                let mut text = lines.join("\n");
                text.push('\n');
                fs::write(path, text).with_context(|| format!("写入失败: {}", path.display()))?;
                println!("✅ {} 组参数已写入 {}", lines.len(), path.display());
            },
            None => {
                for line in &lines {
                    println!("{}", line);
                }
            },
        }
        Ok(())
    }
}
