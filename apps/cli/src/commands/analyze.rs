//! 分析命令
//!
//! 对目录下所有试验评分，写出排序后的汇总并打印最佳结果。

use anyhow::Result;
use clap::Args;
use pendulum_tools::fitness::ANALYSIS_FILE_NAME;
use pendulum_tools::{SessionConfig, analyze_directory};
use std::path::PathBuf;

/// 分析参数
#[derive(Args, Debug)]
pub struct AnalyzeCommand {
    /// 试验目录（默认配置中的数据目录）
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// 汇总文件（默认 `<dir>/pid_analysis_results.csv`）
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 打印前 N 个结果
    #[arg(short, long, default_value_t = 10)]
    pub top: usize,
}

impl AnalyzeCommand {
    pub fn execute(&self, config: &SessionConfig) -> Result<()> {
        let dir = self.dir.clone().unwrap_or_else(|| config.export.data_dir.clone());
        let report = analyze_directory(&dir)?;
        if report.is_empty() {
            println!("(没有找到试验数据: {})", dir.display());
            return Ok(());
        }

        let output = self.output.clone().unwrap_or_else(|| dir.join(ANALYSIS_FILE_NAME));
        report.write_csv(&output)?;

        println!("{} trials scored, summary written to {}", report.scores.len(), output.display());
        println!();
        println!("{:>4}  {:>12}  {:<36}  file", "rank", "fitness", "parameters");
        for (rank, score) in report.top(self.top).iter().enumerate() {
            let parameters = score.parameters.map(|p| p.to_wire()).unwrap_or_else(|| "-".to_string());
            println!(
                "{:>4}  {:>12.4}  {:<36}  {}",
                rank + 1,
                score.fitness,
                parameters,
                score.path.display()
            );
        }
        Ok(())
    }
}
