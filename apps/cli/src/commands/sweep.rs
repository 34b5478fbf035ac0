//! 自动试验命令

use crate::commands::serial_transport;
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use pendulum_driver::{FixedPlan, OptimizerPlan, RunPlan, Session, TrialRunner, grid_plan};
use pendulum_tools::{PerturbBest, SessionConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 参数集来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlanKind {
    /// 从文件读取固定列表
    Fixed,
    /// 生成的 320 组网格
    Grid,
    /// 在已导出的最佳结果附近扰动
    Optimize,
}

/// 自动试验参数
#[derive(Args, Debug)]
pub struct SweepCommand {
    /// 参数集来源
    #[arg(long, value_enum, default_value_t = PlanKind::Grid)]
    pub plan: PlanKind,

    /// 参数集文件（每行一组，`fixed` 计划必需）
    #[arg(long, required_if_eq("plan", "fixed"))]
    pub sets: Option<PathBuf>,

    /// 优化器试验次数
    #[arg(long, default_value_t = 20)]
    pub trials: usize,

    /// 优化器相对步长
    #[arg(long, default_value_t = 0.1)]
    pub step: f64,
}

impl SweepCommand {
    pub fn build_plan(&self, config: &SessionConfig) -> Result<Box<dyn RunPlan>> {
        Ok(match self.plan {
            PlanKind::Fixed => {
                let path = self.sets.as_ref().context("fixed 计划需要 --sets")?;
                let plan = FixedPlan::from_file(path)?;
                anyhow::ensure!(!plan.is_empty(), "参数集文件为空: {}", path.display());
                Box::new(plan)
            },
            PlanKind::Grid => Box::new(grid_plan()),
            PlanKind::Optimize => Box::new(OptimizerPlan::new(
                PerturbBest::new(config.default_parameters, self.step),
                self.trials,
            )),
        })
    }

    pub fn execute(&self, config: SessionConfig) -> Result<()> {
        let plan = self.build_plan(&config)?;
        if let Some(n) = plan.remaining() {
            println!("📋 计划: {} 组参数", n);
        }

        let transport = serial_transport(&config)?;
        let interrupt = Arc::new(AtomicBool::new(false));
        let flag = interrupt.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nInterrupted, finishing the current trial...");
            flag.store(true, Ordering::Release);
        })
        .context("设置 Ctrl+C 处理失败")?;

        let session = Session::new(transport, config).with_interrupt(interrupt);
        let mut runner = TrialRunner::new(session, plan);
        let summary = runner.run().context("自动试验失败")?;

        println!("✅ {}", summary);
        println!("数据目录: {}", runner.session().config().export.data_dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn command(plan: PlanKind, sets: Option<PathBuf>) -> SweepCommand {
        SweepCommand {
            plan,
            sets,
            trials: 3,
            step: 0.1,
        }
    }

    #[test]
    fn test_build_plans() {
        let config = SessionConfig::default();
        assert_eq!(command(PlanKind::Grid, None).build_plan(&config).unwrap().remaining(), Some(320));
        assert_eq!(command(PlanKind::Optimize, None).build_plan(&config).unwrap().remaining(), Some(3));
        assert!(command(PlanKind::Fixed, None).build_plan(&config).is_err());
    }

    #[test]
    fn test_fixed_plan_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sets.txt");
        fs::write(&path, "450,315,3,-0.03,0,-0.005\n600,420,4,-0.05,0,-0.01\n").unwrap();
        let plan = command(PlanKind::Fixed, Some(path.clone())).build_plan(&SessionConfig::default()).unwrap();
        assert_eq!(plan.remaining(), Some(2));

        fs::write(&path, "# nothing here\n").unwrap();
        assert!(command(PlanKind::Fixed, Some(path)).build_plan(&SessionConfig::default()).is_err());
    }
}
