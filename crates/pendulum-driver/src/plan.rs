//! 运行计划
//!
//! 自动试验按计划逐个取参数集：固定列表、生成的网格，或由优化器根据已导出的数据给出。

use anyhow::{Context, Result};
use pendulum_protocol::ParameterSet;
use pendulum_tools::{Optimizer, generate_grid};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

/// 参数集来源
pub trait RunPlan: Send {
    /// 下一组参数，`None` 表示计划结束
    ///
    /// `data_dir` 是导出根目录，优化器从这里读取已完成的试验。
    fn next_parameters(&mut self, data_dir: &Path) -> Result<Option<ParameterSet>>;

    /// 剩余试验数（未知时为 `None`）
    fn remaining(&self) -> Option<usize> {
        None
    }
}

impl<P: RunPlan + ?Sized> RunPlan for Box<P> {
    fn next_parameters(&mut self, data_dir: &Path) -> Result<Option<ParameterSet>> {
        (**self).next_parameters(data_dir)
    }

    fn remaining(&self) -> Option<usize> {
        (**self).remaining()
    }
}

/// 固定列表
#[derive(Debug, Clone, Default)]
pub struct FixedPlan {
    sets: VecDeque<ParameterSet>,
}

impl FixedPlan {
    pub fn new(sets: impl IntoIterator<Item = ParameterSet>) -> Self {
        Self {
            sets: sets.into_iter().collect(),
        }
    }

    /// 每行一组参数
    ///
    /// 容忍从脚本中粘贴的列表：引号、方括号、行尾逗号、`#` 注释和赋值行都会被忽略。
    pub fn parse(text: &str) -> Result<Self> {
        let mut sets = VecDeque::new();
        for (i, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or_default();
            let line = line
                .trim()
                .trim_end_matches(',')
                .trim_matches(|c| matches!(c, '"' | '\'' | '[' | ']' | ' '));
            if line.is_empty() || !line.contains(',') || line.contains('=') {
                continue;
            }
            let set = line
                .parse::<ParameterSet>()
                .with_context(|| format!("第 {} 行不是有效的参数集: {:?}", i + 1, raw))?;
            sets.push_back(set);
        }
        Ok(Self { sets })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("读取参数集文件失败: {}", path.display()))?;
        Self::parse(&text)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl RunPlan for FixedPlan {
    fn next_parameters(&mut self, _data_dir: &Path) -> Result<Option<ParameterSet>> {
        Ok(self.sets.pop_front())
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.sets.len())
    }
}

/// 网格计划（320 组）
pub fn grid_plan() -> FixedPlan {
    FixedPlan::new(generate_grid())
}

/// 优化器驱动，最多 `trials` 次
pub struct OptimizerPlan {
    optimizer: Box<dyn Optimizer>,
    remaining: usize,
}

impl OptimizerPlan {
    pub fn new(optimizer: impl Optimizer + 'static, trials: usize) -> Self {
        Self {
            optimizer: Box::new(optimizer),
            remaining: trials,
        }
    }
}

impl RunPlan for OptimizerPlan {
    fn next_parameters(&mut self, data_dir: &Path) -> Result<Option<ParameterSet>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        self.optimizer.propose(data_dir)
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.remaining)
    }
}
