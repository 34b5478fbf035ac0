//! # 参数优化器
//!
//! 会话把优化器视为纯函数：给定导出目录，返回下一组要尝试的参数。
//! 返回值不做范围校验，原样发送给设备。

use crate::fitness::analyze_directory;
use anyhow::Result;
use pendulum_protocol::ParameterSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use tracing::debug;

/// 优化器接口
pub trait Optimizer: Send {
    /// 提出下一组参数，`None` 表示停止
    fn propose(&mut self, export_dir: &Path) -> Result<Option<ParameterSet>>;
}

/// 在当前最佳参数附近随机扰动
///
/// 目录中还没有可评分的试验时返回种子参数。
#[derive(Debug)]
pub struct PerturbBest {
    seed: ParameterSet,
    /// 相对步长（例如 0.1 表示 ±10%）
    step: f64,
    rng: StdRng,
}

impl PerturbBest {
    pub fn new(seed: ParameterSet, step: f64) -> Self {
        Self {
            seed,
            step,
            rng: StdRng::from_entropy(),
        }
    }

    /// 固定随机种子（可复现）
    pub fn with_rng_seed(seed: ParameterSet, step: f64, rng_seed: u64) -> Self {
        Self {
            seed,
            step,
            rng: StdRng::seed_from_u64(rng_seed),
        }
    }

    fn perturb(&mut self, base: ParameterSet) -> ParameterSet {
        let mut gains = *base.gains();
        for gain in gains.iter_mut() {
            if *gain != 0.0 && self.step > 0.0 {
                *gain *= 1.0 + self.rng.gen_range(-self.step..=self.step);
            }
        }
        ParameterSet(gains)
    }
}

impl Optimizer for PerturbBest {
    fn propose(&mut self, export_dir: &Path) -> Result<Option<ParameterSet>> {
        let best = if export_dir.exists() {
            analyze_directory(export_dir)?.best_parameters()
        } else {
            None
        };

        match best {
            Some(best) => {
                let next = self.perturb(best);
                debug!("Best so far {}, proposing {}", best, next);
                Ok(Some(next))
            },
            None => Ok(Some(self.seed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::TrialRecording;
    use pendulum_protocol::{DataLog, Sample};

    #[test]
    fn test_seed_when_nothing_scored() {
        let dir = tempfile::tempdir().unwrap();
        let mut optimizer = PerturbBest::with_rng_seed(ParameterSet::default(), 0.1, 7);
        assert_eq!(optimizer.propose(dir.path()).unwrap(), Some(ParameterSet::default()));
        assert_eq!(
            optimizer.propose(&dir.path().join("missing")).unwrap(),
            Some(ParameterSet::default())
        );
    }

    #[test]
    fn test_perturbs_best_within_step() {
        let dir = tempfile::tempdir().unwrap();
        let best = ParameterSet::new(450.0, 315.0, 4.0, -0.03, 0.0, -0.005);
        let mut log = DataLog::new();
        log.metadata.parameters = Some(best);
        log.push(Sample::full(0.0, 0.01, 0.0, 0.0, 0.0));
        log.push(Sample::full(0.1, 0.02, 0.0, 0.0, 0.0));
        TrialRecording::from_log(&log).save(dir.path().join("pid-1.csv")).unwrap();

        let mut optimizer = PerturbBest::with_rng_seed(ParameterSet::default(), 0.1, 42);
        let next = optimizer.propose(dir.path()).unwrap().unwrap();

        for (new, old) in next.gains().iter().zip(best.gains()) {
            if *old == 0.0 {
                assert_eq!(*new, 0.0);
            } else {
                let ratio = new / old;
                assert!((0.9..=1.1).contains(&ratio), "ratio {ratio}");
            }
        }
    }
}
