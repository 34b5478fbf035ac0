//! # 适应度评分
//!
//! 对一次 PID 试验评分（越低越好）：
//!
//! ```text
//! 2.0 * IAE(angle) + 0.5 * IAE(position)
//!   + 3.0 * max|angle| + 0.2 * max|position|
//!   + 0.1 * Σ angular_velocity²
//! ```
//!
//! IAE 为逐采样绝对误差之和（目标为 0）。采样少于两条的试验得分为 `+inf`。

use crate::recording::TrialRecording;
use anyhow::{Context, Result};
use pendulum_protocol::{PARAMETER_NAMES, ParameterSet, Sample};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const W_IAE_ANGLE: f64 = 2.0;
pub const W_IAE_POSITION: f64 = 0.5;
pub const W_MAX_ANGLE: f64 = 3.0;
pub const W_MAX_POSITION: f64 = 0.2;
pub const W_CONTROL_EFFORT: f64 = 0.1;

/// 分析结果文件名
pub const ANALYSIS_FILE_NAME: &str = "pid_analysis_results.csv";

/// 单次试验的各项指标
#[derive(Debug, Clone, PartialEq)]
pub struct TrialScore {
    pub path: PathBuf,
    pub parameters: Option<ParameterSet>,
    pub iae_angle: f64,
    pub iae_position: f64,
    pub max_angle: f64,
    pub max_position: f64,
    pub control_effort: f64,
    pub fitness: f64,
}

/// 计算采样序列的指标
pub fn score(samples: &[Sample]) -> TrialScore {
    let mut result = TrialScore {
        path: PathBuf::new(),
        parameters: None,
        iae_angle: 0.0,
        iae_position: 0.0,
        max_angle: 0.0,
        max_position: 0.0,
        control_effort: 0.0,
        fitness: f64::INFINITY,
    };
    if samples.len() < 2 {
        return result;
    }

    for sample in samples {
        let angle = sample.angle.abs();
        let position = sample.position.unwrap_or(0.0).abs();
        result.iae_angle += angle;
        result.iae_position += position;
        result.max_angle = result.max_angle.max(angle);
        result.max_position = result.max_position.max(position);
        result.control_effort += sample.angular_velocity.unwrap_or(0.0).powi(2);
    }

    result.fitness = W_IAE_ANGLE * result.iae_angle
        + W_IAE_POSITION * result.iae_position
        + W_MAX_ANGLE * result.max_angle
        + W_MAX_POSITION * result.max_position
        + W_CONTROL_EFFORT * result.control_effort;
    result
}

/// 评分一个录制
pub fn score_recording(path: impl Into<PathBuf>, recording: &TrialRecording) -> TrialScore {
    let mut result = score(&recording.samples);
    result.path = path.into();
    result.parameters = recording.metadata.parameters;
    result
}

/// 目录分析报告（按适应度升序）
#[derive(Debug, Clone, Default)]
pub struct FitnessReport {
    pub scores: Vec<TrialScore>,
}

impl FitnessReport {
    /// 最佳的 `n` 个结果
    pub fn top(&self, n: usize) -> &[TrialScore] {
        &self.scores[..n.min(self.scores.len())]
    }

    /// 带参数集的最佳结果
    pub fn best_parameters(&self) -> Option<ParameterSet> {
        self.scores
            .iter()
            .filter(|s| s.fitness.is_finite())
            .find_map(|s| s.parameters)
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// 写入排序后的汇总 CSV
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("创建分析结果文件失败: {}", path.display()))?;

        let mut header = vec![
            "fitness_score",
            "iae_angle",
            "iae_position",
            "max_angle_deviation",
            "max_position_overshoot",
            "control_effort_proxy",
        ];
        header.extend(PARAMETER_NAMES);
        header.push("file_path");
        writer.write_record(&header).context("写入表头失败")?;

        for s in &self.scores {
            let mut row = vec![
                s.fitness.to_string(),
                s.iae_angle.to_string(),
                s.iae_position.to_string(),
                s.max_angle.to_string(),
                s.max_position.to_string(),
                s.control_effort.to_string(),
            ];
            match &s.parameters {
                Some(params) => row.extend(params.gains().iter().map(|g| g.to_string())),
                None => row.extend(std::iter::repeat_n(String::new(), PARAMETER_NAMES.len())),
            }
            row.push(s.path.display().to_string());
            writer.write_record(&row).context("写入分析结果失败")?;
        }
        writer.flush().context("刷新分析结果失败")?;
        Ok(())
    }
}

/// 递归扫描目录中的 CSV 并评分
///
/// 无法作为试验录制解析的文件（例如分析结果本身）被跳过。
pub fn analyze_directory<P: AsRef<Path>>(dir: P) -> Result<FitnessReport> {
    let mut files = Vec::new();
    collect_csv_files(dir.as_ref(), &mut files)?;
    files.sort();

    let mut scores: Vec<TrialScore> = Vec::new();
    for path in files {
        match TrialRecording::load(&path) {
            Ok(recording) => scores.push(score_recording(path, &recording)),
            Err(e) => debug!("Skipping {}: {:#}", path.display(), e),
        }
    }
    scores.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));
    Ok(FitnessReport { scores })
}

fn collect_csv_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("读取目录失败: {}", dir.display()))?;
    for entry in entries {
        let path = entry.context("读取目录项失败")?.path();
        if path.is_dir() {
            collect_csv_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pendulum_protocol::{DataLog, Mode};

    fn write_trial(dir: &Path, name: &str, params: ParameterSet, angles: &[f64]) {
        let mut log = DataLog::new();
        log.metadata.mode = Some(Mode::RunningPid);
        log.metadata.parameters = Some(params);
        for (i, angle) in angles.iter().enumerate() {
            log.push(Sample::full(i as f64 * 0.05, *angle, 0.0, 0.0, 0.0));
        }
        TrialRecording::from_log(&log).save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_score_weights() {
        let samples = [
            Sample::full(0.0, 0.0, 0.0, 0.0, 0.0),
            Sample::full(0.2, -0.5, 10.0, 2.0, 461.4),
        ];
        let s = score(&samples);
        assert_eq!(s.iae_angle, 0.5);
        assert_eq!(s.iae_position, 10.0);
        assert_eq!(s.max_angle, 0.5);
        assert_eq!(s.max_position, 10.0);
        assert_eq!(s.control_effort, 4.0);
        let expected = 2.0 * 0.5 + 0.5 * 10.0 + 3.0 * 0.5 + 0.2 * 10.0 + 0.1 * 4.0;
        assert!((s.fitness - expected).abs() < 1e-12);
    }

    #[test]
    fn test_short_trial_scores_infinity() {
        assert_eq!(score(&[]).fitness, f64::INFINITY);
        assert_eq!(score(&[Sample::new(0.0, 0.0)]).fitness, f64::INFINITY);
    }

    #[test]
    fn test_angle_only_samples() {
        let samples = [Sample::new(0.0, 0.1), Sample::new(0.1, -0.3)];
        let s = score(&samples);
        assert_eq!(s.iae_position, 0.0);
        assert!((s.fitness - (2.0 * 0.4 + 3.0 * 0.3)).abs() < 1e-12);
    }

    #[test]
    fn test_analyze_directory_ranks_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("pid_set_2");
        fs::create_dir_all(&nested).unwrap();

        let good = ParameterSet::new(450.0, 315.0, 4.0, -0.03, 0.0, -0.005);
        let bad = ParameterSet::new(700.0, 490.0, 2.75, -0.04, 0.0, -0.008);
        write_trial(dir.path(), "pid-10-00-00.csv", bad, &[0.0, 0.5, 0.9]);
        write_trial(&nested, "pid-10-05-00.csv", good, &[0.0, 0.01, 0.02]);
        fs::write(dir.path().join("notes.csv"), "hello,world\n").unwrap();
        fs::write(dir.path().join("readme.txt"), "ignored").unwrap();

        let report = analyze_directory(dir.path()).unwrap();
        assert_eq!(report.scores.len(), 2);
        assert_eq!(report.scores[0].parameters, Some(good));
        assert_eq!(report.best_parameters(), Some(good));
        assert_eq!(report.top(1).len(), 1);
        assert_eq!(report.top(10).len(), 2);

        let out = dir.path().join(ANALYSIS_FILE_NAME);
        report.write_csv(&out).unwrap();
        let text = fs::read_to_string(&out).unwrap();
        assert!(text.starts_with("fitness_score,iae_angle"));
        assert_eq!(text.lines().count(), 3);

        // 分析结果文件本身不会被当作试验
        let again = analyze_directory(dir.path()).unwrap();
        assert_eq!(again.scores.len(), 2);
    }
}
