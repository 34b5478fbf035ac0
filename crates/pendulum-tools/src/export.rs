//! # 运行导出
//!
//! 会话在运行结束时把数据日志快照交给 `RunSink`。
//! `CsvExporter` 写入 `<data_dir>/<subdir>/<mode>-<HH-MM-SS>.csv`。

use crate::recording::TrialRecording;
use anyhow::{Context, Result};
use pendulum_protocol::DataLog;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// 运行数据的导出目标
pub trait RunSink: Send {
    /// 导出一次运行，返回写入的文件路径
    fn export(&mut self, log: &DataLog, subdir: &str) -> Result<PathBuf>;
}

/// CSV 文件导出
#[derive(Debug, Clone)]
pub struct CsvExporter {
    data_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn file_path(dir: &Path, stem: &str) -> PathBuf {
        let time = chrono::Local::now().format("%H-%M-%S");
        let base = format!("{}-{}", stem, time);
        let mut path = dir.join(format!("{}.csv", base));
        // 同一秒内多次导出时追加序号
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("{}_{}.csv", base, n));
            n += 1;
        }
        path
    }
}

impl RunSink for CsvExporter {
    fn export(&mut self, log: &DataLog, subdir: &str) -> Result<PathBuf> {
        let dir = self.data_dir.join(subdir);
        fs::create_dir_all(&dir).with_context(|| format!("创建导出目录失败: {}", dir.display()))?;

        let stem = log.metadata.mode.map(|m| m.name()).unwrap_or("run");
        let path = Self::file_path(&dir, stem);
        TrialRecording::from_log(log).save(&path)?;

        info!("Exported {} samples to {}", log.len(), path.display());
        Ok(path)
    }
}
