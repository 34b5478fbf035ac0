//! # Pendulum Tools - 导出、配置与离线分析
//!
//! **依赖原则**: 只依赖 `pendulum-protocol`，不依赖会话驱动层
//!
//! ## 包含模块
//!
//! - `recording` - 试验 CSV 格式（读写）
//! - `export` - 运行结束时的导出接口 `RunSink` 与 `CsvExporter`
//! - `config` - 会话配置（TOML）
//! - `fitness` - 适应度评分与目录分析
//! - `grid` - PID 参数网格
//! - `optimizer` - 参数优化器接口

pub mod config;
pub mod export;
pub mod fitness;
pub mod grid;
pub mod optimizer;
pub mod recording;

// 重新导出常用类型
pub use config::{AckPolicy, SessionConfig};
pub use export::{CsvExporter, RunSink};
pub use fitness::{FitnessReport, TrialScore, analyze_directory, score};
pub use grid::generate_grid;
pub use optimizer::{Optimizer, PerturbBest};
pub use recording::TrialRecording;
