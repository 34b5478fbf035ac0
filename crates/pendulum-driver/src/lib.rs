//! # Pendulum Driver
//!
//! 小车倒立摆控制会话：模式状态机、握手、遥测读取线程、结束时的导出与重连，
//! 以及按运行计划执行的自动 PID 试验。
//!
//! ## 模块
//!
//! - `session`: 会话状态机与各模式处理器
//! - `reader`: 遥测读取线程
//! - `wait`: 有界等待与可中断延时
//! - `input`: 操作员输入与快照输出接口
//! - `plan`: 运行计划（固定列表 / 网格 / 优化器）
//! - `sweep`: 自动试验执行器
//! - `error`: 会话错误类型
//!
//! ## 示例
//!
//! ```no_run
//! use pendulum_driver::{ScriptedInput, Session};
//! use pendulum_protocol::CommandToken;
//! use pendulum_serial::SerialTransport;
//! use pendulum_tools::SessionConfig;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::default();
//! let port = SerialTransport::new("/dev/ttyACM0", config.serial.baud_rate, Duration::from_millis(100));
//! let input = ScriptedInput::new().with_command(CommandToken::CENTRE);
//! let mut session = Session::new(port, config).with_input(input);
//! session.run()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod input;
pub mod plan;
pub mod reader;
pub mod session;
pub mod sweep;
pub mod wait;

pub use error::SessionError;
pub use input::{HandshakeRequest, NullSink, OperatorInput, ScriptedInput, SnapshotSink, Unattended};
pub use plan::{FixedPlan, OptimizerPlan, RunPlan, grid_plan};
pub use reader::{ReaderExit, TelemetryReader, reader_loop};
pub use session::{PidState, ReconnectMode, RunEnd, RunReport, Session, SpeedState, SubState};
pub use sweep::{SweepSummary, TrialOutcome, TrialRunner};
pub use wait::{await_line, pace};
