//! # Pendulum Protocol
//!
//! 小车倒立摆控制器的串口行协议定义（无 I/O 依赖）
//!
//! ## 模块
//!
//! - `phrases`: 设备输出的固定短语常量
//! - `mode`: 会话模式定义
//! - `message`: 设备消息分类（模式开始 / 复位 / 无命令）
//! - `params`: PID 参数集 `ParameterSet`
//! - `sample`: 遥测采样解析
//! - `command`: 命令选择令牌与居中结果
//! - `datalog`: 单次运行的数据日志与运行元数据
//!
//! ## 线路格式
//!
//! 协议为换行结尾的 ASCII 文本行。本 crate 只处理单行文本（不含换行符），
//! 换行的添加与去除由传输层负责。

pub mod command;
pub mod datalog;
pub mod message;
pub mod mode;
pub mod params;
pub mod phrases;
pub mod sample;

// 重新导出常用类型
pub use command::*;
pub use datalog::*;
pub use message::*;
pub use mode::*;
pub use params::*;
pub use phrases::*;
pub use sample::*;

use thiserror::Error;

/// 协议解析错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Invalid field count: expected {expected}, got {actual}")]
    InvalidFieldCount { expected: usize, actual: usize },

    #[error("Invalid number in field {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Invalid command token: {0:?}")]
    InvalidCommandToken(String),

    #[error("Unknown mode name: {0:?}")]
    UnknownMode(String),
}
