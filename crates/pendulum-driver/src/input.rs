//! 操作员交互接口
//!
//! 会话通过 [`OperatorInput`] 获取命令令牌、握手数值和振幅更新，
//! 通过 [`SnapshotSink`] 把数据日志快照交给显示层。
//! CLI 用终端实现它们，自动试验和测试使用这里的实现。

use pendulum_protocol::{CommandToken, DataLog, Mode};
use std::collections::VecDeque;

/// 流式模式握手需要操作员提供的数值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeRequest {
    /// 设定速度握手 1：速度与加速度
    SpeedAndAcceleration,
    /// 设定速度握手 2：初始振幅
    InitialAmplitude,
    /// 共振模式：驱动频率
    DriveFrequency,
    /// 扫频模式：扫描范围
    ScanSpecification,
}

impl HandshakeRequest {
    /// 提示文本
    pub fn prompt(self) -> &'static str {
        match self {
            HandshakeRequest::SpeedAndAcceleration => "Set the speed and acceleration",
            HandshakeRequest::InitialAmplitude => "Set the initial amplitude",
            HandshakeRequest::DriveFrequency => "Set the drive frequency (omega)",
            HandshakeRequest::ScanSpecification => "Set the frequency scan (start,end,step)",
        }
    }
}

/// 操作员输入
pub trait OperatorInput: Send {
    /// 等待命令状态下要发送的命令令牌，`None` 表示本轮不发送
    fn command(&mut self) -> Option<CommandToken>;

    /// 握手数值，`None` 表示操作员取消
    fn handshake_value(&mut self, request: HandshakeRequest) -> Option<String>;

    /// 流式运行中新输入的振幅（不阻塞）
    fn poll_amplitude(&mut self) -> Option<f64> {
        None
    }

    /// 运行结束后是否重新连接
    fn confirm_reconnect(&mut self) -> bool {
        true
    }
}

/// 预先编排的输入
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    commands: VecDeque<CommandToken>,
    values: VecDeque<String>,
    amplitudes: VecDeque<f64>,
    reconnect: bool,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self {
            reconnect: true,
            ..Default::default()
        }
    }

    pub fn with_command(mut self, token: CommandToken) -> Self {
        self.commands.push_back(token);
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.values.push_back(value.into());
        self
    }

    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitudes.push_back(amplitude);
        self
    }

    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }
}

impl OperatorInput for ScriptedInput {
    fn command(&mut self) -> Option<CommandToken> {
        self.commands.pop_front()
    }

    fn handshake_value(&mut self, _request: HandshakeRequest) -> Option<String> {
        self.values.pop_front()
    }

    fn poll_amplitude(&mut self) -> Option<f64> {
        self.amplitudes.pop_front()
    }

    fn confirm_reconnect(&mut self) -> bool {
        self.reconnect
    }
}

/// 无人值守：不发送命令，取消所有握手，总是重连
#[derive(Debug, Clone, Copy, Default)]
pub struct Unattended;

impl OperatorInput for Unattended {
    fn command(&mut self) -> Option<CommandToken> {
        None
    }

    fn handshake_value(&mut self, _request: HandshakeRequest) -> Option<String> {
        None
    }
}

/// 数据日志快照的消费者（绘图、打印）
pub trait SnapshotSink: Send {
    fn snapshot(&mut self, mode: Mode, log: &DataLog);
}

/// 丢弃快照
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl SnapshotSink for NullSink {
    fn snapshot(&mut self, _mode: Mode, _log: &DataLog) {}
}
