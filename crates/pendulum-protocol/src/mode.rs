//! 会话模式
//!
//! 同一时刻只有一个模式处于活动状态。设备通过固定的“开始”短语
//! 通知主机进入某个设备动作模式。

use crate::{ProtocolError, SampleLayout};
use std::fmt;
use std::str::FromStr;

/// 会话模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// 等待命令（初始状态）
    AwaitingCommand,
    /// 复位
    Resetting,
    /// 小车居中
    Centering,
    /// PID 倒立控制
    RunningPid,
    /// 测量固有频率与品质因数
    Measuring,
    /// 归一化共振
    RunningResonance,
    /// 设定速度与加速度
    SettingSpeed,
    /// 频率扫描
    ScanningFrequency,
}

impl Mode {
    /// 由设备驱动的六个模式，顺序与固件命令编号无关
    pub const DEVICE_MODES: [Mode; 6] = [
        Mode::Centering,
        Mode::RunningPid,
        Mode::Measuring,
        Mode::RunningResonance,
        Mode::SettingSpeed,
        Mode::ScanningFrequency,
    ];

    /// 模式短名，用作导出目录名与 CSV 元数据
    pub fn name(self) -> &'static str {
        match self {
            Mode::AwaitingCommand => "command",
            Mode::Resetting => "reset",
            Mode::Centering => "center",
            Mode::RunningPid => "pid",
            Mode::Measuring => "measure",
            Mode::RunningResonance => "NR",
            Mode::SettingSpeed => "setSpeed",
            Mode::ScanningFrequency => "freq_scan",
        }
    }

    /// 设备进入该模式时输出的短语
    pub fn begin_phrase(self) -> Option<&'static str> {
        match self {
            Mode::Centering => Some("Beginning centring."),
            Mode::RunningPid => Some("Beginning PID control."),
            Mode::Measuring => Some("Beginning measuring the natural frequency and quality factor."),
            Mode::RunningResonance => Some("Beginning the normalised resonance."),
            Mode::SettingSpeed => Some("Beginning setting the speed and acceleration."),
            Mode::ScanningFrequency => Some("Beginning the frequency scan."),
            Mode::AwaitingCommand | Mode::Resetting => None,
        }
    }

    /// 按完整行匹配模式开始短语
    pub fn from_begin_phrase(line: &str) -> Option<Mode> {
        let line = line.trim_end();
        Self::DEVICE_MODES
            .into_iter()
            .find(|mode| mode.begin_phrase() == Some(line))
    }

    /// 是否为流式模式（需要遥测读取线程）
    pub fn is_streaming(self) -> bool {
        matches!(
            self,
            Mode::RunningPid
                | Mode::Measuring
                | Mode::RunningResonance
                | Mode::SettingSpeed
                | Mode::ScanningFrequency
        )
    }

    /// 流式模式下遥测行的字段布局
    pub fn sample_layout(self) -> SampleLayout {
        match self {
            Mode::Measuring => SampleLayout::AngleOnly,
            _ => SampleLayout::Full,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Mode::AwaitingCommand, Mode::Resetting]
            .into_iter()
            .chain(Self::DEVICE_MODES)
            .find(|mode| mode.name() == s.trim())
            .ok_or_else(|| ProtocolError::UnknownMode(s.to_string()))
    }
}
