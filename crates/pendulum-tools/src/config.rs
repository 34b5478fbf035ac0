//! # 会话配置
//!
//! 配置文件路径：
//! - Linux/macOS: `~/.config/pendulum/config.toml`
//! - Windows: `%APPDATA%\pendulum\config.toml`
//!
//! 文件不存在时使用默认值，文件中缺失的字段同样取默认值。

use anyhow::{Context, Result};
use pendulum_protocol::ParameterSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// PID 确认超时后的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckPolicy {
    /// 结束本次运行并导出已有数据
    #[default]
    Abandon,
    /// 保持输入门打开，后续 tick 继续等待确认（不重发参数）
    Retry,
}

/// 会话配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 手动会话使用的 PID 参数
    pub default_parameters: ParameterSet,
    pub serial: SerialSettings,
    pub timing: TimingSettings,
    pub sweep: SweepSettings,
    pub telemetry: TelemetrySettings,
    pub export: ExportSettings,
}

/// 串口设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    pub port: Option<String>,
    pub baud_rate: u32,
    /// 单次读超时（毫秒）
    pub read_timeout_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 230_400,
            read_timeout_ms: 100,
        }
    }
}

impl SerialSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// 握手与超时设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// 协议步骤之间的间隔（毫秒）
    pub handshake_delay_ms: u64,
    pub centering_timeout_secs: f64,
    pub prompt_timeout_secs: f64,
    pub ack_timeout_secs: f64,
    pub ack_policy: AckPolicy,
    /// 流式握手（设定速度 / 共振 / 扫频）超时
    pub stream_ack_timeout_secs: f64,
    /// 手动会话的单次运行时长上限，不设置则不限
    pub trial_duration_secs: Option<f64>,
    pub reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
    /// 打开端口后等待控制器复位（毫秒）
    pub open_settle_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            handshake_delay_ms: 100,
            centering_timeout_secs: 20.0,
            prompt_timeout_secs: 15.0,
            ack_timeout_secs: 10.0,
            ack_policy: AckPolicy::Abandon,
            stream_ack_timeout_secs: 10.0,
            trial_duration_secs: None,
            reconnect_attempts: 3,
            reconnect_delay_ms: 1000,
            open_settle_ms: 2000,
        }
    }
}

impl TimingSettings {
    pub fn handshake_delay(&self) -> Duration {
        Duration::from_millis(self.handshake_delay_ms)
    }

    pub fn centering_timeout(&self) -> Duration {
        secs(self.centering_timeout_secs)
    }

    pub fn prompt_timeout(&self) -> Duration {
        secs(self.prompt_timeout_secs)
    }

    pub fn ack_timeout(&self) -> Duration {
        secs(self.ack_timeout_secs)
    }

    pub fn stream_ack_timeout(&self) -> Duration {
        secs(self.stream_ack_timeout_secs)
    }

    pub fn trial_duration(&self) -> Option<Duration> {
        self.trial_duration_secs.map(secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn open_settle(&self) -> Duration {
        Duration::from_millis(self.open_settle_ms)
    }
}

/// 自动试验设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    pub trial_duration_secs: f64,
    /// 居中完成后的稳定时间
    pub settle_secs: f64,
    pub inter_trial_secs: f64,
    pub work_period_mins: f64,
    pub cooldown_mins: f64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            trial_duration_secs: 45.0,
            settle_secs: 1.0,
            inter_trial_secs: 8.0,
            work_period_mins: 20.0,
            cooldown_mins: 5.0,
        }
    }
}

impl SweepSettings {
    pub fn trial_duration(&self) -> Duration {
        secs(self.trial_duration_secs)
    }

    pub fn settle(&self) -> Duration {
        secs(self.settle_secs)
    }

    pub fn inter_trial(&self) -> Duration {
        secs(self.inter_trial_secs)
    }

    pub fn work_period(&self) -> Duration {
        secs(self.work_period_mins * 60.0)
    }

    pub fn cooldown(&self) -> Duration {
        secs(self.cooldown_mins * 60.0)
    }
}

/// 遥测设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// 设备时间到秒的换算系数
    pub time_scale: f64,
    /// 振幅安全上限：`omega * |amp|` 不得超过此值
    pub amplitude_limit: f64,
    /// 流式运行中快照刷新间隔（毫秒）
    pub snapshot_interval_ms: u64,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            amplitude_limit: 2000.0,
            snapshot_interval_ms: 100,
        }
    }
}

impl TelemetrySettings {
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms)
    }
}

/// 导出设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub data_dir: PathBuf,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("cart_pendulum_data"),
        }
    }
}

impl SessionConfig {
    /// 默认配置文件路径
    pub fn default_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
        path.push("pendulum");
        path.push("config.toml");
        Ok(path)
    }

    /// 从文件加载，文件不存在时返回默认配置
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置失败")
    }

    /// 保存到文件（自动创建父目录）
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("创建配置目录失败")?;
        }
        fs::write(path, self.to_toml()?).context("写入配置文件失败")?;
        Ok(())
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::ZERO)
}
