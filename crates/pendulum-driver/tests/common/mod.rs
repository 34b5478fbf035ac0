//! 集成测试共用设置

#![allow(dead_code)]

use pendulum_serial::MockTransport;
use pendulum_tools::SessionConfig;
use std::path::Path;

pub const PAUSE: &str = MockTransport::PAUSE;
pub const PROMPT: &str =
    "Before press ENTER, make sure the pendulum is stable at either the down or upright position!";
pub const ACK: &str = "Start inversion control.";
pub const KILL: &str = "Kill switch hit.";
pub const DEFAULT_WIRE: &str = "600,400,2.5,-0.05,0,-0.01";

/// 所有超时缩短到毫秒级的配置
pub fn quick_config(data_dir: &Path) -> SessionConfig {
    let mut config = SessionConfig::default();
    config.timing.handshake_delay_ms = 1;
    config.timing.open_settle_ms = 0;
    config.timing.reconnect_delay_ms = 0;
    config.timing.reconnect_attempts = 2;
    config.timing.centering_timeout_secs = 0.1;
    config.timing.prompt_timeout_secs = 0.1;
    config.timing.ack_timeout_secs = 0.1;
    config.timing.stream_ack_timeout_secs = 0.1;
    config.sweep.settle_secs = 0.0;
    config.sweep.inter_trial_secs = 0.0;
    config.telemetry.snapshot_interval_ms = 1;
    config.export.data_dir = data_dir.to_path_buf();
    config
}
