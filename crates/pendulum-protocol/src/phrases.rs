//! 设备输出的固定短语
//!
//! 这些字符串必须与控制器固件 `command_print()` 的输出完全一致。

/// 调试行前缀，带此前缀的行不是协议消息
pub const DEBUG_PREFIX: &str = "DEBUG";

/// 急停（限位开关触发）
pub const KILL_SWITCH: &str = "Kill switch hit.";

/// PID 参数确认
pub const PID_ACKNOWLEDGED: &str = "Start inversion control.";

/// PID 参数输入提示（前缀匹配）
pub const PID_PROMPTS: [&str; 2] = [
    "Before press ENTER, make sure the pendulum is stable at either the down or upright position!",
    "Resume (ENTER r) or ENTER six numbers split by commas without spaces",
];

/// 设定速度握手 1 的确认前缀，其后为设备回显的速度/加速度参数
pub const SET_SPEED_ACK_PREFIX: &str = "Start sinusoidal motion with ";

/// 设定速度握手 2（初始振幅）的确认前缀
pub const AMPLITUDE_ACK_PREFIX: &str = "Starting with amplitude:";

/// 共振 / 扫频模式的确认前缀
pub const STREAM_ACK_PREFIX: &str = "Start";

/// 主机发送的结束请求
pub const TERMINATE: &str = "Terminate";

/// 复位短语集合
pub const RESET_PHRASES: [&str; 6] = [
    "Resetting...",
    "No command detected.",
    "Unidentified command. Please try again.",
    "More than one command detected. Resetting the values.",
    "Hasn't been centred. Please centre the cart first.",
    "Terminating since limit switch pressed...",
];

/// 是否为调试行
pub fn is_debug_line(line: &str) -> bool {
    line.trim_start().starts_with(DEBUG_PREFIX)
}

/// 是否为急停短语
pub fn is_kill_switch(line: &str) -> bool {
    line.trim_end() == KILL_SWITCH
}

/// 是否为 PID 参数输入提示
pub fn is_pid_prompt(line: &str) -> bool {
    let line = line.trim_end();
    PID_PROMPTS.iter().any(|prompt| line.starts_with(prompt))
}

/// 是否包含 PID 确认短语
pub fn is_pid_acknowledgement(line: &str) -> bool {
    line.contains(PID_ACKNOWLEDGED)
}

/// 是否为复位短语
pub fn is_reset_phrase(line: &str) -> bool {
    RESET_PHRASES.contains(&line.trim_end())
}
