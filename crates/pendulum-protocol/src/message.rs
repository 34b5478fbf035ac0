//! 设备消息分类
//!
//! 等待命令状态下，主机读取一批缓冲行后按以下规则分类：
//!
//! 1. 丢弃所有调试行
//! 2. 任一行属于复位短语集合 → `Reset`（复位优先）
//! 3. 恰好出现一种模式开始短语 → `Begin(mode)`
//! 4. 其它情况（无匹配、多种模式、空） → `NoCommand`

use crate::{Mode, is_debug_line, is_reset_phrase};

/// 分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMessage {
    /// 进入设备模式
    Begin(Mode),
    /// 请求会话复位
    Reset,
    /// 尚无命令，下次重试
    NoCommand,
}

/// 对单行分类（调试行视为无命令）
pub fn classify_line(line: &str) -> DeviceMessage {
    classify_batch([line])
}

/// 对一批行分类
pub fn classify_batch<I, S>(lines: I) -> DeviceMessage
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut begun: Option<Mode> = None;
    let mut ambiguous = false;

    for line in lines {
        let line = line.as_ref();
        if is_debug_line(line) {
            continue;
        }
        if is_reset_phrase(line) {
            return DeviceMessage::Reset;
        }
        if let Some(mode) = Mode::from_begin_phrase(line) {
            match begun {
                Some(existing) if existing != mode => ambiguous = true,
                _ => begun = Some(mode),
            }
        }
    }

    match begun {
        Some(mode) if !ambiguous => DeviceMessage::Begin(mode),
        _ => DeviceMessage::NoCommand,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RESET_PHRASES;
    use proptest::prelude::*;

    #[test]
    fn test_begin_each_mode() {
        for mode in Mode::DEVICE_MODES {
            let phrase = mode.begin_phrase().unwrap();
            assert_eq!(classify_line(phrase), DeviceMessage::Begin(mode));
        }
    }

    #[test]
    fn test_reset_wins_over_begin() {
        let batch = ["Beginning PID control.", "Resetting..."];
        assert_eq!(classify_batch(batch), DeviceMessage::Reset);
        let batch = ["Resetting...", "Beginning PID control."];
        assert_eq!(classify_batch(batch), DeviceMessage::Reset);
    }

    #[test]
    fn test_debug_lines_dropped_before_classification() {
        let batch = ["DEBUG 1", "DEBUG Resetting...", "Beginning centring.", "DEBUG 2"];
        assert_eq!(classify_batch(batch), DeviceMessage::Begin(Mode::Centering));
    }

    #[test]
    fn test_ambiguous_batch_is_no_command() {
        let batch = ["Beginning centring.", "Beginning PID control."];
        assert_eq!(classify_batch(batch), DeviceMessage::NoCommand);
        // 同一短语重复出现不算歧义
        let batch = ["Beginning centring.", "Beginning centring."];
        assert_eq!(classify_batch(batch), DeviceMessage::Begin(Mode::Centering));
    }

    #[test]
    fn test_empty_and_unknown() {
        assert_eq!(classify_batch(Vec::<String>::new()), DeviceMessage::NoCommand);
        assert_eq!(classify_line("hello"), DeviceMessage::NoCommand);
        assert_eq!(classify_line(""), DeviceMessage::NoCommand);
    }

    proptest! {
        #[test]
        fn prop_debug_lines_never_classify(suffix in ".*") {
            let line = format!("DEBUG{}", suffix);
            prop_assert_eq!(classify_line(&line), DeviceMessage::NoCommand);
        }

        #[test]
        fn prop_reset_phrase_always_resets(
            reset_idx in 0usize..6,
            mode_idx in 0usize..6,
            reset_first in any::<bool>(),
        ) {
            let reset = RESET_PHRASES[reset_idx];
            let begin = Mode::DEVICE_MODES[mode_idx].begin_phrase().unwrap();
            let batch = if reset_first { [reset, begin] } else { [begin, reset] };
            prop_assert_eq!(classify_batch(batch), DeviceMessage::Reset);
        }

        #[test]
        fn prop_begin_phrase_with_noise(
            mode_idx in 0usize..6,
            noise in proptest::collection::vec("[a-z ]{0,20}", 0..4),
        ) {
            let mode = Mode::DEVICE_MODES[mode_idx];
            let mut batch: Vec<String> = noise;
            batch.push(mode.begin_phrase().unwrap().to_string());
            prop_assert_eq!(classify_batch(&batch), DeviceMessage::Begin(mode));
        }
    }
}
