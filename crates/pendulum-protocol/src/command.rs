//! 命令选择令牌与居中结果

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// 命令选择令牌：单个数字，发送时追加换行
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandToken(u8);

impl CommandToken {
    /// 居中
    pub const CENTRE: CommandToken = CommandToken(1);
    /// PID 控制
    pub const PID: CommandToken = CommandToken(4);

    pub fn new(digit: u8) -> Result<Self, ProtocolError> {
        if digit <= 9 {
            Ok(Self(digit))
        } else {
            Err(ProtocolError::InvalidCommandToken(digit.to_string()))
        }
    }

    pub fn digit(self) -> u8 {
        self.0
    }
}

impl fmt::Display for CommandToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CommandToken {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_digit() => Ok(Self(c as u8 - b'0')),
            _ => Err(ProtocolError::InvalidCommandToken(s.to_string())),
        }
    }
}

/// 居中结果：`<center_count>,<distance>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CenteringResult {
    pub center_count: i64,
    pub distance: i64,
}

impl CenteringResult {
    /// 解析居中结果行，非 `<整数>,<整数>` 形式返回 `None`
    pub fn parse(line: &str) -> Option<Self> {
        let (count, distance) = line.trim().split_once(',')?;
        Some(Self {
            center_count: count.trim().parse().ok()?,
            distance: distance.trim().parse().ok()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_token() {
        assert_eq!(CommandToken::CENTRE.to_string(), "1");
        assert_eq!(CommandToken::PID.to_string(), "4");
        assert_eq!("7".parse::<CommandToken>().unwrap().digit(), 7);
        assert_eq!(" 3 ".parse::<CommandToken>().unwrap().digit(), 3);
        assert!("12".parse::<CommandToken>().is_err());
        assert!("a".parse::<CommandToken>().is_err());
        assert!("".parse::<CommandToken>().is_err());
        assert!(CommandToken::new(10).is_err());
    }

    #[test]
    fn test_centering_result() {
        assert_eq!(
            CenteringResult::parse("12,340"),
            Some(CenteringResult { center_count: 12, distance: 340 })
        );
        assert_eq!(
            CenteringResult::parse("-3, 5\r"),
            Some(CenteringResult { center_count: -3, distance: 5 })
        );
        assert_eq!(CenteringResult::parse("12,340,1"), None);
        assert_eq!(CenteringResult::parse("1.5,2"), None);
        assert_eq!(CenteringResult::parse("Beginning centring."), None);
    }
}
