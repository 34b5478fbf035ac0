//! PID 参数集
//!
//! 六个增益按固定顺序排列：
//! `Kp, Ki, Kd`（摆角）与 `Kp_pos, Ki_pos, Kd_pos`（小车位置）。
//! 线路格式为逗号连接的十进制字符串，例如 `600,400,2.5,-0.05,0,-0.01`。

use crate::ProtocolError;
use crate::sample::parse_decimal;
use std::fmt;
use std::str::FromStr;

/// 参数名，同时也是 CSV 元数据中的表头
pub const PARAMETER_NAMES: [&str; 6] = ["Kp", "Ki", "Kd", "Kp_pos", "Ki_pos", "Kd_pos"];

/// 发送到设备时保留的最大小数位数
pub const WIRE_DECIMALS: usize = 4;

/// 六个控制增益
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterSet(pub [f64; 6]);

impl ParameterSet {
    pub fn new(kp: f64, ki: f64, kd: f64, kp_pos: f64, ki_pos: f64, kd_pos: f64) -> Self {
        Self([kp, ki, kd, kp_pos, ki_pos, kd_pos])
    }

    pub fn gains(&self) -> &[f64; 6] {
        &self.0
    }

    /// 线路格式（不含换行符）
    ///
    /// 每个值按 [`WIRE_DECIMALS`] 位小数格式化后去掉末尾的零，
    /// 因此 `600.0` 发送为 `600`，`-0.05` 发送为 `-0.05`。
    pub fn to_wire(&self) -> String {
        self.0
            .iter()
            .map(|v| format_decimal(*v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::new(600.0, 400.0, 2.5, -0.05, 0.0, -0.01)
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl FromStr for ParameterSet {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(',').collect();
        if fields.len() != PARAMETER_NAMES.len() {
            return Err(ProtocolError::InvalidFieldCount {
                expected: PARAMETER_NAMES.len(),
                actual: fields.len(),
            });
        }

        let mut gains = [0.0; 6];
        for (i, field) in fields.iter().enumerate() {
            gains[i] = parse_decimal(PARAMETER_NAMES[i], field)?;
        }
        Ok(Self(gains))
    }
}

fn format_decimal(value: f64) -> String {
    let text = format!("{:.*}", WIRE_DECIMALS, value);
    let trimmed = if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text.as_str()
    };
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_wire_format() {
        assert_eq!(ParameterSet::default().to_wire(), "600,400,2.5,-0.05,0,-0.01");
    }

    #[test]
    fn test_parse() {
        let params: ParameterSet = "600,400,2.5,-0.05,0,-0.01".parse().unwrap();
        assert_eq!(params, ParameterSet::default());

        let params: ParameterSet = " 525.0, 367.5,3.50,-0.043,0,-0.0083 ".parse().unwrap();
        assert_eq!(params.gains()[1], 367.5);
        assert_eq!(params.to_wire(), "525,367.5,3.5,-0.043,0,-0.0083");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "1,2,3".parse::<ParameterSet>(),
            Err(ProtocolError::InvalidFieldCount { expected: 6, actual: 3 })
        );
        let err = "1,2,x,4,5,6".parse::<ParameterSet>().unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidNumber { field: "Kd", .. }));
        assert!("1,2,NaN,4,5,6".parse::<ParameterSet>().is_err());
    }

    #[test]
    fn test_precision_and_negative_zero() {
        let params = ParameterSet::new(1.0 / 3.0, -0.0, 0.00004, 10.0, 0.0, -0.123456);
        assert_eq!(params.to_wire(), "0.3333,0,0,10,0,-0.1235");
    }
}
