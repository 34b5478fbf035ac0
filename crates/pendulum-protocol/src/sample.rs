//! 遥测采样
//!
//! 设备在流式模式下每行输出一个采样，字段以逗号分隔：
//!
//! ```text
//! time,angle                                              (测量模式)
//! time,angle,position,angular_velocity,cart_velocity      (其它流式模式)
//! ```

use crate::ProtocolError;

/// 时间序列表头
pub const SAMPLE_HEADER: [&str; 5] = [
    "time",
    "angle",
    "position",
    "angular_velocity",
    "cart_velocity",
];

/// 遥测行的字段布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleLayout {
    /// 仅时间与摆角
    AngleOnly,
    /// 全部五个字段
    Full,
}

impl SampleLayout {
    pub fn field_count(self) -> usize {
        match self {
            SampleLayout::AngleOnly => 2,
            SampleLayout::Full => 5,
        }
    }
}

/// 一条遥测记录
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    pub time: f64,
    pub angle: f64,
    pub position: Option<f64>,
    pub angular_velocity: Option<f64>,
    pub cart_velocity: Option<f64>,
}

impl Sample {
    pub fn new(time: f64, angle: f64) -> Self {
        Self {
            time,
            angle,
            ..Default::default()
        }
    }

    pub fn full(
        time: f64,
        angle: f64,
        position: f64,
        angular_velocity: f64,
        cart_velocity: f64,
    ) -> Self {
        Self {
            time,
            angle,
            position: Some(position),
            angular_velocity: Some(angular_velocity),
            cart_velocity: Some(cart_velocity),
        }
    }

    /// 解析一行遥测
    ///
    /// 字段数必须与布局一致，所有字段必须是有限数值。
    /// `time_scale` 把设备时间单位换算为秒（设备已输出秒时为 1.0）。
    pub fn parse(line: &str, layout: SampleLayout, time_scale: f64) -> Result<Self, ProtocolError> {
        let fields: Vec<&str> = line.trim().split(',').collect();
        if fields.len() != layout.field_count() {
            return Err(ProtocolError::InvalidFieldCount {
                expected: layout.field_count(),
                actual: fields.len(),
            });
        }

        let mut values = [0.0; 5];
        for (i, field) in fields.iter().enumerate() {
            values[i] = parse_decimal(SAMPLE_HEADER[i], field)?;
        }

        let mut sample = Sample::new(values[0] * time_scale, values[1]);
        if layout == SampleLayout::Full {
            sample.position = Some(values[2]);
            sample.angular_velocity = Some(values[3]);
            sample.cart_velocity = Some(values[4]);
        }
        Ok(sample)
    }

    /// 五个字段，缺失的字段为 `None`
    pub fn fields(&self) -> [Option<f64>; 5] {
        [
            Some(self.time),
            Some(self.angle),
            self.position,
            self.angular_velocity,
            self.cart_velocity,
        ]
    }
}

/// 解析一个有限的十进制数
pub fn parse_decimal(field: &'static str, text: &str) -> Result<f64, ProtocolError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ProtocolError::InvalidNumber {
            field,
            value: text.to_string(),
        })
}
