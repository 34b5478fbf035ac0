//! 单次运行的数据日志
//!
//! 日志由会话持有，运行期间只由遥测读取线程追加。
//! 第一条采样的设备时间记为 `start_time`，之后的采样时间都相对于它存储。

use crate::{CenteringResult, Mode, ParameterSet, Sample};

/// 运行级元数据
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunMetadata {
    pub mode: Option<Mode>,
    pub parameters: Option<ParameterSet>,
    /// 第一条采样的设备时间（秒）
    pub start_time: Option<f64>,
    /// 最近一次发送的驱动振幅
    pub amplitude: Option<f64>,
    /// 初始振幅
    pub amp_0: Option<f64>,
    /// 驱动角频率
    pub omega: Option<f64>,
    pub phase: Option<f64>,
    /// 设备回显的速度/加速度参数
    pub set_speed_param: Option<String>,
    pub center_count: Option<i64>,
    pub distance: Option<i64>,
}

impl RunMetadata {
    pub fn set_centering(&mut self, result: CenteringResult) {
        self.center_count = Some(result.center_count);
        self.distance = Some(result.distance);
    }
}

/// 采样序列与运行元数据
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataLog {
    pub metadata: RunMetadata,
    samples: Vec<Sample>,
}

impl DataLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由已存在的数据构建（例如从 CSV 读回），采样时间按原样保存
    pub fn from_parts(metadata: RunMetadata, samples: Vec<Sample>) -> Self {
        Self { metadata, samples }
    }

    /// 追加一条采样，时间换算为相对运行开始的时间
    pub fn push(&mut self, mut sample: Sample) {
        let start = *self.metadata.start_time.get_or_insert(sample.time);
        sample.time -= start;
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 清空采样与运行元数据
    pub fn clear(&mut self) {
        self.samples.clear();
        self.metadata = RunMetadata::default();
    }
}
