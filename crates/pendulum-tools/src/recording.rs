//! # 试验录制格式
//!
//! 导出的 CSV 由两段组成：
//!
//! ```text
//! mode,pid
//! Kp,Ki,Kd,Kp_pos,Ki_pos,Kd_pos
//! 600,400,2.5,-0.05,0,-0.01
//! start_time,889.405
//! center_count,12
//! distance,340
//!
//! time,angle,position,angular_velocity,cart_velocity
//! 0,0,0,0,0
//! 0.2,-0.0077,19,-0.537,461.4
//! ```
//!
//! 元数据段为 `key,value` 行，参数集以表头行加数值行表示；
//! 时间序列段以固定表头开始，缺失字段写为空单元格。
//! 读取时同时兼容旧格式（`special_info,` 开头、无空行分隔）。

use anyhow::{Context, Result};
use pendulum_protocol::{
    DataLog, PARAMETER_NAMES, ParameterSet, RunMetadata, SAMPLE_HEADER, Sample,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// 一次试验的元数据与采样
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrialRecording {
    pub metadata: RunMetadata,
    pub samples: Vec<Sample>,
}

impl TrialRecording {
    pub fn new(metadata: RunMetadata, samples: Vec<Sample>) -> Self {
        Self { metadata, samples }
    }

    /// 从数据日志快照构建
    pub fn from_log(log: &DataLog) -> Self {
        Self {
            metadata: log.metadata.clone(),
            samples: log.samples().to_vec(),
        }
    }

    pub fn into_log(self) -> DataLog {
        DataLog::from_parts(self.metadata, self.samples)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// 保存到 CSV 文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("创建导出文件失败: {}", path.display()))?;
        let mut out = BufWriter::new(file);

        {
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_writer(&mut out);
            for record in metadata_records(&self.metadata) {
                writer.write_record(&record).context("写入元数据失败")?;
            }
            writer.flush().context("写入元数据失败")?;
        }

        out.write_all(b"\n").context("写入分隔行失败")?;

        {
            let mut writer = csv::Writer::from_writer(&mut out);
            writer.write_record(SAMPLE_HEADER).context("写入表头失败")?;
            for sample in &self.samples {
                let row: Vec<String> = sample
                    .fields()
                    .iter()
                    .map(|field| field.map(|v| v.to_string()).unwrap_or_default())
                    .collect();
                writer.write_record(&row).context("写入采样失败")?;
            }
            writer.flush().context("写入采样失败")?;
        }

        out.flush().context("刷新缓冲区失败")?;
        Ok(())
    }

    /// 从 CSV 文件加载
    ///
    /// 没有时间序列表头的文件返回错误。
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("打开录制文件失败: {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("解析录制文件失败: {}", path.display()))
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut metadata = RunMetadata::default();
        let mut samples = Vec::new();
        let mut columns: Option<Vec<String>> = None;
        let mut expecting_parameters = false;

        for (index, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("读取第 {} 条记录失败", index + 1))?;
            let fields: Vec<&str> = record.iter().collect();
            if fields.iter().all(|f| f.is_empty()) {
                continue;
            }

            if let Some(columns) = &columns {
                samples.push(
                    parse_sample_row(columns, &fields)
                        .with_context(|| format!("第 {} 条记录不是有效采样", index + 1))?,
                );
                continue;
            }

            if expecting_parameters {
                expecting_parameters = false;
                let joined = fields.join(",");
                let params: ParameterSet = joined
                    .parse()
                    .with_context(|| format!("无效的参数集: {}", joined))?;
                metadata.parameters = Some(params);
                continue;
            }

            match fields[0] {
                "time" => columns = Some(fields.iter().map(|f| f.to_string()).collect()),
                "Kp" => expecting_parameters = true,
                key => apply_metadata(&mut metadata, key, fields.get(1).copied().unwrap_or(""))?,
            }
        }

        if columns.is_none() {
            anyhow::bail!("缺少时间序列表头");
        }

        Ok(Self { metadata, samples })
    }
}

fn metadata_records(metadata: &RunMetadata) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut push = |key: &str, value: String| records.push(vec![key.to_string(), value]);

    if let Some(mode) = metadata.mode {
        push("mode", mode.name().to_string());
    }
    if let Some(start_time) = metadata.start_time {
        push("start_time", start_time.to_string());
    }
    for (key, value) in [
        ("amplitude", metadata.amplitude),
        ("amp_0", metadata.amp_0),
        ("omega", metadata.omega),
        ("phase", metadata.phase),
    ] {
        if let Some(value) = value {
            push(key, value.to_string());
        }
    }
    if let Some(param) = &metadata.set_speed_param {
        push("set_speed_param", param.clone());
    }
    if let Some(count) = metadata.center_count {
        push("center_count", count.to_string());
    }
    if let Some(distance) = metadata.distance {
        push("distance", distance.to_string());
    }

    if let Some(params) = &metadata.parameters {
        // 参数集紧跟在 mode 之后
        let at = usize::from(metadata.mode.is_some());
        records.insert(at, PARAMETER_NAMES.iter().map(|n| n.to_string()).collect());
        records.insert(at + 1, params.gains().iter().map(|g| g.to_string()).collect());
    }
    records
}

fn apply_metadata(metadata: &mut RunMetadata, key: &str, value: &str) -> Result<()> {
    let float = |v: &str| -> Result<f64> {
        v.parse::<f64>()
            .with_context(|| format!("元数据 {} 的值无效: {:?}", key, v))
    };
    let int = |v: &str| -> Result<i64> {
        v.parse::<i64>()
            .with_context(|| format!("元数据 {} 的值无效: {:?}", key, v))
    };

    match key {
        "mode" => metadata.mode = Some(value.parse()?),
        "start_time" => metadata.start_time = Some(float(value)?),
        "amplitude" => metadata.amplitude = Some(float(value)?),
        "amp_0" => metadata.amp_0 = Some(float(value)?),
        "omega" => metadata.omega = Some(float(value)?),
        "phase" => metadata.phase = Some(float(value)?),
        "set_speed_param" => metadata.set_speed_param = Some(value.to_string()),
        "center_count" => metadata.center_count = Some(int(value)?),
        "distance" => metadata.distance = Some(int(value)?),
        // 旧格式的占位行与未知键
        _ => {},
    }
    Ok(())
}

fn parse_sample_row(columns: &[String], fields: &[&str]) -> Result<Sample> {
    let mut sample = Sample::default();
    let mut has_time = false;
    let mut has_angle = false;

    for (name, text) in columns.iter().zip(fields) {
        if text.is_empty() {
            continue;
        }
        let value: f64 = text
            .parse()
            .with_context(|| format!("字段 {} 的值无效: {:?}", name, text))?;
        match name.as_str() {
            "time" => {
                sample.time = value;
                has_time = true;
            },
            "angle" => {
                sample.angle = value;
                has_angle = true;
            },
            "position" => sample.position = Some(value),
            "angular_velocity" => sample.angular_velocity = Some(value),
            "cart_velocity" => sample.cart_velocity = Some(value),
            _ => {},
        }
    }

    if !(has_time && has_angle) {
        anyhow::bail!("采样缺少 time 或 angle");
    }
    Ok(sample)
}
