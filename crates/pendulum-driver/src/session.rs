//! # 会话状态机
//!
//! 一个 `Session` 对应一条设备连接上的交互控制会话。
//!
//! ## 调度
//!
//! 每次 [`Session::tick`] 按当前模式运行一个处理器：
//!
//! ```text
//! AwaitingCommand ──开始短语──▶ Centering / RunningPid / Measuring / ...
//!        │ ▲
//!   复位短语 └──────────── Resetting
//! ```
//!
//! 流式模式（PID、测量、设定速度、共振、扫频）先完成握手，再启动遥测读取线程；
//! 运行结束时依次：停止读取线程、发送 `Terminate`、关闭传输、导出、部分复位、重连。
//!
//! ## 线程模型
//!
//! - 调度循环：单线程，所有阻塞等待都可被中断标志打断
//! - 遥测读取线程：每次运行最多一个，是数据日志的唯一写入者
//! - 调度循环只读取数据日志的快照

use crate::error::SessionError;
use crate::input::{HandshakeRequest, NullSink, OperatorInput, SnapshotSink, Unattended};
use crate::reader::{ReaderExit, TelemetryReader};
use crate::wait::{await_line, pace};
use parking_lot::Mutex;
use pendulum_protocol::{
    AMPLITUDE_ACK_PREFIX, CenteringResult, CommandToken, DataLog, DeviceMessage, Mode, ParameterSet,
    SET_SPEED_ACK_PREFIX, STREAM_ACK_PREFIX, TERMINATE, classify_batch, is_debug_line,
    is_pid_acknowledgement, is_pid_prompt, parse_decimal,
};
use pendulum_serial::{Transport, TransportError};
use pendulum_tools::{AckPolicy, CsvExporter, RunSink, SessionConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// 等待读取线程退出的上限
const READER_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// 运行结束后的重连方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectMode {
    /// 询问操作员，拒绝则结束会话
    #[default]
    Manual,
    /// 立即重新打开
    Automatic,
    /// 保持关闭，由调用方在下一次运行前打开
    Deferred,
}

/// PID 模式握手子状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PidState {
    pub prompt_seen: bool,
    pub params_sent: bool,
    pub acknowledged: bool,
    pub started_at: Option<Instant>,
}

/// 设定速度模式握手子状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeedState {
    pub speed_acknowledged: bool,
    pub amplitude_acknowledged: bool,
}

/// 每次运行的子状态，运行开始和复位时清零
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubState {
    pub pid: PidState,
    pub speed: SpeedState,
    /// 共振 / 扫频握手已确认
    pub stream_acknowledged: bool,
    pub reader_started: bool,
}

impl SubState {
    /// 模式的握手是否已经完成
    pub fn handshake_complete(&self, mode: Mode) -> bool {
        match mode {
            Mode::RunningPid => self.pid.acknowledged,
            Mode::SettingSpeed => self.speed.speed_acknowledged && self.speed.amplitude_acknowledged,
            Mode::RunningResonance | Mode::ScanningFrequency => self.stream_acknowledged,
            Mode::Measuring => true,
            _ => false,
        }
    }
}

/// 运行结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// 设备报告急停
    EmergencyStop,
    /// 达到试验时长上限
    DurationElapsed,
    /// 握手超时
    HandshakeTimeout,
    /// 操作员中断
    Interrupted,
    /// 端口不可用
    TransportFailed,
    /// 其它关闭请求
    Closed,
}

/// 一次运行的结果
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub mode: Mode,
    pub parameters: Option<ParameterSet>,
    pub samples: usize,
    pub acknowledged: bool,
    pub end: RunEnd,
    /// 导出文件，导出失败时为 `None`
    pub export: Option<PathBuf>,
}

/// 控制会话
pub struct Session<T: Transport + 'static> {
    transport: Arc<Mutex<T>>,
    config: SessionConfig,
    mode: Mode,
    sub: SubState,
    log: Arc<Mutex<DataLog>>,
    close_requested: Arc<AtomicBool>,
    interrupt: Arc<AtomicBool>,
    reader: Option<TelemetryReader>,
    end_reason: Option<RunEnd>,
    centering: Option<CenteringResult>,
    /// 振幅更新时随附的相位，没有任何设备消息会更新它
    phase: f64,
    omega: Option<f64>,
    parameters: ParameterSet,
    input: Box<dyn OperatorInput>,
    sink: Box<dyn SnapshotSink>,
    exporter: Box<dyn RunSink>,
    export_subdir: Option<String>,
    trial_ceiling: Option<Duration>,
    ack_policy: AckPolicy,
    reconnect: ReconnectMode,
    pending_full_reset: bool,
    ended: bool,
    last_run: Option<RunReport>,
}

impl<T: Transport + 'static> Session<T> {
    /// 创建会话（不打开传输）
    ///
    /// 默认：无人值守输入、丢弃快照、导出到配置的数据目录、手动重连。
    pub fn new(transport: T, config: SessionConfig) -> Self {
        let exporter = CsvExporter::new(config.export.data_dir.clone());
        Self {
            transport: Arc::new(Mutex::new(transport)),
            mode: Mode::AwaitingCommand,
            sub: SubState::default(),
            log: Arc::new(Mutex::new(DataLog::new())),
            close_requested: Arc::new(AtomicBool::new(false)),
            interrupt: Arc::new(AtomicBool::new(false)),
            reader: None,
            end_reason: None,
            centering: None,
            phase: 0.0,
            omega: None,
            parameters: config.default_parameters,
            input: Box::new(Unattended),
            sink: Box::new(NullSink),
            exporter: Box::new(exporter),
            export_subdir: None,
            trial_ceiling: config.timing.trial_duration(),
            ack_policy: config.timing.ack_policy,
            reconnect: ReconnectMode::Manual,
            pending_full_reset: false,
            ended: false,
            last_run: None,
            config,
        }
    }

    pub fn with_input(mut self, input: impl OperatorInput + 'static) -> Self {
        self.input = Box::new(input);
        self
    }

    pub fn with_snapshot_sink(mut self, sink: impl SnapshotSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn with_exporter(mut self, exporter: impl RunSink + 'static) -> Self {
        self.exporter = Box::new(exporter);
        self
    }

    /// 共享中断标志（例如由 Ctrl+C 处理器设置）
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectMode) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_parameters(mut self, parameters: ParameterSet) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn set_trial_ceiling(&mut self, ceiling: Option<Duration>) {
        self.trial_ceiling = ceiling;
    }

    pub fn set_ack_policy(&mut self, policy: AckPolicy) {
        self.ack_policy = policy;
    }

    /// 导出子目录，`None` 时使用模式名
    pub fn set_export_subdir(&mut self, subdir: Option<String>) {
        self.export_subdir = subdir;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn sub_state(&self) -> &SubState {
        &self.sub
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn parameters(&self) -> ParameterSet {
        self.parameters
    }

    pub fn centering(&self) -> Option<CenteringResult> {
        self.centering
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested.load(Ordering::Acquire)
    }

    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    /// 数据日志的一致快照
    pub fn log_snapshot(&self) -> DataLog {
        self.log.lock().clone()
    }

    pub fn last_run(&self) -> Option<&RunReport> {
        self.last_run.as_ref()
    }

    pub fn take_last_run(&mut self) -> Option<RunReport> {
        self.last_run.take()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn is_open(&self) -> bool {
        self.transport.lock().is_open()
    }

    /// 运行会话，直到操作员结束或发生致命错误
    ///
    /// 中断在这里按模式路由到重连/导出；致命错误在尽力导出后返回。
    pub fn run(&mut self) -> Result<(), SessionError> {
        if let Err(e) = self.ensure_open() {
            self.ended = true;
            return Err(e);
        }

        while !self.ended {
            match self.tick() {
                Ok(()) => {},
                Err(SessionError::Interrupted) => {
                    self.interrupt.store(false, Ordering::Release);
                    if let Err(e) = self.handle_interrupt() {
                        if e.is_fatal() {
                            self.abort();
                            return Err(e);
                        }
                        warn!("{}", e);
                    }
                },
                Err(e) if e.is_fatal() => {
                    error!("Session failed in {} mode: {}", self.mode, e);
                    self.abort();
                    return Err(e);
                },
                Err(e) => warn!("{}", e),
            }

            // 延迟重连模式下运行结束后端口保持关闭
            if !self.ended
                && !self.is_open()
                && let Err(e) = self.reopen()
            {
                self.abort();
                return Err(e);
            }
        }
        Ok(())
    }

    /// 运行当前模式的处理器一次
    pub fn tick(&mut self) -> Result<(), SessionError> {
        if self.interrupt.load(Ordering::Acquire) {
            return Err(SessionError::Interrupted);
        }

        match self.mode {
            Mode::AwaitingCommand => self.await_command(),
            Mode::Resetting => self.reset(),
            Mode::Centering => self.run_centering().map(|_| ()),
            Mode::RunningPid => self.run_pid(),
            Mode::SettingSpeed => self.run_set_speed(),
            Mode::RunningResonance => self.run_resonance(),
            Mode::ScanningFrequency => self.run_frequency_scan(),
            Mode::Measuring => self.streaming_step(),
        }
    }

    // ==================== 命令与复位 ====================

    fn await_command(&mut self) -> Result<(), SessionError> {
        for line in self.transport.lock().read_all()? {
            trace!("Discarding buffered line: {}", line);
        }

        if let Some(token) = self.input.command() {
            self.send_command(token)?;
        }
        pace(self.config.timing.handshake_delay(), &self.interrupt)?;

        let lines = self.transport.lock().read_all()?;
        self.dispatch(&lines);
        Ok(())
    }

    /// 对一批设备输出分类并切换模式
    fn dispatch(&mut self, lines: &[String]) {
        match classify_batch(lines) {
            DeviceMessage::Begin(mode) => {
                self.begin_run(mode);
                if mode == Mode::RunningPid && lines.iter().any(|l| is_pid_prompt(l)) {
                    self.sub.pid.prompt_seen = true;
                }
            },
            DeviceMessage::Reset => {
                self.pending_full_reset = true;
                self.enter_mode(Mode::Resetting);
            },
            DeviceMessage::NoCommand => {
                for line in lines.iter().filter(|l| !is_debug_line(l)) {
                    debug!("Unmatched device output: {}", line);
                }
            },
        }
    }

    fn reset(&mut self) -> Result<(), SessionError> {
        self.transport.lock().clear_input()?;
        let full = std::mem::take(&mut self.pending_full_reset);
        self.apply_reset(full);
        self.enter_mode(Mode::AwaitingCommand);
        Ok(())
    }

    /// 清空子状态和数据日志；完全复位还会清除居中结果
    fn apply_reset(&mut self, full: bool) {
        self.sub = SubState::default();
        self.end_reason = None;
        self.log.lock().clear();
        self.close_requested.store(false, Ordering::Release);
        if full {
            self.centering = None;
            self.omega = None;
            self.phase = 0.0;
        }
    }

    fn enter_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            info!("Mode {} -> {}", self.mode, mode);
        }
        self.mode = mode;
    }

    /// 新运行：清空子状态与数据日志
    fn begin_run(&mut self, mode: Mode) {
        self.sub = SubState::default();
        self.end_reason = None;
        self.close_requested.store(false, Ordering::Release);
        {
            let mut log = self.log.lock();
            log.clear();
            log.metadata.mode = Some(mode);
            if let Some(centering) = self.centering {
                log.metadata.set_centering(centering);
            }
        }
        self.enter_mode(mode);
    }

    // ==================== 模式处理器 ====================

    fn run_centering(&mut self) -> Result<CenteringResult, SessionError> {
        let timeout = self.config.timing.centering_timeout();
        match self.wait_for(timeout, CenteringResult::parse)? {
            Some(result) => {
                info!(
                    "Centred: center_count={}, distance={}",
                    result.center_count, result.distance
                );
                self.centering = Some(result);
                self.log.lock().metadata.set_centering(result);
                self.enter_mode(Mode::AwaitingCommand);
                Ok(result)
            },
            None => {
                error!("No centering result within {:?}, closing transport", timeout);
                self.transport.lock().close();
                self.ended = true;
                Err(SessionError::CenteringTimeout(timeout))
            },
        }
    }

    fn run_pid(&mut self) -> Result<(), SessionError> {
        if !self.sub.pid.acknowledged {
            if !self.sub.pid.prompt_seen {
                let timeout = self.config.timing.prompt_timeout();
                if self.wait_for(timeout, |l| is_pid_prompt(l).then_some(()))?.is_none() {
                    return self.handshake_failed("PID prompt");
                }
                self.sub.pid.prompt_seen = true;
            }

            // 同一输入窗口内参数只发送一次
            if !self.sub.pid.params_sent {
                let wire = self.parameters.to_wire();
                self.transport.lock().send_line(&wire)?;
                self.sub.pid.params_sent = true;
                self.log.lock().metadata.parameters = Some(self.parameters);
                info!("Sent PID parameters {}", wire);
            }

            let timeout = self.config.timing.ack_timeout();
            if self.wait_for(timeout, |l| is_pid_acknowledgement(l).then_some(()))?.is_none() {
                return match self.ack_policy {
                    AckPolicy::Abandon => self.handshake_failed("PID acknowledgement"),
                    AckPolicy::Retry => {
                        warn!("No PID acknowledgement within {:?}, still waiting", timeout);
                        Ok(())
                    },
                };
            }
            self.sub.pid.acknowledged = true;
            self.sub.pid.started_at = Some(Instant::now());
            info!("Device acknowledged PID start");
        }

        if let (Some(limit), Some(started)) = (self.trial_ceiling, self.sub.pid.started_at)
            && started.elapsed() >= limit
            && !self.close_requested()
        {
            info!("Trial duration {:?} reached", limit);
            self.end_reason.get_or_insert(RunEnd::DurationElapsed);
            self.close_requested.store(true, Ordering::Release);
        }
        self.streaming_step()
    }

    fn run_set_speed(&mut self) -> Result<(), SessionError> {
        if !self.sub.speed.speed_acknowledged {
            let value = self.ask(HandshakeRequest::SpeedAndAcceleration)?;
            let Some(echoed) = self.handshake(&value, SET_SPEED_ACK_PREFIX)? else {
                return self.handshake_failed("speed acknowledgement");
            };
            info!("Speed and acceleration set: {}", echoed);
            self.log.lock().metadata.set_speed_param = Some(echoed);
            self.sub.speed.speed_acknowledged = true;
        }

        if !self.sub.speed.amplitude_acknowledged {
            let value = self.ask(HandshakeRequest::InitialAmplitude)?;
            let amp_0 = parse_decimal("amp_0", &value)?;
            if self.handshake(&value, AMPLITUDE_ACK_PREFIX)?.is_none() {
                return self.handshake_failed("amplitude acknowledgement");
            }
            {
                let mut log = self.log.lock();
                log.metadata.amp_0 = Some(amp_0);
                log.metadata.amplitude = Some(amp_0);
            }
            self.sub.speed.amplitude_acknowledged = true;
        }

        self.streaming_step()
    }

    fn run_resonance(&mut self) -> Result<(), SessionError> {
        if !self.sub.stream_acknowledged {
            let value = self.ask(HandshakeRequest::DriveFrequency)?;
            let omega = parse_decimal("omega", &value)?;
            if self.handshake(&value, STREAM_ACK_PREFIX)?.is_none() {
                return self.handshake_failed("drive frequency acknowledgement");
            }
            self.omega = Some(omega);
            self.log.lock().metadata.omega = Some(omega);
            self.sub.stream_acknowledged = true;
        }
        self.streaming_step()
    }

    fn run_frequency_scan(&mut self) -> Result<(), SessionError> {
        if !self.sub.stream_acknowledged {
            let value = self.ask(HandshakeRequest::ScanSpecification)?;
            if self.handshake(&value, STREAM_ACK_PREFIX)?.is_none() {
                return self.handshake_failed("frequency scan acknowledgement");
            }
            self.sub.stream_acknowledged = true;
        }
        self.streaming_step()
    }

    /// 流式阶段的一步：确保读取线程运行、交出快照、检查结束条件
    fn streaming_step(&mut self) -> Result<(), SessionError> {
        let mode = self.mode;

        if !self.sub.reader_started && !self.close_requested() {
            self.reader = Some(TelemetryReader::spawn(
                self.transport.clone(),
                self.log.clone(),
                self.close_requested.clone(),
                mode.sample_layout(),
                self.config.telemetry.time_scale,
            )?);
            self.sub.reader_started = true;
            debug!("Telemetry reader started for {} run", mode);
        }

        let snapshot = self.log.lock().clone();
        self.sink.snapshot(mode, &snapshot);

        if matches!(mode, Mode::SettingSpeed | Mode::RunningResonance)
            && let Some(amplitude) = self.input.poll_amplitude()
        {
            self.update_amplitude(amplitude)?;
        }

        if self.close_requested() {
            // 读取线程先设置结束标志再报告原因，这里等待它的报告
            let exit = self
                .reader
                .take()
                .and_then(|reader| reader.stop(&self.close_requested, READER_STOP_TIMEOUT));
            match exit {
                Some(ReaderExit::TransportFailed(reason)) => {
                    self.abort();
                    return Err(TransportError::Disconnected(reason).into());
                },
                Some(ReaderExit::EmergencyStop) => {
                    self.end_reason.get_or_insert(RunEnd::EmergencyStop);
                },
                Some(ReaderExit::CloseRequested) | None => {},
            }
            let end = self.end_reason.take().unwrap_or(RunEnd::Closed);
            return self.finish_run(end, mode != Mode::Measuring);
        }
        pace(self.config.telemetry.snapshot_interval(), &self.interrupt)
    }

    /// 发送新的驱动振幅，超出安全上限时拒绝并返回 `false`
    pub fn update_amplitude(&mut self, amplitude: f64) -> Result<bool, SessionError> {
        let omega = self.omega.unwrap_or(0.0);
        let limit = self.config.telemetry.amplitude_limit;
        if omega * amplitude.abs() > limit {
            warn!("Amplitude {} rejected: omega * |amp| exceeds {}", amplitude, limit);
            return Ok(false);
        }

        // 相位始终是会话保存的初始值
        let message = format!("{},{}", amplitude.abs(), self.phase);
        self.transport.lock().send_line(&message)?;
        info!("Sent amplitude, phase: {}", message);

        let mut log = self.log.lock();
        log.metadata.amplitude = Some(amplitude.abs());
        log.metadata.phase = Some(self.phase);
        Ok(true)
    }

    // ==================== 握手辅助 ====================

    fn wait_for<R>(
        &self,
        timeout: Duration,
        accept: impl FnMut(&str) -> Option<R>,
    ) -> Result<Option<R>, SessionError> {
        await_line(&*self.transport, timeout, &self.interrupt, accept)
    }

    /// 向操作员索取握手数值，取消视为中断
    fn ask(&mut self, request: HandshakeRequest) -> Result<String, SessionError> {
        self.input
            .handshake_value(request)
            .map(|v| v.trim().to_string())
            .ok_or(SessionError::Interrupted)
    }

    /// 发送一行并等待以 `ack_prefix` 开头的确认，返回前缀之后的内容
    fn handshake(&mut self, message: &str, ack_prefix: &'static str) -> Result<Option<String>, SessionError> {
        self.transport.lock().send_line(message)?;
        let timeout = self.config.timing.stream_ack_timeout();
        self.wait_for(timeout, move |line| {
            line.strip_prefix(ack_prefix).map(|rest| rest.trim().to_string())
        })
    }

    /// 流式模式握手超时：结束并导出本次运行
    fn handshake_failed(&mut self, waiting_for: &'static str) -> Result<(), SessionError> {
        let error = SessionError::HandshakeTimeout {
            mode: self.mode,
            waiting_for,
        };
        warn!("{}, closing run", error);
        self.finish_run(RunEnd::HandshakeTimeout, true)
    }

    // ==================== 结束、导出与重连 ====================

    /// 结束当前运行：关闭传输、导出、部分复位、按重连方式重新打开
    pub(crate) fn finish_run(&mut self, end: RunEnd, terminate: bool) -> Result<(), SessionError> {
        let mode = self.mode;
        self.close_requested.store(true, Ordering::Release);
        self.close_transport(terminate);

        let report = self.export_run(mode, end);
        info!(
            "{} run ended ({:?}) with {} samples",
            mode, report.end, report.samples
        );
        self.last_run = Some(report);

        self.apply_reset(false);
        self.enter_mode(Mode::AwaitingCommand);
        self.reconnect_after_run()
    }

    /// 停止读取线程，可选发送 `Terminate`，关闭传输（已关闭时为空操作）
    pub fn close_transport(&mut self, terminate: bool) {
        if let Some(reader) = self.reader.take() {
            reader.stop(&self.close_requested, READER_STOP_TIMEOUT);
        }

        let mut transport = self.transport.lock();
        if !transport.is_open() {
            return;
        }
        if terminate && let Err(e) = transport.send_line(TERMINATE) {
            warn!("Failed to send terminate: {}", e);
        }
        if let Ok(lines) = transport.read_all() {
            for line in lines {
                trace!("Discarding buffered line: {}", line);
            }
        }
        transport.close();
        info!("Closed {}", transport.name());
    }

    fn export_run(&mut self, mode: Mode, end: RunEnd) -> RunReport {
        let mut snapshot = self.log.lock().clone();
        snapshot.metadata.mode = Some(mode);
        if let Some(centering) = self.centering {
            snapshot.metadata.set_centering(centering);
        }

        let subdir = self
            .export_subdir
            .clone()
            .unwrap_or_else(|| mode.name().to_string());
        let export = match self.exporter.export(&snapshot, &subdir) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Export of {} run failed: {:#}", mode, e);
                None
            },
        };

        RunReport {
            mode,
            parameters: snapshot.metadata.parameters,
            samples: snapshot.len(),
            acknowledged: self.sub.handshake_complete(mode),
            end,
            export,
        }
    }

    fn reconnect_after_run(&mut self) -> Result<(), SessionError> {
        match self.reconnect {
            ReconnectMode::Deferred => Ok(()),
            ReconnectMode::Automatic => self.reopen(),
            ReconnectMode::Manual => {
                if self.input.confirm_reconnect() {
                    self.reopen()
                } else {
                    info!("Session ended by operator");
                    self.ended = true;
                    Ok(())
                }
            },
        }
    }

    /// 传输已关闭时重新打开
    pub fn ensure_open(&mut self) -> Result<(), SessionError> {
        if self.is_open() {
            return Ok(());
        }
        self.reopen()
    }

    fn reopen(&mut self) -> Result<(), SessionError> {
        let attempts = self.config.timing.reconnect_attempts.max(1);
        for attempt in 1..=attempts {
            let result = self.transport.lock().open();
            match result {
                Ok(()) => {
                    debug!("Transport open (attempt {}/{})", attempt, attempts);
                    // 控制器在端口打开时复位
                    return pace(self.config.timing.open_settle(), &self.interrupt);
                },
                Err(e) => {
                    warn!("Open attempt {}/{} failed: {}", attempt, attempts, e);
                    if attempt < attempts {
                        pace(self.config.timing.reconnect_delay(), &self.interrupt)?;
                    }
                },
            }
        }

        error!("Giving up after {} failed open attempts", attempts);
        self.ended = true;
        Err(SessionError::ReconnectExhausted { attempts })
    }

    /// 按模式处理操作员中断
    ///
    /// 命令、复位、居中：不导出直接重连；测量：导出；其它流式模式：发送 `Terminate` 并导出。
    pub(crate) fn handle_interrupt(&mut self) -> Result<(), SessionError> {
        let mode = self.mode;
        info!("Interrupted in {} mode", mode);
        match mode {
            Mode::AwaitingCommand | Mode::Resetting | Mode::Centering => {
                self.close_requested.store(true, Ordering::Release);
                self.close_transport(false);
                self.apply_reset(false);
                self.enter_mode(Mode::AwaitingCommand);
                self.reconnect_after_run()
            },
            Mode::Measuring => self.finish_run(RunEnd::Interrupted, false),
            Mode::RunningPid | Mode::SettingSpeed | Mode::RunningResonance | Mode::ScanningFrequency => {
                self.finish_run(RunEnd::Interrupted, true)
            },
        }
    }

    /// 致命错误：尽力导出流式运行的数据并关闭传输
    pub(crate) fn abort(&mut self) {
        if self.ended && !self.is_open() && self.reader.is_none() {
            return;
        }
        let mode = self.mode;
        self.close_requested.store(true, Ordering::Release);
        self.close_transport(false);
        if mode.is_streaming() {
            let report = self.export_run(mode, RunEnd::TransportFailed);
            self.last_run = Some(report);
        }
        self.ended = true;
    }

    // ==================== 自动试验使用的步骤 ====================

    /// 完全复位：清空接收缓冲区、子状态、数据日志与居中结果
    pub fn full_reset(&mut self) -> Result<(), SessionError> {
        self.transport.lock().clear_input()?;
        self.apply_reset(true);
        self.enter_mode(Mode::AwaitingCommand);
        Ok(())
    }

    pub fn send_command(&mut self, token: CommandToken) -> Result<(), SessionError> {
        self.send_line(&token.to_string())
    }

    pub fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        self.transport.lock().send_line(line)?;
        debug!("Sent {:?}", line);
        Ok(())
    }

    /// 进入居中模式并等待结果（超时为致命错误）
    pub fn center(&mut self) -> Result<CenteringResult, SessionError> {
        self.enter_mode(Mode::Centering);
        self.run_centering()
    }

    /// 等待 PID 参数提示
    pub fn await_pid_prompt(&mut self) -> Result<bool, SessionError> {
        let timeout = self.config.timing.prompt_timeout();
        Ok(self.wait_for(timeout, |l| is_pid_prompt(l).then_some(()))?.is_some())
    }

    /// 以给定参数开始一次 PID 运行
    pub fn start_pid(&mut self, parameters: ParameterSet, prompt_seen: bool) {
        self.parameters = parameters;
        self.begin_run(Mode::RunningPid);
        self.sub.pid.prompt_seen = prompt_seen;
    }

    /// 可中断的休眠
    pub fn rest(&self, duration: Duration) -> Result<(), SessionError> {
        pace(duration, &self.interrupt)
    }
}

impl<T: Transport + 'static> Drop for Session<T> {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.stop(&self.close_requested, READER_STOP_TIMEOUT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pendulum_serial::MockTransport;

    fn quick_config() -> SessionConfig {
        let mut config = SessionConfig::default();
        config.timing.handshake_delay_ms = 1;
        config.timing.open_settle_ms = 0;
        config.timing.reconnect_delay_ms = 0;
        config.timing.centering_timeout_secs = 0.05;
        config.timing.prompt_timeout_secs = 0.05;
        config.timing.ack_timeout_secs = 0.05;
        config.timing.stream_ack_timeout_secs = 0.05;
        config.telemetry.snapshot_interval_ms = 1;
        config
    }

    fn session(mock: &MockTransport, dir: &std::path::Path) -> Session<MockTransport> {
        let mut session = Session::new(mock.clone(), quick_config())
            .with_exporter(CsvExporter::new(dir))
            .with_reconnect(ReconnectMode::Deferred);
        session.ensure_open().unwrap();
        session
    }

    #[test]
    fn test_dispatch_begin_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockTransport::new();
        let mut session = session(&mock, dir.path());

        session.dispatch(&["DEBUG Beginning centring.".to_string()]);
        assert_eq!(session.mode(), Mode::AwaitingCommand);

        session.dispatch(&["Beginning the frequency scan.".to_string()]);
        assert_eq!(session.mode(), Mode::ScanningFrequency);

        session.mode = Mode::AwaitingCommand;
        session.dispatch(&[
            "Beginning PID control.".to_string(),
            "Hasn't been centred. Please centre the cart first.".to_string(),
        ]);
        assert_eq!(session.mode(), Mode::Resetting);
    }

    #[test]
    fn test_prompt_in_begin_batch_counts_as_seen() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockTransport::new();
        let mut session = session(&mock, dir.path());
        session.dispatch(&[
            "Beginning PID control.".to_string(),
            "Resume (ENTER r) or ENTER six numbers split by commas without spaces".to_string(),
        ]);
        assert_eq!(session.mode(), Mode::RunningPid);
        assert!(session.sub_state().pid.prompt_seen);
    }

    #[test]
    fn test_amplitude_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockTransport::new();
        let mut session = session(&mock, dir.path());
        session.omega = Some(400.0);

        assert!(!session.update_amplitude(-6.0).unwrap());
        assert!(mock.sent().is_empty());

        assert!(session.update_amplitude(-5.0).unwrap());
        assert_eq!(mock.sent(), vec!["5,0".to_string()]);
        let log = session.log_snapshot();
        assert_eq!(log.metadata.amplitude, Some(5.0));
        assert_eq!(log.metadata.phase, Some(0.0));
    }

    #[test]
    fn test_full_reset_clears_centering() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockTransport::new();
        let mut session = session(&mock, dir.path());
        session.centering = Some(CenteringResult {
            center_count: 1,
            distance: 2,
        });

        session.apply_reset(false);
        assert!(session.centering().is_some());

        session.full_reset().unwrap();
        assert_eq!(session.centering(), None);
        assert_eq!(mock.clear_count(), 1);
    }

    #[test]
    fn test_handshake_complete() {
        let mut sub = SubState::default();
        assert!(!sub.handshake_complete(Mode::RunningPid));
        assert!(sub.handshake_complete(Mode::Measuring));
        sub.speed.speed_acknowledged = true;
        assert!(!sub.handshake_complete(Mode::SettingSpeed));
        sub.speed.amplitude_acknowledged = true;
        assert!(sub.handshake_complete(Mode::SettingSpeed));
    }
}
