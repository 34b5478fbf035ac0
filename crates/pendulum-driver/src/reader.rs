//! 遥测读取线程
//!
//! 流式运行期间唯一的数据日志写入者。循环在 `close` 变为 true 后的一个读超时内退出。
//!
//! - 急停短语：设置 `close` 并退出，不追加采样
//! - 调试行：丢弃
//! - 无法解析的行：丢弃并清空接收缓冲区，不影响 `close`

use crate::error::SessionError;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use pendulum_protocol::{DataLog, Sample, SampleLayout, is_debug_line, is_kill_switch};
use pendulum_serial::Transport;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, trace, warn};

/// 读取线程退出原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    /// 设备报告急停
    EmergencyStop,
    /// 会话请求结束
    CloseRequested,
    /// 端口不可用
    TransportFailed(String),
}

/// 读取线程主循环
///
/// # 参数
/// - `transport`: 与会话共享的传输（每次只锁一行）
/// - `log`: 数据日志
/// - `close`: 结束标志（与会话联动）
/// - `layout`: 当前模式的字段布局
/// - `time_scale`: 设备时间到秒的换算
pub fn reader_loop<T: Transport + ?Sized>(
    transport: &Mutex<T>,
    log: &Mutex<DataLog>,
    close: &AtomicBool,
    layout: SampleLayout,
    time_scale: f64,
) -> ReaderExit {
    loop {
        // Acquire: 看到 true 时必须能看到会话在此之前的所有写入
        if close.load(Ordering::Acquire) {
            trace!("Telemetry reader: close requested, exiting");
            return ReaderExit::CloseRequested;
        }

        let line = match transport.lock().read_line() {
            Ok(Some(line)) => line,
            Ok(None) => continue,
            Err(e) if !e.is_fatal() => continue,
            Err(e) => {
                error!("Telemetry reader: transport failed: {}", e);
                close.store(true, Ordering::Release);
                return ReaderExit::TransportFailed(e.to_string());
            },
        };

        if is_kill_switch(&line) {
            warn!("Kill switch hit, closing run");
            close.store(true, Ordering::Release);
            return ReaderExit::EmergencyStop;
        }
        if is_debug_line(&line) {
            trace!("Discarding debug line: {}", line);
            continue;
        }

        match Sample::parse(&line, layout, time_scale) {
            Ok(sample) => log.lock().push(sample),
            Err(e) => {
                trace!("Dropping telemetry line {:?}: {}", line, e);
                if let Err(e) = transport.lock().clear_input()
                    && e.is_fatal()
                {
                    error!("Telemetry reader: failed to clear input: {}", e);
                    close.store(true, Ordering::Release);
                    return ReaderExit::TransportFailed(e.to_string());
                }
            },
        }
    }
}

/// 正在运行的读取线程
#[derive(Debug)]
pub struct TelemetryReader {
    handle: Option<JoinHandle<()>>,
    exit_rx: Receiver<ReaderExit>,
    exit: Option<ReaderExit>,
}

impl TelemetryReader {
    /// 启动读取线程
    pub fn spawn<T: Transport + 'static>(
        transport: Arc<Mutex<T>>,
        log: Arc<Mutex<DataLog>>,
        close: Arc<AtomicBool>,
        layout: SampleLayout,
        time_scale: f64,
    ) -> Result<Self, SessionError> {
        let (exit_tx, exit_rx) = crossbeam_channel::bounded(1);
        let handle = thread::Builder::new()
            .name("telemetry-reader".to_string())
            .spawn(move || {
                let exit = reader_loop(&*transport, &log, &close, layout, time_scale);
                // 接收端可能已经放弃等待
                let _ = exit_tx.send(exit);
            })
            .map_err(|e| SessionError::ReaderThread(e.to_string()))?;

        Ok(Self {
            handle: Some(handle),
            exit_rx,
            exit: None,
        })
    }

    /// 非阻塞查询退出原因，线程仍在运行时返回 `None`
    pub fn poll_exit(&mut self) -> Option<ReaderExit> {
        if self.exit.is_none() {
            self.exit = self.exit_rx.try_recv().ok();
        }
        self.exit.clone()
    }

    /// 请求退出并等待线程结束
    ///
    /// 超时后线程被分离，返回 `None`。
    pub fn stop(mut self, close: &AtomicBool, timeout: Duration) -> Option<ReaderExit> {
        // Release: 读取线程看到 true 时能看到此前的所有写入
        close.store(true, Ordering::Release);

        if self.exit.is_none() {
            match self.exit_rx.recv_timeout(timeout) {
                Ok(exit) => self.exit = Some(exit),
                Err(RecvTimeoutError::Timeout) => {
                    error!("Telemetry reader failed to stop within {:?}", timeout);
                    return None;
                },
                Err(RecvTimeoutError::Disconnected) => {},
            }
        }

        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("Telemetry reader panicked");
        }
        self.exit
    }
}
