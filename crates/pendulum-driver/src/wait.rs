//! 有界等待原语
//!
//! 所有握手都通过 [`await_line`] 实现，所有协议步骤之间的延时都通过 [`pace`] 实现。
//! 二者都会轮询中断标志，中断时返回 [`SessionError::Interrupted`]。

use crate::error::SessionError;
use parking_lot::Mutex;
use pendulum_protocol::is_debug_line;
use pendulum_serial::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::trace;

/// 延时的轮询粒度
const PACE_SLICE: Duration = Duration::from_millis(20);

/// 逐行读取，直到 `accept` 接受某一行或超时
///
/// 调试行在交给 `accept` 之前丢弃。超时返回 `Ok(None)`。
/// 每次读取只持有传输锁一个读超时。
pub fn await_line<T, R, F>(
    transport: &Mutex<T>,
    timeout: Duration,
    interrupt: &AtomicBool,
    mut accept: F,
) -> Result<Option<R>, SessionError>
where
    T: Transport + ?Sized,
    F: FnMut(&str) -> Option<R>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if interrupt.load(Ordering::Acquire) {
            return Err(SessionError::Interrupted);
        }

        let line = transport.lock().read_line();
        match line {
            Ok(Some(line)) if is_debug_line(&line) => trace!("Discarding debug line: {}", line),
            Ok(Some(line)) => {
                if let Some(value) = accept(&line) {
                    return Ok(Some(value));
                }
                trace!("Ignoring line while waiting: {:?}", line);
            },
            Ok(None) => {},
            Err(e) if !e.is_fatal() => {},
            Err(e) => return Err(e.into()),
        }

        if Instant::now() >= deadline {
            return Ok(None);
        }
    }
}

/// 可中断的延时
pub fn pace(duration: Duration, interrupt: &AtomicBool) -> Result<(), SessionError> {
    let deadline = Instant::now() + duration;
    loop {
        if interrupt.load(Ordering::Acquire) {
            return Err(SessionError::Interrupted);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        thread::sleep((deadline - now).min(PACE_SLICE));
    }
}
