//! 终端交互
//!
//! `ConsoleInput` 用 inquire 提示命令令牌、握手数值和重连确认；
//! `PrintSink` 周期性打印最新采样。
//!
//! 运行中的振幅更新从一个文件读取：终端在运行结束时还要提示重连，
//! 后台读取 stdin 会和提示抢输入。

use inquire::InquireError;
use pendulum_driver::{HandshakeRequest, OperatorInput, SnapshotSink};
use pendulum_protocol::{CommandToken, DataLog, Mode, parse_decimal};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};
use tracing::warn;

/// 命令提示中的输入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEntry {
    /// 只读取设备输出
    Poll,
    Send(CommandToken),
    Quit,
}

impl CommandEntry {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "" => Some(CommandEntry::Poll),
            "q" | "quit" | "exit" => Some(CommandEntry::Quit),
            other => other.parse().ok().map(CommandEntry::Send),
        }
    }
}

/// 终端操作员
pub struct ConsoleInput {
    interrupt: Arc<AtomicBool>,
    quit: bool,
    amplitude_file: Option<PathBuf>,
    amplitude_seen: Option<SystemTime>,
}

impl ConsoleInput {
    pub fn new(interrupt: Arc<AtomicBool>) -> Self {
        Self {
            interrupt,
            quit: false,
            amplitude_file: None,
            amplitude_seen: None,
        }
    }

    /// 运行中监视振幅文件，文件每次修改后读取其中的数值
    pub fn with_amplitude_file(mut self, path: Option<PathBuf>) -> Self {
        self.amplitude_file = path;
        self
    }

    /// 结束会话：中断当前等待，并在重连确认时拒绝
    fn request_quit(&mut self) {
        self.quit = true;
        self.interrupt.store(true, Ordering::Release);
    }
}

impl OperatorInput for ConsoleInput {
    fn command(&mut self) -> Option<CommandToken> {
        if self.quit {
            return None;
        }
        let answer = inquire::Text::new("Command:")
            .with_help_message("digit to send, ENTER to read the device, q to quit")
            .prompt();

        match answer {
            Ok(text) => match CommandEntry::parse(&text) {
                Some(CommandEntry::Send(token)) => Some(token),
                Some(CommandEntry::Poll) => None,
                Some(CommandEntry::Quit) => {
                    self.request_quit();
                    None
                },
                None => {
                    println!("❌ 无效命令: {:?}", text);
                    None
                },
            },
            Err(InquireError::OperationCanceled) => None,
            Err(InquireError::OperationInterrupted) => {
                self.request_quit();
                None
            },
            Err(e) => {
                warn!("Prompt failed: {}", e);
                self.request_quit();
                None
            },
        }
    }

    fn handshake_value(&mut self, request: HandshakeRequest) -> Option<String> {
        match inquire::Text::new(&format!("{}:", request.prompt())).prompt() {
            Ok(value) => Some(value.trim().to_string()),
            Err(InquireError::OperationCanceled) => None,
            Err(e) => {
                if !matches!(e, InquireError::OperationInterrupted) {
                    warn!("Prompt failed: {}", e);
                }
                self.request_quit();
                None
            },
        }
    }

    fn poll_amplitude(&mut self) -> Option<f64> {
        let path = self.amplitude_file.as_ref()?;
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
        if self.amplitude_seen == Some(modified) {
            return None;
        }
        self.amplitude_seen = Some(modified);

        let text = fs::read_to_string(path).ok()?;
        match parse_decimal("amplitude", &text) {
            Ok(amplitude) => Some(amplitude),
            Err(e) => {
                println!("❌ 振幅文件内容无效: {}", e);
                None
            },
        }
    }

    fn confirm_reconnect(&mut self) -> bool {
        if self.quit {
            return false;
        }
        inquire::Confirm::new("Reconnect and start another run?")
            .with_default(true)
            .prompt()
            .unwrap_or(false)
    }
}

/// 打印最新采样（限速）
pub struct PrintSink {
    interval: Duration,
    last_print: Option<Instant>,
    printed: usize,
}

impl PrintSink {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_print: None,
            printed: 0,
        }
    }
}

impl SnapshotSink for PrintSink {
    fn snapshot(&mut self, mode: Mode, log: &DataLog) {
        if log.len() == self.printed {
            return;
        }
        if self.last_print.is_some_and(|t| t.elapsed() < self.interval) {
            return;
        }
        // 新运行的日志从零开始
        if log.len() < self.printed {
            self.printed = 0;
        }
        if let Some(sample) = log.latest() {
            let cells: Vec<String> = sample
                .fields()
                .iter()
                .flatten()
                .map(|v| format!("{:.4}", v))
                .collect();
            println!("[{}] {:>6} samples  {}", mode, log.len(), cells.join("  "));
        }
        self.printed = log.len();
        self.last_print = Some(Instant::now());
    }
}
