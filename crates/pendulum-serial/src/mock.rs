//! Mock 传输（测试用）
//!
//! 所有克隆共享同一份状态，测试代码保留一个句柄用于注入设备输出和检查发送记录，
//! 另一个句柄交给会话使用。
//!
//! 设备输出以队列表示，[`MockTransport::PAUSE`] 标记“此刻之后的数据尚未到达”：
//! `read_all` 和 `clear_input` 只作用到下一个暂停标记为止，
//! `read_line` 遇到暂停标记时等待一个读超时并返回 `None`。

use crate::{Transport, TransportError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum Inbound {
    Line(String),
    Pause,
}

impl From<&str> for Inbound {
    fn from(line: &str) -> Self {
        if line == MockTransport::PAUSE {
            Inbound::Pause
        } else {
            Inbound::Line(line.to_string())
        }
    }
}

#[derive(Debug)]
struct Rule {
    trigger: String,
    replies: Vec<Inbound>,
    once: bool,
}

#[derive(Debug, Default)]
struct MockState {
    open: bool,
    inbound: VecDeque<Inbound>,
    sent: Vec<String>,
    rules: Vec<Rule>,
    open_count: usize,
    close_count: usize,
    clear_count: usize,
    failing_opens: usize,
    disconnected: bool,
}

/// 内存传输
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    read_timeout: Duration,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// 暂停标记
    pub const PAUSE: &'static str = "<pause>";

    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            read_timeout: Duration::from_millis(2),
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// 追加设备输出
    pub fn push_lines<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.lock();
        state.inbound.extend(lines.into_iter().map(|l| Inbound::from(l.as_ref())));
    }

    /// 每次发送 `trigger` 时追加 `replies`
    pub fn respond_to(&self, trigger: &str, replies: &[&str]) {
        self.add_rule(trigger, replies, false);
    }

    /// 仅在下一次发送 `trigger` 时追加 `replies`（优先于 `respond_to`）
    pub fn respond_once(&self, trigger: &str, replies: &[&str]) {
        self.add_rule(trigger, replies, true);
    }

    fn add_rule(&self, trigger: &str, replies: &[&str], once: bool) {
        self.state.lock().rules.push(Rule {
            trigger: trigger.to_string(),
            replies: replies.iter().map(|r| Inbound::from(*r)).collect(),
            once,
        });
    }

    /// 接下来的 `n` 次 `open` 失败
    pub fn fail_next_opens(&self, n: usize) {
        self.state.lock().failing_opens = n;
    }

    /// 模拟设备断开：收发都返回错误
    pub fn set_disconnected(&self, disconnected: bool) {
        self.state.lock().disconnected = disconnected;
    }

    /// 已发送的行（不含换行符）
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().open_count
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().close_count
    }

    pub fn clear_count(&self) -> usize {
        self.state.lock().clear_count
    }

    /// 尚未被读取的设备输出行数（不计暂停标记）
    pub fn pending_lines(&self) -> usize {
        self.state
            .lock()
            .inbound
            .iter()
            .filter(|i| matches!(i, Inbound::Line(_)))
            .count()
    }

    fn check_usable(state: &MockState) -> Result<(), TransportError> {
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if state.disconnected {
            return Err(TransportError::Disconnected("mock".to_string()));
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.open {
            return Ok(());
        }
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(TransportError::Port("mock open failure".to_string()));
        }
        state.open = true;
        state.disconnected = false;
        state.open_count += 1;
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        if state.open {
            state.open = false;
            state.close_count += 1;
        }
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        Self::check_usable(&state)?;
        state.sent.push(line.to_string());

        let replies = if let Some(idx) = state.rules.iter().position(|r| r.once && r.trigger == line) {
            Some(state.rules.remove(idx).replies)
        } else {
            state
                .rules
                .iter()
                .find(|r| !r.once && r.trigger == line)
                .map(|r| r.replies.clone())
        };
        if let Some(replies) = replies {
            state.inbound.extend(replies);
        }
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        {
            let mut state = self.state.lock();
            Self::check_usable(&state)?;
            if let Some(Inbound::Line(line)) = state.inbound.pop_front() {
                return Ok(Some(line));
            }
        }
        std::thread::sleep(self.read_timeout);
        Ok(None)
    }

    fn read_all(&mut self) -> Result<Vec<String>, TransportError> {
        let mut state = self.state.lock();
        Self::check_usable(&state)?;
        let mut lines = Vec::new();
        while let Some(item) = state.inbound.pop_front() {
            match item {
                Inbound::Line(line) => lines.push(line),
                Inbound::Pause => break,
            }
        }
        Ok(lines)
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        Self::check_usable(&state)?;
        state.clear_count += 1;
        while let Some(Inbound::Line(_)) = state.inbound.front() {
            state.inbound.pop_front();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened() -> MockTransport {
        let mut mock = MockTransport::new();
        mock.open().unwrap();
        mock
    }

    #[test]
    fn test_respond_to_send() {
        let mut mock = opened();
        mock.respond_to("1", &["Beginning centring.", MockTransport::PAUSE, "12,340"]);

        assert!(mock.read_all().unwrap().is_empty());
        mock.send_line("1").unwrap();
        assert_eq!(mock.read_all().unwrap(), vec!["Beginning centring.".to_string()]);
        assert_eq!(mock.read_line().unwrap().as_deref(), Some("12,340"));
        assert_eq!(mock.read_line().unwrap(), None);
        assert_eq!(mock.sent(), vec!["1".to_string()]);
    }

    #[test]
    fn test_respond_once_takes_priority() {
        let mut mock = opened();
        mock.respond_to("4", &["b"]);
        mock.respond_once("4", &["a"]);
        mock.send_line("4").unwrap();
        mock.send_line("4").unwrap();
        assert_eq!(mock.read_all().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_clear_stops_at_pause() {
        let mut mock = opened();
        mock.push_lines(["abc", "def", MockTransport::PAUSE, "later"]);
        mock.clear_input().unwrap();
        assert_eq!(mock.clear_count(), 1);
        assert_eq!(mock.read_line().unwrap(), None);
        assert_eq!(mock.read_line().unwrap().as_deref(), Some("later"));
    }

    #[test]
    fn test_closed_and_failures() {
        let mut mock = MockTransport::new();
        assert!(matches!(mock.read_line(), Err(TransportError::NotOpen)));

        mock.fail_next_opens(1);
        assert!(mock.open().is_err());
        assert!(mock.open().is_ok());
        assert_eq!(mock.open_count(), 1);

        mock.set_disconnected(true);
        assert!(matches!(mock.send_line("1"), Err(TransportError::Disconnected(_))));

        mock.close();
        mock.close();
        assert_eq!(mock.close_count(), 1);
        assert!(!mock.is_open());
    }
}
