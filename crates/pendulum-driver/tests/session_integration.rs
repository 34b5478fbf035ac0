//! Session 端到端集成测试
//!
//! 使用 MockTransport 编排设备输出，验证命令分类、握手、遥测读取与导出流程。

mod common;

use common::*;
use pendulum_driver::{ReconnectMode, RunEnd, ScriptedInput, Session, SessionError};
use pendulum_protocol::{CenteringResult, CommandToken, Mode, ParameterSet, Sample};
use pendulum_serial::{MockTransport, Transport};
use pendulum_tools::{AckPolicy, TrialRecording};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn test_centre_then_pid_run_exports_on_kill_switch() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockTransport::new();
    mock.respond_to("1", &["Beginning centring.", PAUSE, "12,340"]);
    mock.respond_to("4", &["Beginning PID control.", PAUSE, PROMPT]);
    mock.respond_to(
        DEFAULT_WIRE,
        &[ACK, PAUSE, "0.0,0,0,0,0", "0.2,-0.0077,19.0,-0.537,461.4", KILL],
    );

    let input = ScriptedInput::new()
        .with_command(CommandToken::CENTRE)
        .with_command(CommandToken::PID)
        .with_reconnect(false);
    let mut session = Session::new(mock.clone(), quick_config(dir.path())).with_input(input);

    session.run().unwrap();

    assert!(session.is_ended());
    assert!(!mock.is_open());
    assert_eq!(mock.sent(), vec!["1", "4", DEFAULT_WIRE, "Terminate"]);
    assert_eq!(
        session.centering(),
        Some(CenteringResult {
            center_count: 12,
            distance: 340
        })
    );

    let report = session.last_run().unwrap();
    assert_eq!(report.mode, Mode::RunningPid);
    assert_eq!(report.end, RunEnd::EmergencyStop);
    assert!(report.acknowledged);
    assert_eq!(report.samples, 2);

    let path = report.export.clone().unwrap();
    assert!(path.starts_with(dir.path().join("pid")));
    let recording = TrialRecording::load(&path).unwrap();
    assert_eq!(recording.metadata.parameters, Some(ParameterSet::default()));
    assert_eq!(recording.metadata.center_count, Some(12));
    assert_eq!(recording.metadata.distance, Some(340));
    assert_eq!(
        recording.samples,
        vec![
            Sample::full(0.0, 0.0, 0.0, 0.0, 0.0),
            Sample::full(0.2, -0.0077, 19.0, -0.537, 461.4)
        ]
    );
}

#[test]
fn test_ack_timeout_abandons_run() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockTransport::new();
    let mut session = Session::new(mock.clone(), quick_config(dir.path()))
        .with_reconnect(ReconnectMode::Deferred);
    session.ensure_open().unwrap();
    session.start_pid(ParameterSet::default(), true);

    session.tick().unwrap();

    assert_eq!(session.mode(), Mode::AwaitingCommand);
    assert_eq!(mock.sent(), vec![DEFAULT_WIRE, "Terminate"]);
    assert!(!mock.is_open());

    let report = session.last_run().unwrap();
    assert_eq!(report.end, RunEnd::HandshakeTimeout);
    assert!(!report.acknowledged);
    assert_eq!(report.samples, 0);
    assert!(report.export.is_some());
}

#[test]
fn test_ack_retry_never_resends_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockTransport::new();
    let mut session = Session::new(mock.clone(), quick_config(dir.path()));
    session.set_ack_policy(AckPolicy::Retry);
    session.ensure_open().unwrap();
    session.start_pid(ParameterSet::default(), true);

    for _ in 0..3 {
        session.tick().unwrap();
        assert_eq!(session.mode(), Mode::RunningPid);
        assert!(!session.sub_state().pid.acknowledged);
    }
    assert_eq!(mock.sent(), vec![DEFAULT_WIRE]);

    mock.push_lines([ACK]);
    session.tick().unwrap();
    assert!(session.sub_state().pid.acknowledged);
    assert!(session.sub_state().pid.started_at.is_some());
    assert_eq!(mock.sent(), vec![DEFAULT_WIRE]);
}

#[test]
fn test_prompt_timeout_closes_run() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockTransport::new();
    let mut session = Session::new(mock.clone(), quick_config(dir.path()))
        .with_reconnect(ReconnectMode::Automatic);
    session.ensure_open().unwrap();
    session.start_pid(ParameterSet::default(), false);

    session.tick().unwrap();

    // 没有提示就不发送参数
    assert_eq!(mock.sent(), vec!["Terminate"]);
    assert_eq!(session.last_run().unwrap().end, RunEnd::HandshakeTimeout);
    // 自动重连
    assert!(mock.is_open());
    assert_eq!(mock.open_count(), 2);
}

#[test]
fn test_trial_ceiling_ends_run() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockTransport::new();
    mock.respond_to(DEFAULT_WIRE, &[ACK, PAUSE, "0.0,0,0,0,0"]);
    let mut session = Session::new(mock.clone(), quick_config(dir.path()))
        .with_reconnect(ReconnectMode::Deferred);
    session.set_trial_ceiling(Some(Duration::from_millis(30)));
    session.ensure_open().unwrap();
    session.start_pid(ParameterSet::default(), true);

    while session.mode() == Mode::RunningPid {
        session.tick().unwrap();
    }

    let report = session.last_run().unwrap();
    assert_eq!(report.end, RunEnd::DurationElapsed);
    assert_eq!(mock.sent().last().map(String::as_str), Some("Terminate"));
}

#[test]
fn test_centering_timeout_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockTransport::new();
    mock.respond_to("1", &["Beginning centring."]);

    let input = ScriptedInput::new().with_command(CommandToken::CENTRE);
    let mut session = Session::new(mock.clone(), quick_config(dir.path())).with_input(input);

    let result = session.run();

    assert!(matches!(result, Err(SessionError::CenteringTimeout(_))));
    assert!(!mock.is_open());
    assert!(session.is_ended());
    assert_eq!(session.centering(), None);
}

#[test]
fn test_reset_phrase_clears_input() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockTransport::new();
    let mut session = Session::new(mock.clone(), quick_config(dir.path()));
    session.ensure_open().unwrap();
    mock.push_lines([PAUSE, "Beginning centring.", "Resetting..."]);

    session.tick().unwrap();
    assert_eq!(session.mode(), Mode::Resetting);

    session.tick().unwrap();
    assert_eq!(session.mode(), Mode::AwaitingCommand);
    assert_eq!(mock.clear_count(), 1);
}

#[test]
fn test_debug_lines_never_change_mode() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockTransport::new();
    let mut session = Session::new(mock.clone(), quick_config(dir.path()));
    session.ensure_open().unwrap();
    mock.push_lines([PAUSE, "DEBUG Beginning centring.", "DEBUG Resetting..."]);

    session.tick().unwrap();
    assert_eq!(session.mode(), Mode::AwaitingCommand);
}

#[test]
fn test_malformed_line_is_dropped_and_interrupt_exports() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockTransport::new();
    let input = ScriptedInput::new().with_reconnect(false);
    let mut session = Session::new(mock.clone(), quick_config(dir.path())).with_input(input);
    session.ensure_open().unwrap();
    mock.push_lines([PAUSE, "Beginning measuring the natural frequency and quality factor."]);

    session.tick().unwrap();
    assert_eq!(session.mode(), Mode::Measuring);

    mock.push_lines(["abc"]);
    session.tick().unwrap();
    assert!(wait_until(|| mock.clear_count() == 1));
    assert!(session.log_snapshot().is_empty());
    assert!(!session.close_requested());

    mock.push_lines(["0.5,0.25"]);
    assert!(wait_until(|| session.log_snapshot().len() == 1));

    session.interrupt_flag().store(true, Ordering::Release);
    session.run().unwrap();

    assert!(!mock.sent().iter().any(|l| l == "Terminate"));
    let report = session.last_run().unwrap();
    assert_eq!(report.mode, Mode::Measuring);
    assert_eq!(report.end, RunEnd::Interrupted);
    assert_eq!(report.samples, 1);

    let recording = TrialRecording::load(report.export.as_ref().unwrap()).unwrap();
    assert_eq!(recording.samples, vec![Sample::new(0.0, 0.25)]);
}

#[test]
fn test_set_speed_handshakes_and_amplitude_update() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockTransport::new();
    mock.push_lines([PAUSE, "Beginning setting the speed and acceleration."]);
    mock.respond_to("100,200", &["Start sinusoidal motion with 100,200"]);
    mock.respond_to("5", &["Starting with amplitude: 5", PAUSE, "0.0,0,0,0,0", "0.1,0,1,0,2"]);
    mock.respond_to("3,0", &[KILL]);

    let input = ScriptedInput::new()
        .with_value("100,200")
        .with_value("5")
        .with_amplitude(3.0)
        .with_reconnect(false);
    let mut session = Session::new(mock.clone(), quick_config(dir.path())).with_input(input);

    session.run().unwrap();

    assert_eq!(mock.sent(), vec!["100,200", "5", "3,0", "Terminate"]);
    let report = session.last_run().unwrap();
    assert_eq!(report.mode, Mode::SettingSpeed);
    assert_eq!(report.end, RunEnd::EmergencyStop);
    assert!(report.acknowledged);

    let recording = TrialRecording::load(report.export.as_ref().unwrap()).unwrap();
    assert_eq!(recording.metadata.set_speed_param.as_deref(), Some("100,200"));
    assert_eq!(recording.metadata.amp_0, Some(5.0));
    assert_eq!(recording.metadata.amplitude, Some(3.0));
    assert_eq!(recording.metadata.phase, Some(0.0));
    assert_eq!(recording.samples.len(), 2);
}

#[test]
fn test_resonance_rejects_unsafe_amplitude() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockTransport::new();
    mock.push_lines([PAUSE, "Beginning the normalised resonance."]);
    mock.respond_to("400", &["Start normalised resonance", PAUSE, "0.0,0,0,0,0", KILL]);

    let input = ScriptedInput::new()
        .with_value("400")
        .with_amplitude(6.0)
        .with_reconnect(false);
    let mut session = Session::new(mock.clone(), quick_config(dir.path())).with_input(input);

    session.run().unwrap();

    // 400 * 6 > 2000，振幅未发送
    assert_eq!(mock.sent(), vec!["400", "Terminate"]);
    let recording = TrialRecording::load(session.last_run().unwrap().export.as_ref().unwrap()).unwrap();
    assert_eq!(recording.metadata.omega, Some(400.0));
    assert_eq!(recording.metadata.amplitude, None);
}

#[test]
fn test_reconnect_exhausted_terminates_session() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockTransport::new();
    let mut session = Session::new(mock.clone(), quick_config(dir.path()))
        .with_reconnect(ReconnectMode::Automatic);
    session.ensure_open().unwrap();
    mock.fail_next_opens(10);
    mock.push_lines([
        PAUSE,
        "Beginning measuring the natural frequency and quality factor.",
        PAUSE,
        "0.0,0.1",
        "1.0,0.2",
        KILL,
    ]);

    let result = session.run();

    assert!(matches!(result, Err(SessionError::ReconnectExhausted { attempts: 2 })));
    assert!(session.is_ended());
    let report = session.last_run().unwrap();
    assert_eq!(report.end, RunEnd::EmergencyStop);
    assert_eq!(report.samples, 2);
}

#[test]
fn test_transport_failure_escalates_after_export() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockTransport::new();
    mock.respond_to(DEFAULT_WIRE, &[ACK, PAUSE, "0.0,0,0,0,0"]);
    let mut session = Session::new(mock.clone(), quick_config(dir.path()));
    session.ensure_open().unwrap();
    session.start_pid(ParameterSet::default(), true);

    session.tick().unwrap();
    assert!(wait_until(|| session.log_snapshot().len() == 1));
    mock.set_disconnected(true);

    let result = session.run();

    assert!(matches!(result, Err(SessionError::Transport(_))));
    assert!(session.is_ended());
    let report = session.last_run().unwrap();
    assert_eq!(report.end, RunEnd::TransportFailed);
    assert_eq!(report.samples, 1);
    assert!(report.export.is_some());
}
