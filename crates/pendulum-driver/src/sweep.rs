//! # 自动试验
//!
//! 按运行计划逐组执行 PID 试验：
//!
//! 1. 确保端口打开，完全复位
//! 2. 发送 `1` 并等待居中结果（超时为致命错误）
//! 3. 稳定后发送 `4`，等待参数提示（失败则结束并跳过本组）
//! 4. 发送回车，进入 PID 运行并调度到运行结束（导出到 `pid_set_<n>/`）
//! 5. 试验间隔；工作时长达到上限后发送 `Terminate`、关闭端口并冷却

use crate::error::SessionError;
use crate::plan::RunPlan;
use crate::session::{ReconnectMode, RunEnd, Session};
use pendulum_protocol::{CommandToken, Mode, ParameterSet};
use pendulum_serial::Transport;
use pendulum_tools::AckPolicy;
use std::fmt;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{error, info, warn};

/// 单组试验的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialOutcome {
    /// 运行完成并导出
    Completed,
    /// 没有收到参数提示，未发送参数
    Skipped,
    /// 参数未被确认
    Abandoned,
    /// 操作员中断（已导出）
    Interrupted,
}

/// 汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub completed: usize,
    pub skipped: usize,
    pub abandoned: usize,
    pub interrupted: bool,
}

impl SweepSummary {
    fn record(&mut self, outcome: TrialOutcome) {
        match outcome {
            TrialOutcome::Completed => self.completed += 1,
            TrialOutcome::Skipped => self.skipped += 1,
            TrialOutcome::Abandoned => self.abandoned += 1,
            TrialOutcome::Interrupted => self.interrupted = true,
        }
    }

    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.abandoned
    }
}

impl fmt::Display for SweepSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} trials: {} completed, {} skipped, {} abandoned{}",
            self.total(),
            self.completed,
            self.skipped,
            self.abandoned,
            if self.interrupted { " (interrupted)" } else { "" }
        )
    }
}

/// 自动试验执行器
pub struct TrialRunner<T: Transport + 'static> {
    session: Session<T>,
    plan: Box<dyn RunPlan>,
}

impl<T: Transport + 'static> TrialRunner<T> {
    /// 会话被切换为：延迟重连、确认超时即放弃、试验时长取自配置
    pub fn new(session: Session<T>, plan: impl RunPlan + 'static) -> Self {
        let mut session = session.with_reconnect(ReconnectMode::Deferred);
        session.set_ack_policy(AckPolicy::Abandon);
        let duration = session.config().sweep.trial_duration();
        session.set_trial_ceiling(Some(duration));
        Self {
            session,
            plan: Box::new(plan),
        }
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// 执行整个计划
    pub fn run(&mut self) -> Result<SweepSummary, SessionError> {
        let mut summary = SweepSummary::default();
        let sweep = self.session.config().sweep.clone();
        let data_dir = self.session.config().export.data_dir.clone();
        let mut work_started = Instant::now();
        let mut index = 0;

        loop {
            let parameters = match self.plan.next_parameters(&data_dir) {
                Ok(Some(parameters)) => parameters,
                Ok(None) => break,
                Err(e) => {
                    self.session.close_transport(true);
                    return Err(SessionError::Plan(format!("{:#}", e)));
                },
            };
            index += 1;
            info!("Trial {} with {}", index, parameters);

            let outcome = match self.run_trial(index, parameters) {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Trial {} failed: {}", index, e);
                    self.session.abort();
                    return Err(e);
                },
            };
            summary.record(outcome);
            if outcome == TrialOutcome::Interrupted {
                break;
            }

            let paced = if work_started.elapsed() >= sweep.work_period() {
                info!("Work period elapsed, cooling down for {:?}", sweep.cooldown());
                self.session.close_transport(true);
                let rested = self.session.rest(sweep.cooldown());
                work_started = Instant::now();
                rested
            } else {
                self.session.rest(sweep.inter_trial())
            };
            if let Err(SessionError::Interrupted) = paced {
                summary.interrupted = true;
                break;
            }
        }

        self.session.close_transport(true);
        info!("Sweep finished: {}", summary);
        Ok(summary)
    }

    fn run_trial(
        &mut self,
        index: usize,
        parameters: ParameterSet,
    ) -> Result<TrialOutcome, SessionError> {
        match self.prepare_trial(index) {
            Ok(true) => {},
            Ok(false) => {
                warn!("No PID prompt for trial {}, skipping", index);
                self.session.close_transport(true);
                return Ok(TrialOutcome::Skipped);
            },
            Err(SessionError::Interrupted) => {
                self.session.interrupt_flag().store(false, Ordering::Release);
                self.session.close_transport(false);
                return Ok(TrialOutcome::Interrupted);
            },
            Err(e) => return Err(e),
        }

        self.session.start_pid(parameters, true);
        while self.session.mode() == Mode::RunningPid {
            match self.session.tick() {
                Ok(()) => {},
                Err(SessionError::Interrupted) => {
                    self.session.interrupt_flag().store(false, Ordering::Release);
                    self.session.handle_interrupt()?;
                    return Ok(TrialOutcome::Interrupted);
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("{}", e),
            }
        }

        let report = self.session.take_last_run();
        Ok(match report.map(|r| r.end) {
            Some(RunEnd::HandshakeTimeout) => TrialOutcome::Abandoned,
            Some(RunEnd::Interrupted) => TrialOutcome::Interrupted,
            _ => TrialOutcome::Completed,
        })
    }

    /// 居中并把设备带到 PID 参数提示，返回是否看到提示
    fn prepare_trial(&mut self, index: usize) -> Result<bool, SessionError> {
        let settle = self.session.config().sweep.settle();

        self.session.set_export_subdir(Some(format!("pid_set_{}", index)));
        self.session.take_last_run();
        self.session.ensure_open()?;
        self.session.full_reset()?;

        self.session.send_command(CommandToken::CENTRE)?;
        self.session.center()?;
        self.session.rest(settle)?;

        self.session.send_command(CommandToken::PID)?;
        if !self.session.await_pid_prompt()? {
            return Ok(false);
        }
        // 回车确认摆杆已稳定
        self.session.send_line("")?;
        Ok(true)
    }
}
