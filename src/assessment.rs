use chrono::{DateTime, Local, TimeDelta};
use std::time::Duration;
use tracing::info;

use crate::cutoff::CutoffGate;
use crate::error::{Error, Result};
use crate::grid::{GridState, GrowthPolicy};
use crate::input::GridCommand;
use crate::navigation::{navigate_grid, Direction, NavTarget};
use crate::scoring::{score, Submission};
use crate::session::SessionIdentity;
use crate::symbol::{AnswerKey, Digit};

pub const DEFAULT_DURATION_SECS: u32 = 90;

/// Countdown resolution
pub const COUNTDOWN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionReason {
    Timeout,
    Submitted,
}

/// Outcome of the single Running -> Completed transition of a run
#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    pub run_id: u64,
    pub reason: CompletionReason,
    pub score: u32,
    pub total_attempted: usize,
    pub time_spent_secs: u32,
    /// Absent when time ran out with nobody signed in
    pub submission: Option<Submission>,
}

/// Timing state of the current run
#[derive(Clone, Debug)]
pub struct TestRun {
    pub started_at: Option<DateTime<Local>>,
    pub deadline_at: Option<DateTime<Local>>,
    pub status: RunStatus,
    pub time_left: u32,
}

/// One participant's assessment: the grid, the countdown and the scoring,
/// driven through Idle -> Running -> Completed.
#[derive(Debug)]
pub struct Assessment {
    run: TestRun,
    duration_secs: u32,
    grid: GridState,
    key: AnswerKey,
    run_id: u64,
    completion: Option<Completion>,
}

impl Assessment {
    pub fn new(duration_secs: u32, policy: GrowthPolicy) -> Self {
        Self::with_grid(duration_secs, GridState::new(policy))
    }

    pub fn with_grid(duration_secs: u32, grid: GridState) -> Self {
        Self {
            run: TestRun {
                started_at: None,
                deadline_at: None,
                status: RunStatus::Idle,
                time_left: duration_secs,
            },
            duration_secs,
            grid,
            key: AnswerKey::standard(),
            run_id: 0,
            completion: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.run.status
    }

    pub fn is_running(&self) -> bool {
        self.run.status == RunStatus::Running
    }

    pub fn is_completed(&self) -> bool {
        self.run.status == RunStatus::Completed
    }

    pub fn run(&self) -> &TestRun {
        &self.run
    }

    pub fn time_left(&self) -> u32 {
        self.run.time_left
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn grid(&self) -> &GridState {
        &self.grid
    }

    pub fn key(&self) -> &AnswerKey {
        &self.key
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    pub fn total_attempted(&self) -> usize {
        self.grid.total_attempted()
    }

    /// Score over everything answered so far
    pub fn current_score(&self) -> u32 {
        score(self.grid.answered_cells(), &self.key)
    }

    /// Begin a fresh run. Refused while the cutoff gate is closed; ignored
    /// while a run is already in progress.
    pub fn start(&mut self, gate: &CutoffGate) -> Result<()> {
        if gate.is_blocked() {
            return Err(Error::CutoffReached(gate.cutoff().to_string()));
        }
        if self.is_running() {
            return Ok(());
        }

        let now = Local::now();
        self.run_id += 1;
        self.completion = None;
        self.grid.reset();
        self.grid.initialize();
        self.run = TestRun {
            started_at: Some(now),
            deadline_at: Some(now + TimeDelta::seconds(i64::from(self.duration_secs))),
            status: RunStatus::Running,
            time_left: self.duration_secs,
        };

        info!(
            run_id = self.run_id,
            duration = self.duration_secs,
            cells = self.grid.active().len(),
            "run started"
        );
        Ok(())
    }

    /// Advance the countdown by one second. Returns the completion when this
    /// tick ran the clock out.
    pub fn tick(&mut self, session: Option<&SessionIdentity>) -> Option<Completion> {
        if !self.is_running() {
            return None;
        }
        self.run.time_left = self.run.time_left.saturating_sub(1);
        if self.run.time_left == 0 {
            Some(self.complete(CompletionReason::Timeout, session))
        } else {
            None
        }
    }

    /// Manual submit. A missing session aborts the attempt before anything
    /// changes; a run that is not in progress makes this a no-op.
    pub fn submit(&mut self, session: Option<&SessionIdentity>) -> Result<Option<Completion>> {
        if !self.is_running() {
            return Ok(None);
        }
        let identity = session.ok_or(Error::NoSession)?;
        Ok(Some(self.complete(CompletionReason::Submitted, Some(identity))))
    }

    fn complete(
        &mut self,
        reason: CompletionReason,
        session: Option<&SessionIdentity>,
    ) -> Completion {
        self.run.status = RunStatus::Completed;
        self.grid.flush_remaining();

        let final_score = score(self.grid.committed(), &self.key);
        let time_spent_secs = match reason {
            CompletionReason::Timeout => self.duration_secs,
            CompletionReason::Submitted => self.duration_secs - self.run.time_left,
        };
        let submission = session.map(|identity| Submission {
            user_id: identity.user_id.clone(),
            date: Local::now().date_naive(),
            score: final_score,
            time_spent_secs,
            answers: self.grid.committed().to_vec(),
        });

        let completion = Completion {
            run_id: self.run_id,
            reason,
            score: final_score,
            total_attempted: self.grid.total_attempted(),
            time_spent_secs,
            submission,
        };
        info!(
            run_id = self.run_id,
            ?reason,
            score = final_score,
            attempted = completion.total_attempted,
            time_spent = time_spent_secs,
            "run completed"
        );
        self.completion = Some(completion.clone());
        completion
    }

    /// Write (or clear) the answer at `index` of the active window
    pub fn record_answer(&mut self, index: usize, answer: Option<Digit>) -> bool {
        if !self.is_running() || !self.grid.record_answer(index, answer) {
            return false;
        }
        self.grid.check_and_grow(self.grid.focus());
        true
    }

    /// Write to the focused cell; focus does not advance
    pub fn write(&mut self, answer: Option<Digit>) -> bool {
        let focus = self.grid.focus();
        self.record_answer(focus, answer)
    }

    pub fn move_focus(&mut self, direction: Direction) -> bool {
        if !self.is_running() {
            return false;
        }
        let focus = self.grid.focus();
        match navigate_grid(focus, direction, self.grid.active().len()) {
            NavTarget::Focus(target) => {
                self.grid.set_focus(target);
                self.grid.check_and_grow(target);
                true
            }
            NavTarget::RequestGrowth => self.grid.check_and_grow(focus),
            NavTarget::Stay => false,
        }
    }

    /// Apply a keyboard command. Only Submit can complete the run.
    pub fn handle(
        &mut self,
        command: GridCommand,
        session: Option<&SessionIdentity>,
    ) -> Result<Option<Completion>> {
        match command {
            GridCommand::Move(direction) => {
                self.move_focus(direction);
                Ok(None)
            }
            GridCommand::Write(digit) => {
                self.write(Some(digit));
                Ok(None)
            }
            GridCommand::Clear => {
                self.write(None);
                Ok(None)
            }
            GridCommand::Submit => self.submit(session),
        }
    }
}
