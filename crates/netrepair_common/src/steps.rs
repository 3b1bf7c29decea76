//! Repair steps and their state machine
//!
//! A run has five fixed steps. Each step moves strictly
//! Waiting -> Running -> {Completed | Error}; [`StepBoard`] rejects
//! anything else. The displayed state is tracked separately so that
//! finalization can show every step as completed without rewriting
//! what actually happened.

use crate::error::{RepairError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five steps of a repair run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    EnumerateAdapters,
    ConfigureAddressing,
    ResetDns,
    RefreshStack,
    ReportStatus,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::EnumerateAdapters,
        Step::ConfigureAddressing,
        Step::ResetDns,
        Step::RefreshStack,
        Step::ReportStatus,
    ];

    pub fn index(&self) -> usize {
        match self {
            Step::EnumerateAdapters => 0,
            Step::ConfigureAddressing => 1,
            Step::ResetDns => 2,
            Step::RefreshStack => 3,
            Step::ReportStatus => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Short label for the progress indicator
    pub fn label(&self) -> &'static str {
        match self {
            Step::EnumerateAdapters => "Get adapters",
            Step::ConfigureAddressing => "Reset adapters",
            Step::ResetDns => "Reset DNS",
            Step::RefreshStack => "Reconnect",
            Step::ReportStatus => "Done",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::EnumerateAdapters => write!(f, "enumerate_adapters"),
            Step::ConfigureAddressing => write!(f, "configure_addressing"),
            Step::ResetDns => write!(f, "reset_dns"),
            Step::RefreshStack => write!(f, "refresh_stack"),
            Step::ReportStatus => write!(f, "report_status"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    #[default]
    Waiting,
    Running,
    Completed,
    Error,
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Completed | StepState::Error)
    }

    pub fn can_transition_to(&self, next: StepState) -> bool {
        matches!(
            (self, next),
            (StepState::Waiting, StepState::Running)
                | (StepState::Running, StepState::Completed)
                | (StepState::Running, StepState::Error)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepState::Waiting => "waiting",
            StepState::Running => "running",
            StepState::Completed => "completed",
            StepState::Error => "error",
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    Failed { step: Step, reason: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded)
    }
}

/// Outcome of a best-effort step that did not abort the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Every action succeeded
    Clean,
    /// Some actions failed; the run carries on
    Degraded { failures: Vec<String> },
}

impl StepOutcome {
    pub fn from_failures(failures: Vec<String>) -> Self {
        if failures.is_empty() {
            StepOutcome::Clean
        } else {
            StepOutcome::Degraded { failures }
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, StepOutcome::Clean)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: Step,
    /// Actual state
    pub state: StepState,
    /// State shown to the user
    pub displayed: StepState,
    /// Every state the step has been in, starting with Waiting
    pub history: Vec<StepState>,
}

impl StepRecord {
    fn new(step: Step) -> Self {
        Self {
            step,
            state: StepState::Waiting,
            displayed: StepState::Waiting,
            history: vec![StepState::Waiting],
        }
    }
}

/// Per-run step table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepBoard {
    records: Vec<StepRecord>,
    finalized: bool,
}

impl Default for StepBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StepBoard {
    pub fn new() -> Self {
        Self {
            records: Step::ALL.iter().map(|s| StepRecord::new(*s)).collect(),
            finalized: false,
        }
    }

    pub fn record(&self, step: Step) -> &StepRecord {
        &self.records[step.index()]
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn state(&self, step: Step) -> StepState {
        self.record(step).state
    }

    /// The step currently running, if any
    pub fn running(&self) -> Option<Step> {
        self.records
            .iter()
            .find(|r| r.state == StepState::Running)
            .map(|r| r.step)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Apply a transition, rejecting anything outside the state machine
    pub fn transition(&mut self, step: Step, next: StepState) -> Result<()> {
        if self.finalized {
            return Err(RepairError::Internal(format!(
                "step {} changed after the run was finalized",
                step
            )));
        }

        if next == StepState::Running {
            if let Some(other) = self.running() {
                return Err(RepairError::Internal(format!(
                    "cannot start {} while {} is running",
                    step, other
                )));
            }
        }

        let record = &mut self.records[step.index()];
        if !record.state.can_transition_to(next) {
            return Err(RepairError::Internal(format!(
                "illegal transition for {}: {} -> {}",
                step,
                record.state.as_str(),
                next.as_str()
            )));
        }

        record.state = next;
        record.displayed = next;
        record.history.push(next);
        Ok(())
    }

    /// Show every step as completed. Actual states are left alone.
    pub fn finalize(&mut self) {
        for record in &mut self.records {
            record.displayed = StepState::Completed;
        }
        self.finalized = true;
    }
}
