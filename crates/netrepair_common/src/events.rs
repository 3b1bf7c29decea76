//! Repair events and the sinks that carry them
//!
//! The sequencer never talks to a presenter directly. It emits
//! [`RepairEvent`]s into an [`EventSink`]; the binary hands it a
//! [`ChannelSink`] whose receiver is drained by the terminal presenter,
//! tests hand it a [`MemorySink`].

use crate::steps::{RunOutcome, Step, StepState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

/// One observable thing that happened during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepairEvent {
    /// Free-text log line (may span several lines)
    Log { message: String, at: DateTime<Utc> },
    /// A step changed state
    StepStatus { step: Step, status: StepState },
    /// The run is over and every step should be displayed as completed
    Finalized { outcome: RunOutcome },
}

impl RepairEvent {
    pub fn log(message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Destination for repair events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RepairEvent);

    fn log(&self, message: &str) {
        self.emit(RepairEvent::log(message));
    }
}

/// Sends events over an unbounded channel to the presenter
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<RepairEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<RepairEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: RepairEvent) {
        // Receiver gone means the presenter already shut down
        let _ = self.tx.send(event);
    }
}

/// Collects events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<RepairEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RepairEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// All log lines in emission order
    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RepairEvent::Log { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    /// All status transitions in emission order
    pub fn statuses(&self) -> Vec<(Step, StepState)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RepairEvent::StepStatus { step, status } => Some((step, status)),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: RepairEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
