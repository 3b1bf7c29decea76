//! Test doubles for the repair components
//!
//! Used by the unit tests in this crate and by the integration tests of
//! both workspace crates.

use crate::adapter::{Adapter, AdapterEnumerator};
use crate::command_exec::{CommandOutput, CommandRunner};
use crate::configurator::AdapterConfigurator;
use crate::dns_reset::{DnsResetter, LiveConfiguration, ManagementInterface};
use crate::error::{RepairError, Result};
use crate::events::EventSink;
use crate::inspector::NetworkInspector;
use crate::privilege::PrivilegeGuard;
use crate::refresher::NetworkRefresher;
use crate::sequencer::RepairComponents;
use crate::steps::{Step, StepOutcome};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// ScriptedRunner
// ============================================================================

#[derive(Debug, Clone)]
enum Reply {
    Output {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    SpawnFailure,
}

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    reply: Reply,
}

/// Command runner that answers from a script and records every call.
///
/// Rules match when the command line contains the rule's needle; the first
/// registered match wins. Unmatched commands exit 0 with no output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, needle: &str, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            reply: Reply::Output {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        });
        self
    }

    /// Commands matching `needle` fail to start
    pub fn fail_spawn(mut self, needle: &str) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            reply: Reply::SpawnFailure,
        });
        self
    }

    /// Every command line run so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of recorded command lines containing `needle`
    pub fn count(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(needle)).count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let base = CommandOutput::new(program, args, 0);
        let line = base.command_line();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }

        match self.rules.iter().find(|r| line.contains(&r.needle)) {
            None => Ok(base),
            Some(Rule {
                reply:
                    Reply::Output {
                        exit_code,
                        stdout,
                        stderr,
                    },
                ..
            }) => Ok(CommandOutput {
                exit_code: *exit_code,
                ..base
            }
            .with_stdout(stdout.clone())
            .with_stderr(stderr.clone())),
            Some(Rule {
                reply: Reply::SpawnFailure,
                ..
            }) => Err(RepairError::Spawn {
                program: program.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted spawn failure"),
            }),
        }
    }
}

// ============================================================================
// FakeManagement
// ============================================================================

/// In-memory management interface that tracks session acquire/release
#[derive(Debug, Default)]
pub struct FakeManagement {
    configurations: Vec<LiveConfiguration>,
    result_code: u32,
    fail_open: bool,
    fail_query: bool,
    opened: AtomicUsize,
    closed: AtomicUsize,
    reset: Mutex<Vec<u32>>,
}

impl FakeManagement {
    pub fn new(configurations: Vec<LiveConfiguration>) -> Self {
        Self {
            configurations,
            ..Self::default()
        }
    }

    pub fn with_result_code(mut self, code: u32) -> Self {
        self.result_code = code;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_query(mut self) -> Self {
        self.fail_query = true;
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Configuration indices that received a reset, in order
    pub fn reset_indices(&self) -> Vec<u32> {
        self.reset.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ManagementInterface for FakeManagement {
    fn open_session(&self) -> Result<()> {
        if self.fail_open {
            return Err(RepairError::Management("CoInitialize refused".into()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close_session(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    fn ip_enabled_configurations(&self) -> Result<Vec<LiveConfiguration>> {
        if self.fail_query {
            return Err(RepairError::Management("query failed".into()));
        }
        Ok(self.configurations.clone())
    }

    fn set_dns_search_order_automatic(&self, config: &LiveConfiguration) -> Result<u32> {
        if let Ok(mut reset) = self.reset.lock() {
            reset.push(config.index);
        }
        Ok(self.result_code)
    }
}

// ============================================================================
// FakeGuard
// ============================================================================

#[derive(Debug)]
pub struct FakeGuard {
    elevated: bool,
    relaunched: bool,
    relaunch: std::result::Result<bool, String>,
    attempts: AtomicUsize,
}

impl FakeGuard {
    pub fn elevated() -> Self {
        Self {
            elevated: true,
            relaunched: false,
            relaunch: Ok(false),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn not_elevated(relaunch: std::result::Result<bool, String>) -> Self {
        Self {
            elevated: false,
            relaunched: false,
            relaunch,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Non-elevated copy started by an earlier relaunch; relaunching again
    /// would succeed if asked
    pub fn relaunched_instance() -> Self {
        Self::not_elevated(Ok(true)).as_relaunched_instance()
    }

    pub fn as_relaunched_instance(mut self) -> Self {
        self.relaunched = true;
        self
    }

    pub fn relaunch_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl PrivilegeGuard for FakeGuard {
    fn is_elevated(&self) -> bool {
        self.elevated
    }

    fn is_relaunched_instance(&self) -> bool {
        self.relaunched
    }

    fn relaunch_elevated(&self) -> Result<bool> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.relaunch.clone().map_err(RepairError::Privilege)
    }
}

// ============================================================================
// FakeSuite
// ============================================================================

#[derive(Debug, Default)]
struct SuiteState {
    adapters: Vec<Adapter>,
    enumerate_error: Option<String>,
    report_error: Option<String>,
    panic_at: Option<Step>,
    calls: Mutex<Vec<Step>>,
}

/// Counting fakes for all five components, sharing one call log
#[derive(Debug, Clone, Default)]
pub struct FakeSuite {
    state: Arc<SuiteState>,
}

impl FakeSuite {
    /// Suite whose enumerator finds `count` adapters
    pub fn with_adapters(count: usize) -> Self {
        let adapters = (0..count)
            .map(|i| Adapter::new(format!("Ethernet {}", i + 1), format!("Test NIC {}", i + 1)))
            .collect();
        Self::from_state(SuiteState {
            adapters,
            ..SuiteState::default()
        })
    }

    pub fn failing_enumeration(message: &str) -> Self {
        Self::from_state(SuiteState {
            enumerate_error: Some(message.to_string()),
            ..SuiteState::default()
        })
    }

    /// Suite with one adapter whose inspector fails
    pub fn failing_report(message: &str) -> Self {
        Self::from_state(SuiteState {
            adapters: vec![Adapter::new("Ethernet", "Test NIC")],
            report_error: Some(message.to_string()),
            ..SuiteState::default()
        })
    }

    /// Suite with one adapter whose component for `step` panics
    pub fn panicking_at(step: Step) -> Self {
        Self::from_state(SuiteState {
            adapters: vec![Adapter::new("Ethernet", "Test NIC")],
            panic_at: Some(step),
            ..SuiteState::default()
        })
    }

    fn from_state(state: SuiteState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    pub fn components(&self) -> RepairComponents {
        RepairComponents {
            enumerator: Box::new(self.clone()),
            configurator: Box::new(self.clone()),
            dns: Box::new(self.clone()),
            refresher: Box::new(self.clone()),
            inspector: Box::new(self.clone()),
        }
    }

    /// All five fakes except the enumerator
    pub fn components_with_enumerator(&self, enumerator: Box<dyn AdapterEnumerator>) -> RepairComponents {
        RepairComponents {
            enumerator,
            ..self.components()
        }
    }

    /// Component invocations in order
    pub fn call_log(&self) -> Vec<Step> {
        self.state.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls(&self, step: Step) -> usize {
        self.call_log().iter().filter(|s| **s == step).count()
    }

    pub fn enumerate_calls(&self) -> usize {
        self.calls(Step::EnumerateAdapters)
    }

    fn enter(&self, step: Step, sink: Option<&dyn EventSink>) {
        if let Ok(mut calls) = self.state.calls.lock() {
            calls.push(step);
        }
        if let Some(sink) = sink {
            sink.log(&format!("fake {} ran", step));
        }
        if self.state.panic_at == Some(step) {
            panic!("fake {} panicked", step);
        }
    }
}

impl AdapterEnumerator for FakeSuite {
    fn enumerate(&self, sink: &dyn EventSink) -> Result<Vec<Adapter>> {
        self.enter(Step::EnumerateAdapters, Some(sink));
        match &self.state.enumerate_error {
            Some(message) => Err(RepairError::Enumeration(message.clone())),
            None => Ok(self.state.adapters.clone()),
        }
    }
}

impl AdapterConfigurator for FakeSuite {
    fn configure(&self, _adapters: &[Adapter], sink: &dyn EventSink) -> StepOutcome {
        self.enter(Step::ConfigureAddressing, Some(sink));
        StepOutcome::Clean
    }
}

impl DnsResetter for FakeSuite {
    fn reset_dns(&self, _adapters: &[Adapter], sink: &dyn EventSink) -> StepOutcome {
        self.enter(Step::ResetDns, Some(sink));
        StepOutcome::Clean
    }
}

impl NetworkRefresher for FakeSuite {
    fn refresh(&self, sink: &dyn EventSink) -> StepOutcome {
        self.enter(Step::RefreshStack, Some(sink));
        StepOutcome::Clean
    }
}

impl NetworkInspector for FakeSuite {
    fn report(&self) -> Result<String> {
        self.enter(Step::ReportStatus, None);
        match &self.state.report_error {
            Some(message) => Err(RepairError::Inspection(message.clone())),
            None => Ok("Windows IP Configuration".to_string()),
        }
    }
}
