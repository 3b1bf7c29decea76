//! Repair sequencer
//!
//! Runs the five repair steps strictly in order on the calling thread:
//!
//! 1. enumerate Ethernet adapters (no adapters ends the run)
//! 2. reset IP/DNS sources to DHCP with netsh
//! 3. reset DNS search order through the management interface
//! 4. refresh leases, caches, Winsock and proxy settings
//! 5. report the resulting configuration
//!
//! Steps 2-4 are best effort and cannot fail the run. An error returned
//! from a component, or a panic inside one, marks the step that was
//! running as `Error`, skips the remaining steps and fails the run.
//! Finalization always happens and shows every step as completed; the
//! caller owns anything that should happen after that (such as exiting).

use crate::adapter::{Adapter, AdapterEnumerator, IpconfigEnumerator};
use crate::command_exec::SystemRunner;
use crate::config::RepairConfig;
use crate::configurator::{AdapterConfigurator, NetshConfigurator};
use crate::dns_reset::{CimManagement, DnsResetter, ManagementDnsResetter};
use crate::error::{RepairError, Result};
use crate::events::{EventSink, RepairEvent};
use crate::inspector::{IpconfigInspector, NetworkInspector};
use crate::privilege::{authorize, Authorization, PrivilegeGuard};
use crate::refresher::{CommandRefresher, NetworkRefresher};
use crate::steps::{RunOutcome, Step, StepBoard, StepOutcome, StepState};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

const REPORT_HEADER: &str = "—————— Current network configuration ——————";
const REPORT_FOOTER: &str = "————————————————————————————————————";

/// The components a run is made of
pub struct RepairComponents {
    pub enumerator: Box<dyn AdapterEnumerator>,
    pub configurator: Box<dyn AdapterConfigurator>,
    pub dns: Box<dyn DnsResetter>,
    pub refresher: Box<dyn NetworkRefresher>,
    pub inspector: Box<dyn NetworkInspector>,
}

impl RepairComponents {
    /// Components backed by the real OS tools
    pub fn system(config: &RepairConfig) -> Self {
        let runner = SystemRunner::new();
        Self {
            enumerator: Box::new(
                IpconfigEnumerator::new(runner).with_tokens(config.adapters.ethernet_tokens.clone()),
            ),
            configurator: Box::new(NetshConfigurator::new(runner)),
            dns: Box::new(ManagementDnsResetter::new(CimManagement::new(runner))),
            refresher: Box::new(
                CommandRefresher::new(runner).with_pause(config.timing.renegotiation_pause()),
            ),
            inspector: Box::new(IpconfigInspector::new(runner)),
        }
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub board: StepBoard,
    pub adapters: Vec<Adapter>,
    pub step_outcomes: Vec<(Step, StepOutcome)>,
    /// Raw configuration report from the final step
    pub report: Option<String>,
    /// Every log line emitted during the run, in order
    pub log: Vec<String>,
}

/// Result of asking the sequencer to start behind the privilege gate
#[derive(Debug, Clone)]
pub enum StartResult {
    Ran(Box<RunReport>),
    Relaunched,
    Refused,
}

/// Why a run stopped early
#[derive(Debug)]
struct RunFailure {
    step: Step,
    reason: String,
    /// Already explained in the log by the step itself
    announced: bool,
    /// `RepairError::code` when a component error caused the failure
    code: Option<i32>,
}

impl RunFailure {
    fn unexpected(step: Step, reason: impl Into<String>) -> Self {
        Self {
            step,
            reason: reason.into(),
            announced: false,
            code: None,
        }
    }

    fn from_error(step: Step, error: &RepairError) -> Self {
        Self {
            code: Some(error.code()),
            ..Self::unexpected(step, error.to_string())
        }
    }
}

/// Forwards events and keeps the run's own copy of the log
struct RunLog {
    inner: Arc<dyn EventSink>,
    lines: Mutex<Vec<String>>,
}

impl RunLog {
    fn new(inner: Arc<dyn EventSink>) -> Self {
        Self {
            inner,
            lines: Mutex::new(Vec::new()),
        }
    }

    fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl EventSink for RunLog {
    fn emit(&self, event: RepairEvent) {
        if let RepairEvent::Log { message, .. } = &event {
            if let Ok(mut lines) = self.lines.lock() {
                lines.push(message.clone());
            }
        }
        self.inner.emit(event);
    }
}

/// Mutable state of one run
struct RepairRun {
    board: StepBoard,
    adapters: Vec<Adapter>,
    step_outcomes: Vec<(Step, StepOutcome)>,
    report: Option<String>,
}

pub struct RepairSequencer {
    components: RepairComponents,
    sink: Arc<dyn EventSink>,
}

impl RepairSequencer {
    pub fn new(components: RepairComponents, sink: Arc<dyn EventSink>) -> Self {
        Self { components, sink }
    }

    /// Check privileges, then run if elevated
    pub fn start(&self, guard: &dyn PrivilegeGuard) -> StartResult {
        match authorize(guard, self.sink.as_ref()) {
            Authorization::Elevated => StartResult::Ran(Box::new(self.run())),
            Authorization::Relaunched => StartResult::Relaunched,
            Authorization::Refused => StartResult::Refused,
        }
    }

    /// Run all steps and finalize
    pub fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("repair_run", %run_id);
        let _guard = span.enter();

        let log = RunLog::new(Arc::clone(&self.sink));
        let mut run = RepairRun {
            board: StepBoard::new(),
            adapters: Vec::new(),
            step_outcomes: Vec::new(),
            report: None,
        };

        log.log("🚀 Starting network repair...");
        let outcome = match self.execute(&mut run, &log) {
            Ok(()) => {
                info!("repair run succeeded");
                log.log("\n🎉 Processing completed, network should be restored");
                log.log(
                    "💡 If it still doesn't work, you might be using a TUN adapter, or the problem is \
                     outside this machine. Check your proxy tool configuration or contact your \
                     network administrator.",
                );
                RunOutcome::Succeeded
            }
            Err(failure) => {
                error!(
                    step = %failure.step,
                    reason = %failure.reason,
                    code = ?failure.code,
                    "repair run failed"
                );
                if !failure.announced {
                    log.log(&format!("❌ Error occurred during repair: {}", failure.reason));
                }
                if let Some(running) = run.board.running() {
                    if let Err(e) = self.set_state(&mut run, &log, running, StepState::Error) {
                        warn!(reason = %e.reason, "could not record step error");
                    }
                }
                RunOutcome::Failed {
                    step: failure.step,
                    reason: failure.reason,
                }
            }
        };

        run.board.finalize();
        log.emit(RepairEvent::Finalized {
            outcome: outcome.clone(),
        });

        RunReport {
            run_id,
            outcome,
            board: run.board,
            adapters: run.adapters,
            step_outcomes: run.step_outcomes,
            report: run.report,
            log: log.lines(),
        }
    }

    fn execute(&self, run: &mut RepairRun, log: &RunLog) -> std::result::Result<(), RunFailure> {
        let c = &self.components;

        // 1. Adapters
        log.log("📡 Getting network adapter information...");
        self.set_state(run, log, Step::EnumerateAdapters, StepState::Running)?;
        let adapters = guarded(Step::EnumerateAdapters, || c.enumerator.enumerate(log))?;
        if adapters.is_empty() {
            log.log("❌ No Ethernet adapters found");
            return Err(RunFailure {
                step: Step::EnumerateAdapters,
                reason: "no Ethernet adapters found".into(),
                announced: true,
                code: None,
            });
        }
        log.log(&format!("✅ Found {} Ethernet adapter(s)", adapters.len()));
        run.adapters = adapters;
        self.set_state(run, log, Step::EnumerateAdapters, StepState::Completed)?;

        // 2. Addressing
        log.log("⚙️ Configuring network settings...");
        self.best_effort(run, log, Step::ConfigureAddressing, |adapters| {
            c.configurator.configure(adapters, log)
        })?;

        // 3. DNS search order
        log.log("🌐 Setting DNS to DHCP...");
        self.best_effort(run, log, Step::ResetDns, |adapters| c.dns.reset_dns(adapters, log))?;

        // 4. Stack refresh
        log.log("🔄 Refreshing network configuration...");
        self.best_effort(run, log, Step::RefreshStack, |_| c.refresher.refresh(log))?;

        // 5. Report
        log.log("📊 Getting network configuration information...");
        self.set_state(run, log, Step::ReportStatus, StepState::Running)?;
        let report = guarded(Step::ReportStatus, || c.inspector.report())?;
        log.log(REPORT_HEADER);
        log.log(&report);
        log.log(REPORT_FOOTER);
        run.report = Some(report);
        self.set_state(run, log, Step::ReportStatus, StepState::Completed)?;

        Ok(())
    }

    fn best_effort(
        &self,
        run: &mut RepairRun,
        log: &RunLog,
        step: Step,
        body: impl FnOnce(&[Adapter]) -> StepOutcome,
    ) -> std::result::Result<(), RunFailure> {
        self.set_state(run, log, step, StepState::Running)?;

        let adapters = &run.adapters;
        let outcome = guarded(step, || Ok(body(adapters)))?;
        if let StepOutcome::Degraded { failures } = &outcome {
            warn!(%step, failures = failures.len(), "step degraded");
        }
        run.step_outcomes.push((step, outcome));

        self.set_state(run, log, step, StepState::Completed)
    }

    fn set_state(
        &self,
        run: &mut RepairRun,
        log: &RunLog,
        step: Step,
        state: StepState,
    ) -> std::result::Result<(), RunFailure> {
        run.board
            .transition(step, state)
            .map_err(|e| RunFailure::from_error(step, &e))?;
        info!(%step, state = state.as_str(), "step state");
        log.emit(RepairEvent::StepStatus {
            step,
            status: state,
        });
        Ok(())
    }
}

/// Run a step body, turning errors and panics into a run failure
fn guarded<T>(step: Step, body: impl FnOnce() -> Result<T>) -> std::result::Result<T, RunFailure> {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            warn!(%step, code = e.code(), error = %e, "step failed");
            Err(RunFailure::from_error(step, &e))
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unexpected panic".to_string());
            Err(RunFailure::unexpected(step, reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::testing::{FakeGuard, FakeSuite};

    #[test]
    fn test_guarded_maps_error_and_panic() {
        let err = guarded::<()>(Step::ResetDns, || Err(RepairError::Management("boom".into())))
            .unwrap_err();
        assert_eq!(err.step, Step::ResetDns);
        assert!(err.reason.contains("boom"));
        assert_eq!(err.code, Some(30));

        let panicked = guarded::<()>(Step::RefreshStack, || panic!("stack exploded")).unwrap_err();
        assert_eq!(panicked.reason, "stack exploded");
        assert_eq!(panicked.code, None);
    }

    #[test]
    fn test_run_log_keeps_copy() {
        let sink = Arc::new(MemorySink::new());
        let log = RunLog::new(sink.clone());
        log.log("one");
        log.emit(RepairEvent::StepStatus {
            step: Step::ResetDns,
            status: StepState::Running,
        });
        log.log("two");

        assert_eq!(log.lines(), vec!["one", "two"]);
        assert_eq!(sink.events().len(), 3);
    }

    #[test]
    fn test_start_refused_never_runs() {
        let suite = FakeSuite::with_adapters(1);
        let sink = Arc::new(MemorySink::new());
        let sequencer = RepairSequencer::new(suite.components(), sink.clone());

        let result = sequencer.start(&FakeGuard::not_elevated(Ok(false)));

        assert!(matches!(result, StartResult::Refused));
        assert_eq!(suite.enumerate_calls(), 0);
        assert!(sink.statuses().is_empty());
    }

    #[test]
    fn test_start_relaunched_never_runs() {
        let suite = FakeSuite::with_adapters(1);
        let sequencer = RepairSequencer::new(suite.components(), Arc::new(MemorySink::new()));

        let result = sequencer.start(&FakeGuard::not_elevated(Ok(true)));

        assert!(matches!(result, StartResult::Relaunched));
        assert_eq!(suite.enumerate_calls(), 0);
    }

    #[test]
    fn test_start_elevated_runs() {
        let suite = FakeSuite::with_adapters(1);
        let sequencer = RepairSequencer::new(suite.components(), Arc::new(MemorySink::new()));

        match sequencer.start(&FakeGuard::elevated()) {
            StartResult::Ran(report) => assert!(report.outcome.is_success()),
            other => panic!("expected a run, got {:?}", other),
        }
    }
}
