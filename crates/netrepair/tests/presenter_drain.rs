//! Presenter and run wiring
//!
//! Drives the presenter with a real channel and, through `app::execute`,
//! with the sequencer running on a blocking worker over fake components.

use netrepair::app;
use netrepair::presenter::{PresenterConfig, TerminalPresenter};
use netrepair_common::testing::{FakeGuard, FakeSuite};
use netrepair_common::{RepairEvent, RunOutcome, StartResult, Step, StepState};
use std::io::{self, Write};
use std::time::Duration;

const POLL: Duration = Duration::from_millis(5);

/// Output whose every write fails, like a closed pipe
struct ClosedPipe;

impl Write for ClosedPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn written(presenter: TerminalPresenter<Vec<u8>>) -> String {
    String::from_utf8(presenter.into_writer()).unwrap()
}

#[tokio::test]
async fn drain_prints_lines_in_emission_order() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    tx.send(RepairEvent::log("first")).unwrap();
    tx.send(RepairEvent::StepStatus {
        step: Step::EnumerateAdapters,
        status: StepState::Running,
    })
    .unwrap();
    tx.send(RepairEvent::log("second")).unwrap();
    tx.send(RepairEvent::StepStatus {
        step: Step::EnumerateAdapters,
        status: StepState::Error,
    })
    .unwrap();
    drop(tx);

    let mut presenter = TerminalPresenter::new(PresenterConfig::plain(), Vec::new());
    presenter.drain(&mut rx, POLL).await.unwrap();

    assert_eq!(presenter.states()[0], StepState::Error);
    assert_eq!(presenter.states()[1], StepState::Waiting);
    assert!(presenter.outcome().is_none());
    assert_eq!(written(presenter), "first\nsecond\n");
}

#[tokio::test]
async fn finalize_marks_every_step_completed() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    tx.send(RepairEvent::StepStatus {
        step: Step::EnumerateAdapters,
        status: StepState::Running,
    })
    .unwrap();
    tx.send(RepairEvent::StepStatus {
        step: Step::EnumerateAdapters,
        status: StepState::Error,
    })
    .unwrap();
    tx.send(RepairEvent::Finalized {
        outcome: RunOutcome::Failed {
            step: Step::EnumerateAdapters,
            reason: "no adapters".to_string(),
        },
    })
    .unwrap();
    drop(tx);

    let mut presenter = TerminalPresenter::new(PresenterConfig::plain(), Vec::new());
    presenter.drain(&mut rx, POLL).await.unwrap();

    assert_eq!(presenter.states(), &[StepState::Completed; 5]);
    assert!(matches!(presenter.outcome(), Some(RunOutcome::Failed { .. })));
}

#[tokio::test]
async fn execute_runs_elevated_sequence() {
    let suite = FakeSuite::with_adapters(1);
    let mut presenter = TerminalPresenter::new(PresenterConfig::plain(), Vec::new());

    let result = app::execute(
        &mut presenter,
        suite.components(),
        Box::new(FakeGuard::elevated()),
        POLL,
    )
    .await
    .unwrap();

    assert_eq!(app::exit_code(&result), 0);
    match &result {
        StartResult::Ran(report) => assert_eq!(report.outcome, RunOutcome::Succeeded),
        _ => panic!("expected the run to happen"),
    }
    assert_eq!(presenter.outcome(), Some(&RunOutcome::Succeeded));
    assert_eq!(presenter.states(), &[StepState::Completed; 5]);

    let output = written(presenter);
    assert!(output.starts_with("Administrator privileges acquired"));
    assert!(output.contains("🚀 Starting network repair..."));
    assert!(output.contains("Processing completed"));
}

#[tokio::test]
async fn execute_refused_without_elevation() {
    let suite = FakeSuite::with_adapters(1);
    let mut presenter = TerminalPresenter::new(PresenterConfig::plain(), Vec::new());

    let result = app::execute(
        &mut presenter,
        suite.components(),
        Box::new(FakeGuard::not_elevated(Err("user cancelled".to_string()))),
        POLL,
    )
    .await
    .unwrap();

    assert!(matches!(result, StartResult::Refused));
    assert_eq!(app::exit_code(&result), 1);
    assert_eq!(suite.enumerate_calls(), 0);
    assert!(presenter.outcome().is_none());
}

#[tokio::test]
async fn execute_relaunched_skips_run() {
    let suite = FakeSuite::with_adapters(1);
    let mut presenter = TerminalPresenter::new(PresenterConfig::plain(), Vec::new());

    let result = app::execute(
        &mut presenter,
        suite.components(),
        Box::new(FakeGuard::not_elevated(Ok(true))),
        POLL,
    )
    .await
    .unwrap();

    assert!(matches!(result, StartResult::Relaunched));
    assert_eq!(app::exit_code(&result), 0);
    assert_eq!(suite.enumerate_calls(), 0);
}

#[tokio::test]
async fn execute_failed_run_exits_nonzero() {
    let suite = FakeSuite::failing_enumeration("ipconfig unavailable");
    let mut presenter = TerminalPresenter::new(PresenterConfig::plain(), Vec::new());

    let result = app::execute(
        &mut presenter,
        suite.components(),
        Box::new(FakeGuard::elevated()),
        POLL,
    )
    .await
    .unwrap();

    assert_eq!(app::exit_code(&result), 1);
    assert!(written(presenter).contains("Error occurred during repair: "));
}

#[tokio::test]
async fn execute_finishes_run_when_output_fails() {
    let suite = FakeSuite::with_adapters(1);
    let mut presenter = TerminalPresenter::new(PresenterConfig::plain(), ClosedPipe);

    let err = app::execute(
        &mut presenter,
        suite.components(),
        Box::new(FakeGuard::elevated()),
        POLL,
    )
    .await
    .unwrap_err();

    assert!(format!("{:#}", err).contains("Failed to write repair log"));
    assert_eq!(
        suite.call_log(),
        vec![
            Step::EnumerateAdapters,
            Step::ConfigureAddressing,
            Step::ResetDns,
            Step::RefreshStack,
            Step::ReportStatus
        ]
    );
}
