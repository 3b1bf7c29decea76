//! Application wiring
//!
//! Loads configuration, runs the sequencer on a blocking worker behind the
//! privilege gate, drains its events into the presenter and then holds the
//! process open for the configured exit delay.

use crate::cli::Cli;
use crate::exit_timer::ExitTimer;
use crate::presenter::{PresenterConfig, TerminalPresenter};
use anyhow::{Context, Result};
use netrepair_common::{
    ChannelSink, PrivilegeGuard, RepairComponents, RepairConfig, RepairSequencer, StartResult,
    SystemPrivilegeGuard, SystemRunner,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Load configuration and apply command-line overrides
pub fn load_config(cli: &Cli) -> Result<RepairConfig> {
    let mut config = RepairConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(secs) = cli.exit_delay {
        config.timing.exit_delay_secs = secs;
    }
    Ok(config)
}

/// Process exit code for a start result
pub fn exit_code(result: &StartResult) -> i32 {
    match result {
        StartResult::Ran(report) if report.outcome.is_success() => 0,
        StartResult::Ran(_) => 1,
        StartResult::Relaunched => 0,
        StartResult::Refused => 1,
    }
}

/// Run the gated sequencer on a worker thread while `presenter` renders
/// its events
pub async fn execute<W: Write>(
    presenter: &mut TerminalPresenter<W>,
    components: RepairComponents,
    guard: Box<dyn PrivilegeGuard>,
    poll: Duration,
) -> Result<StartResult> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let sink = Arc::new(ChannelSink::new(tx));

    let worker = tokio::task::spawn_blocking(move || {
        let sequencer = RepairSequencer::new(components, sink);
        sequencer.start(guard.as_ref())
    });

    // Never return while the worker is mid-run
    let drained = presenter.drain(&mut rx, poll).await;
    if let Err(e) = &drained {
        warn!(error = %e, "repair log output failed, waiting for the run to finish");
        while rx.recv().await.is_some() {}
    }

    let result = worker.await.context("Repair worker stopped unexpectedly")?;
    drained.context("Failed to write repair log")?;
    Ok(result)
}

pub async fn run(cli: Cli) -> Result<i32> {
    if cli.write_default_config {
        let path = RepairConfig::user_config_path()?;
        RepairConfig::default()
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(0);
    }

    let config = load_config(&cli)?;
    info!(version = env!("CARGO_PKG_VERSION"), "netrepair starting");

    let mut presenter = TerminalPresenter::stdout(PresenterConfig::resolve(&config.output));
    let components = RepairComponents::system(&config);
    let guard = Box::new(
        SystemPrivilegeGuard::new(SystemRunner::new()).with_relaunched(cli.elevated_relaunch),
    );

    let result = execute(&mut presenter, components, guard, config.timing.poll_interval()).await?;
    let code = exit_code(&result);

    match result {
        StartResult::Relaunched => tokio::time::sleep(config.timing.relaunch_grace()).await,
        StartResult::Refused => {}
        StartResult::Ran(report) => {
            debug!(run_id = %report.run_id, "run finished");
            linger(&mut presenter, config.timing.exit_delay(), cli.stay_open).await?;
        }
    }

    Ok(code)
}

/// Keep the window readable after the run, then let the process end
async fn linger<W: Write>(
    presenter: &mut TerminalPresenter<W>,
    delay: Duration,
    stay_open: bool,
) -> Result<()> {
    if stay_open {
        presenter.line("\n✅ Repair completed, press Ctrl+C to close.")?;
        tokio::signal::ctrl_c().await?;
        return Ok(());
    }

    presenter.line(&format!(
        "\n✅ Repair completed, program will automatically close in {} seconds...",
        delay.as_secs()
    ))?;

    let timer = ExitTimer::schedule(delay);
    let canceller = timer.canceller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    if !timer.wait().await {
        debug!("exit timer cancelled, closing early");
    }
    Ok(())
}
