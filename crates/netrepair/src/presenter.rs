//! Terminal presenter
//!
//! Renders the repair log and the five-step indicator. Events arrive on a
//! channel from the worker thread; [`TerminalPresenter::drain`] empties it
//! on a fixed tick with non-blocking receives, so lines come out in
//! emission order and the loop never waits on the worker.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use netrepair_common::config::{ColorMode, EmojiMode, OutputConfig};
use netrepair_common::{RepairEvent, RunOutcome, Step, StepState};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;

/// Appearance resolved for the current terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenterConfig {
    pub color: bool,
    pub emojis: bool,
}

impl PresenterConfig {
    pub fn plain() -> Self {
        Self {
            color: false,
            emojis: false,
        }
    }

    /// Resolve `auto` modes against the attached terminal
    pub fn resolve(output: &OutputConfig) -> Self {
        let term = console::Term::stdout();

        let color = match output.color {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                console::colors_enabled() && std::env::var_os("NO_COLOR").is_none()
            }
        };

        let emojis = match output.emojis {
            EmojiMode::Enabled => true,
            EmojiMode::Disabled => false,
            EmojiMode::Auto => term.features().wants_emoji(),
        };

        Self { color, emojis }
    }
}

/// Icon for a step state
pub fn status_icon(state: StepState, config: PresenterConfig) -> String {
    let icon = if config.emojis {
        match state {
            StepState::Waiting | StepState::Running => "⏳",
            StepState::Completed => "✅",
            StepState::Error => "❌",
        }
    } else {
        match state {
            StepState::Waiting => "[ ]",
            StepState::Running => "[..]",
            StepState::Completed => "[OK]",
            StepState::Error => "[X]",
        }
    };

    if !config.color {
        return icon.to_string();
    }
    match state {
        StepState::Waiting => icon.bright_black().to_string(),
        StepState::Running => icon.blue().to_string(),
        StepState::Completed => icon.green().to_string(),
        StepState::Error => icon.red().to_string(),
    }
}

/// One-line rendering of all five steps
pub fn render_indicator(states: &[StepState; 5], config: PresenterConfig) -> String {
    Step::ALL
        .iter()
        .map(|step| {
            let label = if config.color && states[step.index()] == StepState::Running {
                step.label().bold().to_string()
            } else {
                step.label().to_string()
            };
            format!("{} {}", status_icon(states[step.index()], config), label)
        })
        .collect::<Vec<_>>()
        .join("  ›  ")
}

pub struct TerminalPresenter<W: Write> {
    config: PresenterConfig,
    states: [StepState; 5],
    bar: ProgressBar,
    out: W,
    outcome: Option<RunOutcome>,
}

impl TerminalPresenter<io::Stdout> {
    /// Presenter drawing to the real terminal
    pub fn stdout(config: PresenterConfig) -> Self {
        let bar = ProgressBar::with_draw_target(Some(Step::ALL.len() as u64), ProgressDrawTarget::stdout());
        if let Ok(style) = ProgressStyle::default_bar().template("[{bar:15}] {pos}/{len}  {msg}") {
            bar.set_style(style.progress_chars("=> "));
        }
        Self::with_bar(config, bar, io::stdout())
    }
}

impl<W: Write> TerminalPresenter<W> {
    /// Presenter writing log lines to `out` with no visible progress bar
    pub fn new(config: PresenterConfig, out: W) -> Self {
        Self::with_bar(config, ProgressBar::hidden(), out)
    }

    fn with_bar(config: PresenterConfig, bar: ProgressBar, out: W) -> Self {
        let presenter = Self {
            config,
            states: [StepState::Waiting; 5],
            bar,
            out,
            outcome: None,
        };
        presenter.refresh_indicator();
        presenter
    }

    pub fn states(&self) -> &[StepState; 5] {
        &self.states
    }

    /// Outcome carried by the finalize event, once seen
    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    pub fn into_writer(self) -> W {
        self.bar.finish_and_clear();
        self.out
    }

    /// Print a line above the step indicator
    pub fn line(&mut self, message: &str) -> io::Result<()> {
        let out = &mut self.out;
        self.bar.suspend(|| writeln!(out, "{}", message))
    }

    pub fn handle(&mut self, event: RepairEvent) -> io::Result<()> {
        match event {
            RepairEvent::Log { message, .. } => self.line(&message),
            RepairEvent::StepStatus { step, status } => {
                self.states[step.index()] = status;
                self.refresh_indicator();
                Ok(())
            }
            RepairEvent::Finalized { outcome } => {
                self.states = [StepState::Completed; 5];
                self.refresh_indicator();
                self.bar.finish();
                self.outcome = Some(outcome);
                Ok(())
            }
        }
    }

    /// Drain `rx` every `poll` until the sending side is gone
    pub async fn drain(
        &mut self,
        rx: &mut UnboundedReceiver<RepairEvent>,
        poll: Duration,
    ) -> io::Result<()> {
        let mut ticker = tokio::time::interval(poll);
        loop {
            ticker.tick().await;
            loop {
                match rx.try_recv() {
                    Ok(event) => self.handle(event)?,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return self.out.flush(),
                }
            }
            self.out.flush()?;
        }
    }

    fn refresh_indicator(&self) {
        let done = self.states.iter().filter(|s| s.is_terminal()).count();
        self.bar.set_position(done as u64);
        self.bar
            .set_message(render_indicator(&self.states, self.config));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_icons() {
        let plain = PresenterConfig::plain();
        assert_eq!(status_icon(StepState::Waiting, plain), "[ ]");
        assert_eq!(status_icon(StepState::Running, plain), "[..]");
        assert_eq!(status_icon(StepState::Completed, plain), "[OK]");
        assert_eq!(status_icon(StepState::Error, plain), "[X]");
    }

    #[test]
    fn test_emoji_icons() {
        let config = PresenterConfig {
            color: false,
            emojis: true,
        };
        assert_eq!(status_icon(StepState::Running, config), "⏳");
        assert_eq!(status_icon(StepState::Completed, config), "✅");
        assert_eq!(status_icon(StepState::Error, config), "❌");
    }

    #[test]
    fn test_indicator_lists_all_steps_in_order() {
        let mut states = [StepState::Waiting; 5];
        states[0] = StepState::Completed;
        states[1] = StepState::Running;

        let line = render_indicator(&states, PresenterConfig::plain());
        assert_eq!(
            line,
            "[OK] Get adapters  ›  [..] Reset adapters  ›  [ ] Reset DNS  ›  [ ] Reconnect  ›  [ ] Done"
        );
    }

    #[test]
    fn test_color_wraps_icon() {
        let config = PresenterConfig {
            color: true,
            emojis: false,
        };
        let icon = status_icon(StepState::Error, config);
        assert!(icon.contains("[X]"));
        assert_ne!(icon, "[X]");
    }
}
