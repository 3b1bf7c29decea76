//! Network stack refresh
//!
//! Fixed script: flush DNS, release the lease three times, wait for the
//! link to renegotiate, renew, flush again, reset Winsock, clear the
//! per-user proxy settings, then flush and reset once more. Every command
//! runs regardless of how the previous one ended and command output is
//! discarded. Only commands that could not be started at all make the
//! outcome degraded.

use crate::command_exec::CommandRunner;
use crate::events::EventSink;
use crate::steps::StepOutcome;
use std::time::Duration;
use tracing::{debug, warn};

const RELEASE_REPETITIONS: usize = 3;

/// Default pause between lease release and renewal
pub const RENEGOTIATION_PAUSE: Duration = Duration::from_secs(5);

const INTERNET_SETTINGS_KEY: &str =
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Internet Settings";

/// `reg add` value arguments for each proxy setting that gets cleared
const PROXY_VALUES: &[&[&str]] = &[
    &["/v", "AutoConfigURL", "/t", "REG_SZ", "/d", "", "/f"],
    &["/v", "UseAutoDetect", "/t", "REG_DWORD", "/d", "0", "/f"],
    &["/v", "ProxyEnable", "/t", "REG_DWORD", "/d", "0", "/f"],
    &["/v", "ProxyServer", "/d", "", "/f"],
];

/// Refreshes leases, caches and the socket layer
pub trait NetworkRefresher: Send + Sync {
    fn refresh(&self, sink: &dyn EventSink) -> StepOutcome;
}

pub struct CommandRefresher<R> {
    runner: R,
    pause: Duration,
}

impl<R: CommandRunner> CommandRefresher<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            pause: RENEGOTIATION_PAUSE,
        }
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Run one command, remembering it only if it could not start
    fn run(&self, program: &str, args: &[&str], failures: &mut Vec<String>) -> bool {
        match self.runner.run(program, args) {
            Ok(output) => {
                debug!(command = %output.command_line(), exit_code = output.exit_code, "refresh command");
                true
            }
            Err(e) => {
                warn!(program, error = %e, "refresh command did not start");
                failures.push(e.to_string());
                false
            }
        }
    }

    fn flush_dns(&self, failures: &mut Vec<String>) {
        self.run("ipconfig", &["/flushdns"], failures);
    }

    fn reset_winsock(&self, failures: &mut Vec<String>) {
        self.run("netsh", &["winsock", "reset"], failures);
    }

    fn disable_proxy(&self, sink: &dyn EventSink, failures: &mut Vec<String>) {
        sink.log("Disabling proxy settings...");

        let mut all_started = true;
        for value in PROXY_VALUES {
            let mut args = vec!["add", INTERNET_SETTINGS_KEY];
            args.extend_from_slice(value);
            all_started &= self.run("reg", &args, failures);
        }

        if all_started {
            sink.log("✅ Proxy settings disabled");
        } else {
            sink.log("❌ Failed to disable proxy settings");
        }
    }
}

impl<R: CommandRunner> NetworkRefresher for CommandRefresher<R> {
    fn refresh(&self, sink: &dyn EventSink) -> StepOutcome {
        let mut failures = Vec::new();

        sink.log("Flushing DNS cache...");
        self.flush_dns(&mut failures);

        sink.log("Releasing IP address...");
        for _ in 0..RELEASE_REPETITIONS {
            self.run("ipconfig", &["/release"], &mut failures);
        }

        std::thread::sleep(self.pause);

        sink.log("Renewing IP address...");
        sink.log("Running, please wait...");
        sink.log("On machines with complex network setups this can take a few minutes, please wait...");
        self.run("ipconfig", &["/renew"], &mut failures);

        sink.log("Flushing DNS cache again...");
        self.flush_dns(&mut failures);

        sink.log("Resetting Winsock...");
        self.reset_winsock(&mut failures);

        self.disable_proxy(sink, &mut failures);

        sink.log("Repeating DNS flush...");
        self.flush_dns(&mut failures);
        self.reset_winsock(&mut failures);

        StepOutcome::from_failures(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::testing::ScriptedRunner;

    #[test]
    fn test_full_script_order() {
        let runner = ScriptedRunner::new();
        let sink = MemorySink::new();

        let outcome = CommandRefresher::new(&runner)
            .with_pause(Duration::ZERO)
            .refresh(&sink);

        assert!(outcome.is_clean());
        let calls = runner.calls();
        assert_eq!(calls.len(), 13);
        assert_eq!(calls[0], "ipconfig /flushdns");
        assert_eq!(&calls[1..4], &["ipconfig /release"; 3]);
        assert_eq!(calls[4], "ipconfig /renew");
        assert_eq!(calls[5], "ipconfig /flushdns");
        assert_eq!(calls[6], "netsh winsock reset");
        assert!(calls[7..11].iter().all(|c| c.starts_with("reg add HKCU")));
        assert!(calls[7].contains("AutoConfigURL"));
        assert!(calls[10].contains("ProxyServer"));
        assert_eq!(calls[11], "ipconfig /flushdns");
        assert_eq!(calls[12], "netsh winsock reset");
        assert!(sink.contains("Proxy settings disabled"));
    }

    #[test]
    fn test_proxy_failure_is_reported() {
        let runner = ScriptedRunner::new().fail_spawn("reg");
        let sink = MemorySink::new();

        let outcome = CommandRefresher::new(&runner)
            .with_pause(Duration::ZERO)
            .refresh(&sink);

        match outcome {
            StepOutcome::Degraded { failures } => assert_eq!(failures.len(), 4),
            other => panic!("expected degraded outcome, got {:?}", other),
        }
        assert!(sink.contains("Failed to disable proxy settings"));
        assert_eq!(runner.count("netsh winsock reset"), 2);
    }
}
