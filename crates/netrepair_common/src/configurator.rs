//! Adapter addressing reset
//!
//! Switches each adapter's IP address source and DNS server source to DHCP
//! with `netsh`. Best effort: failures are logged and the loop moves on.
//!
//! netsh sometimes exits non-zero without printing anything even though
//! the change was applied, so a non-zero exit only counts as a failure when
//! stderr carries diagnostic text.

use crate::adapter::Adapter;
use crate::command_exec::{CommandOutput, CommandRunner};
use crate::error::Result;
use crate::events::EventSink;
use crate::steps::StepOutcome;
use tracing::{info, warn};

/// Resets adapter addressing to automatic
pub trait AdapterConfigurator: Send + Sync {
    /// Never fails; per-adapter problems come back as a degraded outcome
    fn configure(&self, adapters: &[Adapter], sink: &dyn EventSink) -> StepOutcome;
}

/// What a single netsh invocation changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DhcpTarget {
    Address,
    DnsServers,
}

impl DhcpTarget {
    fn netsh_object(&self) -> &'static str {
        match self {
            DhcpTarget::Address => "address",
            DhcpTarget::DnsServers => "dnsservers",
        }
    }

    fn success_message(&self) -> &'static str {
        match self {
            DhcpTarget::Address => "    ✅ IP address set to DHCP",
            DhcpTarget::DnsServers => "    ✅ DNS servers set to DHCP",
        }
    }

    fn failure_label(&self) -> &'static str {
        match self {
            DhcpTarget::Address => "Failed to set IP address",
            DhcpTarget::DnsServers => "Failed to set DNS servers",
        }
    }
}

/// Configures adapters through `netsh interface ip set ...`
pub struct NetshConfigurator<R> {
    runner: R,
}

impl<R: CommandRunner> NetshConfigurator<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn set_dhcp(&self, adapter: &Adapter, target: DhcpTarget, sink: &dyn EventSink) -> Option<String> {
        let result = self.runner.run(
            "netsh",
            &[
                "interface",
                "ip",
                "set",
                target.netsh_object(),
                &adapter.name,
                "source=dhcp",
            ],
        );

        match judge(result) {
            Ok(()) => {
                sink.log(target.success_message());
                None
            }
            Err(detail) => {
                warn!(adapter = %adapter.name, target = target.netsh_object(), %detail, "netsh failed");
                sink.log(&format!("    ❌ {}: {}", target.failure_label(), detail));
                Some(format!("{}: {}: {}", adapter.name, target.failure_label(), detail))
            }
        }
    }
}

impl<R: CommandRunner> AdapterConfigurator for NetshConfigurator<R> {
    fn configure(&self, adapters: &[Adapter], sink: &dyn EventSink) -> StepOutcome {
        sink.log("Configuring network settings...");

        let mut failures = Vec::new();
        for adapter in adapters {
            info!(adapter = %adapter.name, "configuring adapter");
            sink.log(&format!("  🔧 Configuring adapter: {}", adapter.name));

            for target in [DhcpTarget::Address, DhcpTarget::DnsServers] {
                failures.extend(self.set_dhcp(adapter, target, sink));
            }
        }

        StepOutcome::from_failures(failures)
    }
}

/// Apply the leniency rule to one netsh result
fn judge(result: Result<CommandOutput>) -> std::result::Result<(), String> {
    match result {
        Ok(output) if output.success() || !output.has_diagnostic() => Ok(()),
        Ok(output) => Err(output.stderr.trim().to_string()),
        Err(e) => Err(e.to_string()),
    }
}
