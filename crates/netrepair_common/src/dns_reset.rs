//! DNS search order reset through the management interface
//!
//! Complements the netsh pass: finds the live `Win32_NetworkAdapterConfiguration`
//! object for each adapter and calls `SetDNSServerSearchOrder` with no
//! servers, which hands DNS back to DHCP. Objects are matched on the
//! adapter *description*, since that is what both ipconfig and CIM agree on.
//!
//! Management access happens inside a [`ManagementSession`], which is
//! released on every exit path.

use crate::adapter::Adapter;
use crate::command_exec::CommandRunner;
use crate::error::{RepairError, Result};
use crate::events::EventSink;
use crate::steps::StepOutcome;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{debug, warn};

/// A live adapter configuration object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveConfiguration {
    #[serde(rename = "Index")]
    pub index: u32,
    #[serde(rename = "Description")]
    pub description: String,
}

/// Platform management interface (WMI/CIM on Windows)
pub trait ManagementInterface: Send + Sync {
    /// Acquire whatever the interface needs before queries
    fn open_session(&self) -> Result<()>;

    /// Release what `open_session` acquired
    fn close_session(&self);

    /// IP-enabled adapter configurations
    fn ip_enabled_configurations(&self) -> Result<Vec<LiveConfiguration>>;

    /// Invoke `SetDNSServerSearchOrder` with no servers; returns the
    /// method's result code (0 = success)
    fn set_dns_search_order_automatic(&self, config: &LiveConfiguration) -> Result<u32>;
}

impl<M: ManagementInterface + ?Sized> ManagementInterface for &M {
    fn open_session(&self) -> Result<()> {
        (**self).open_session()
    }

    fn close_session(&self) {
        (**self).close_session()
    }

    fn ip_enabled_configurations(&self) -> Result<Vec<LiveConfiguration>> {
        (**self).ip_enabled_configurations()
    }

    fn set_dns_search_order_automatic(&self, config: &LiveConfiguration) -> Result<u32> {
        (**self).set_dns_search_order_automatic(config)
    }
}

/// Scoped management session; closes on drop
pub struct ManagementSession<'a> {
    interface: &'a dyn ManagementInterface,
}

impl<'a> ManagementSession<'a> {
    pub fn open(interface: &'a dyn ManagementInterface) -> Result<Self> {
        interface.open_session()?;
        Ok(Self { interface })
    }

    pub fn configurations(&self) -> Result<Vec<LiveConfiguration>> {
        self.interface.ip_enabled_configurations()
    }

    pub fn reset_search_order(&self, config: &LiveConfiguration) -> Result<u32> {
        self.interface.set_dns_search_order_automatic(config)
    }
}

impl Drop for ManagementSession<'_> {
    fn drop(&mut self) {
        self.interface.close_session();
    }
}

/// Resets per-adapter DNS search order
pub trait DnsResetter: Send + Sync {
    /// Never fails; problems come back as a degraded outcome
    fn reset_dns(&self, adapters: &[Adapter], sink: &dyn EventSink) -> StepOutcome;
}

pub struct ManagementDnsResetter<M> {
    interface: M,
}

impl<M: ManagementInterface> ManagementDnsResetter<M> {
    pub fn new(interface: M) -> Self {
        Self { interface }
    }

    fn reset_within(
        &self,
        session: &ManagementSession<'_>,
        adapters: &[Adapter],
        sink: &dyn EventSink,
    ) -> Result<Vec<String>> {
        let configurations = session.configurations()?;
        debug!(count = configurations.len(), "live adapter configurations");

        let mut failures = Vec::new();
        for adapter in adapters {
            sink.log(&format!("  🌐 Setting DNS for adapter: {}", adapter.name));

            let Some(config) = configurations
                .iter()
                .find(|c| c.description == adapter.description)
            else {
                sink.log(&format!(
                    "    ⚠️ No active configuration matches \"{}\", skipped",
                    adapter.description
                ));
                failures.push(format!("{}: no matching configuration", adapter.name));
                continue;
            };

            match session.reset_search_order(config) {
                Ok(0) => sink.log("    ✅ DNS set to obtain automatically"),
                Ok(code) => {
                    warn!(adapter = %adapter.name, code, "SetDNSServerSearchOrder failed");
                    sink.log(&format!(
                        "    ❌ Failed to set DNS to obtain automatically, error code: {}",
                        code
                    ));
                    failures.push(format!("{}: result code {}", adapter.name, code));
                }
                Err(e) => {
                    warn!(adapter = %adapter.name, error = %e, "SetDNSServerSearchOrder errored");
                    sink.log(&format!("    ❌ Error while setting DNS: {}", e));
                    failures.push(format!("{}: {}", adapter.name, e));
                }
            }
        }

        Ok(failures)
    }
}

impl<M: ManagementInterface> DnsResetter for ManagementDnsResetter<M> {
    fn reset_dns(&self, adapters: &[Adapter], sink: &dyn EventSink) -> StepOutcome {
        sink.log("Setting DNS to DHCP...");

        let result = ManagementSession::open(&self.interface)
            .and_then(|session| self.reset_within(&session, adapters, sink));

        match result {
            Ok(failures) => StepOutcome::from_failures(failures),
            Err(e) => {
                warn!(error = %e, "DNS reset aborted");
                sink.log(&format!("❌ Error while setting DNS: {}", e));
                StepOutcome::Degraded {
                    failures: vec![e.to_string()],
                }
            }
        }
    }
}

const CONFIGURATION_QUERY: &str = "Get-CimInstance -ClassName Win32_NetworkAdapterConfiguration \
     -Filter 'IPEnabled = TRUE' | Select-Object Index, Description | ConvertTo-Json -Compress";

/// CIM access through PowerShell. A session is a snapshot of the
/// IP-enabled configurations taken when it opens.
pub struct CimManagement<R> {
    runner: R,
    snapshot: Mutex<Option<Vec<LiveConfiguration>>>,
}

impl<R: CommandRunner> CimManagement<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            snapshot: Mutex::new(None),
        }
    }

    fn powershell(&self, script: &str) -> Result<String> {
        let output = self
            .runner
            .run("powershell", &["-NoProfile", "-NonInteractive", "-Command", script])
            .map_err(|e| RepairError::Management(e.to_string()))?;

        if !output.success() {
            return Err(RepairError::Management(format!(
                "powershell exited with {}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Vec<LiveConfiguration>>>> {
        self.snapshot
            .lock()
            .map_err(|_| RepairError::Internal("management snapshot lock poisoned".into()))
    }
}

impl<R: CommandRunner> ManagementInterface for CimManagement<R> {
    fn open_session(&self) -> Result<()> {
        let stdout = self.powershell(CONFIGURATION_QUERY)?;
        let configurations = parse_configurations(&stdout)?;
        *self.lock()? = Some(configurations);
        Ok(())
    }

    fn close_session(&self) {
        if let Ok(mut snapshot) = self.snapshot.lock() {
            *snapshot = None;
        }
    }

    fn ip_enabled_configurations(&self) -> Result<Vec<LiveConfiguration>> {
        self.lock()?
            .clone()
            .ok_or_else(|| RepairError::Management("no open management session".into()))
    }

    fn set_dns_search_order_automatic(&self, config: &LiveConfiguration) -> Result<u32> {
        let script = format!(
            "Invoke-CimMethod -Query \"SELECT * FROM Win32_NetworkAdapterConfiguration WHERE Index = {}\" \
             -MethodName SetDNSServerSearchOrder | Select-Object -ExpandProperty ReturnValue",
            config.index
        );
        let stdout = self.powershell(&script)?;
        stdout.trim().parse::<u32>().map_err(|_| {
            RepairError::Management(format!("unexpected result from SetDNSServerSearchOrder: {:?}", stdout.trim()))
        })
    }
}

/// ConvertTo-Json emits a bare object for one result and nothing for none
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<LiveConfiguration>),
    One(LiveConfiguration),
}

pub fn parse_configurations(json: &str) -> Result<Vec<LiveConfiguration>> {
    let json = json.trim();
    if json.is_empty() {
        return Ok(Vec::new());
    }

    Ok(match serde_json::from_str::<OneOrMany>(json)? {
        OneOrMany::Many(list) => list,
        OneOrMany::One(single) => vec![single],
    })
}
