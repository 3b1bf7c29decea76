//! Elevation gate
//!
//! Mutating steps need administrator rights. [`authorize`] checks the
//! current process and, if it is not elevated, asks the guard to start an
//! elevated copy of itself. The copy is started with [`RELAUNCH_MARKER`]
//! and never relaunches again, so a check that keeps failing cannot loop.

use crate::command_exec::CommandRunner;
use crate::error::{RepairError, Result};
use crate::events::EventSink;
use tracing::{info, warn};

/// Argument passed to the elevated copy started by a relaunch
pub const RELAUNCH_MARKER: &str = "--elevated-relaunch";

pub trait PrivilegeGuard: Send + Sync {
    fn is_elevated(&self) -> bool;

    /// Whether this process is itself the product of a relaunch
    fn is_relaunched_instance(&self) -> bool {
        false
    }

    /// Start an elevated instance of this program. `Ok(true)` means the new
    /// instance was launched and this one should step aside.
    fn relaunch_elevated(&self) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// Already elevated; the run may start
    Elevated,
    /// An elevated copy was started; this instance should exit
    Relaunched,
    /// Elevation unavailable or refused; the run must not start
    Refused,
}

pub fn authorize(guard: &dyn PrivilegeGuard, sink: &dyn EventSink) -> Authorization {
    if guard.is_elevated() {
        info!("running elevated");
        sink.log("Administrator privileges acquired, starting automatic network repair...");
        return Authorization::Elevated;
    }

    if guard.is_relaunched_instance() {
        warn!("relaunched instance is not elevated");
        sink.log("❌ Elevated instance still lacks administrator privileges, repair not started.");
        return Authorization::Refused;
    }

    sink.log("Administrator privileges are required, requesting elevation...");
    match guard.relaunch_elevated() {
        Ok(true) => {
            info!("elevated instance launched");
            sink.log("Elevated instance started, this window will close shortly.");
            Authorization::Relaunched
        }
        Ok(false) => {
            warn!("elevation declined");
            sink.log("❌ Could not obtain administrator privileges, repair not started.");
            Authorization::Refused
        }
        Err(e) => {
            warn!(error = %e, "elevation failed");
            sink.log(&format!("❌ Failed to request administrator privileges: {}", e));
            Authorization::Refused
        }
    }
}

/// Guard for the real process
pub struct SystemPrivilegeGuard<R> {
    runner: R,
    relaunched: bool,
}

impl<R: CommandRunner> SystemPrivilegeGuard<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            relaunched: false,
        }
    }

    /// Mark this process as started by [`PrivilegeGuard::relaunch_elevated`]
    pub fn with_relaunched(mut self, relaunched: bool) -> Self {
        self.relaunched = relaunched;
        self
    }
}

/// Elevation flag of the current process token, `None` if the token could
/// not be queried
#[cfg(windows)]
fn token_elevation() -> Option<bool> {
    use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
    use windows_sys::Win32::Security::{
        GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY,
    };
    use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    // SAFETY: the token handle is only used after OpenProcessToken succeeds
    // and is closed before returning; the buffer is a TOKEN_ELEVATION of the
    // size passed.
    unsafe {
        let mut token: HANDLE = std::mem::zeroed();
        if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) == 0 {
            return None;
        }

        let mut elevation = TOKEN_ELEVATION { TokenIsElevated: 0 };
        let mut returned = 0u32;
        let ok = GetTokenInformation(
            token,
            TokenElevation,
            &mut elevation as *mut TOKEN_ELEVATION as *mut std::ffi::c_void,
            std::mem::size_of::<TOKEN_ELEVATION>() as u32,
            &mut returned,
        );
        CloseHandle(token);

        if ok == 0 {
            None
        } else {
            Some(elevation.TokenIsElevated != 0)
        }
    }
}

#[cfg(windows)]
impl<R: CommandRunner> PrivilegeGuard for SystemPrivilegeGuard<R> {
    fn is_elevated(&self) -> bool {
        if let Some(elevated) = token_elevation() {
            return elevated;
        }

        warn!("token elevation query failed, falling back to net session");
        // `net session` is refused for non-elevated tokens
        self.runner
            .run("net", &["session"])
            .map(|output| output.success())
            .unwrap_or(false)
    }

    fn is_relaunched_instance(&self) -> bool {
        self.relaunched
    }

    fn relaunch_elevated(&self) -> Result<bool> {
        let exe = std::env::current_exe()?;
        let mut args: Vec<String> = std::env::args()
            .skip(1)
            .filter(|arg| arg != RELAUNCH_MARKER)
            .collect();
        args.push(RELAUNCH_MARKER.to_string());

        let script = format!(
            "Start-Process -FilePath '{}' -Verb RunAs -ArgumentList '{}'",
            escape_single_quoted(&exe.display().to_string()),
            escape_single_quoted(&args.join(" "))
        );

        let output = self
            .runner
            .run("powershell", &["-NoProfile", "-NonInteractive", "-Command", &script])
            .map_err(|e| RepairError::Privilege(e.to_string()))?;

        Ok(output.success())
    }
}

#[cfg(not(windows))]
impl<R: CommandRunner> PrivilegeGuard for SystemPrivilegeGuard<R> {
    fn is_elevated(&self) -> bool {
        #[cfg(unix)]
        {
            unsafe { libc::geteuid() == 0 }
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    fn is_relaunched_instance(&self) -> bool {
        self.relaunched
    }

    fn relaunch_elevated(&self) -> Result<bool> {
        let _ = &self.runner;
        Ok(false)
    }
}

/// Escape a value for a PowerShell single-quoted string
#[cfg_attr(not(windows), allow(dead_code))]
fn escape_single_quoted(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::testing::FakeGuard;

    #[test]
    fn test_elevated_proceeds() {
        let guard = FakeGuard::elevated();
        let sink = MemorySink::new();

        assert_eq!(authorize(&guard, &sink), Authorization::Elevated);
        assert_eq!(guard.relaunch_attempts(), 0);
        assert!(sink.contains("Administrator privileges acquired"));
    }

    #[test]
    fn test_relaunch_success() {
        let guard = FakeGuard::not_elevated(Ok(true));
        let sink = MemorySink::new();

        assert_eq!(authorize(&guard, &sink), Authorization::Relaunched);
        assert_eq!(guard.relaunch_attempts(), 1);
    }

    #[test]
    fn test_relaunch_declined_or_failed() {
        let sink = MemorySink::new();

        let declined = FakeGuard::not_elevated(Ok(false));
        assert_eq!(authorize(&declined, &sink), Authorization::Refused);

        let failed = FakeGuard::not_elevated(Err("UAC prompt dismissed".into()));
        assert_eq!(authorize(&failed, &sink), Authorization::Refused);
        assert!(sink.contains("UAC prompt dismissed"));
    }

    #[test]
    fn test_relaunched_instance_never_relaunches_again() {
        let guard = FakeGuard::relaunched_instance();
        let sink = MemorySink::new();

        assert_eq!(authorize(&guard, &sink), Authorization::Refused);
        assert_eq!(guard.relaunch_attempts(), 0);
        assert!(sink.contains("Elevated instance still lacks administrator privileges"));
    }

    #[test]
    fn test_elevated_relaunched_instance_runs() {
        let guard = FakeGuard::elevated().as_relaunched_instance();
        let sink = MemorySink::new();

        assert_eq!(authorize(&guard, &sink), Authorization::Elevated);
        assert_eq!(guard.relaunch_attempts(), 0);
    }

    #[test]
    fn test_system_guard_reports_relaunch_marker() {
        let runner = crate::testing::ScriptedRunner::new();
        assert!(!SystemPrivilegeGuard::new(&runner).is_relaunched_instance());
        assert!(SystemPrivilegeGuard::new(&runner)
            .with_relaunched(true)
            .is_relaunched_instance());
    }

    #[test]
    fn test_escape_single_quoted() {
        assert_eq!(escape_single_quoted(r"C:\O'Brien\netrepair.exe"), r"C:\O''Brien\netrepair.exe");
    }
}
