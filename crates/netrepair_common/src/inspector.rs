//! Final configuration report
//!
//! Returns the raw `ipconfig /all` text for display. No parsing happens
//! here; see [`crate::adapter`] for the structured read of the same output.

use crate::command_exec::CommandRunner;
use crate::error::{RepairError, Result};

pub trait NetworkInspector: Send + Sync {
    fn report(&self) -> Result<String>;
}

pub struct IpconfigInspector<R> {
    runner: R,
}

impl<R: CommandRunner> IpconfigInspector<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> NetworkInspector for IpconfigInspector<R> {
    fn report(&self) -> Result<String> {
        let output = self
            .runner
            .run("ipconfig", &["/all"])
            .map_err(|e| RepairError::Inspection(e.to_string()))?;

        if !output.success() {
            return Err(RepairError::Inspection(format!(
                "ipconfig /all exited with {}",
                output.exit_code
            )));
        }

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    #[test]
    fn test_report_returns_raw_output() {
        let listing = "Windows IP Configuration\r\n\r\n   Host Name . . . : PC\r\n";
        let runner = ScriptedRunner::new().respond("ipconfig /all", 0, listing, "");

        assert_eq!(IpconfigInspector::new(&runner).report().unwrap(), listing);
    }

    #[test]
    fn test_nonzero_exit_is_inspection_error() {
        let runner = ScriptedRunner::new().respond("ipconfig /all", 1, "partial", "");

        let err = IpconfigInspector::new(&runner).report().unwrap_err();
        assert!(matches!(err, RepairError::Inspection(_)));
    }
}
