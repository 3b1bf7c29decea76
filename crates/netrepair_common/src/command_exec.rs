//! Command execution layer
//!
//! Every OS tool the repair run touches (ipconfig, netsh, reg, powershell)
//! goes through [`CommandRunner`]. The layer captures exit code, stdout,
//! stderr and duration and does NOT interpret them; callers decide what
//! counts as failure.
//!
//! Console tools on Windows write in the OEM code page (CP936 on Chinese
//! systems), not UTF-8. Output that is not valid UTF-8 is decoded with
//! that code page.

use crate::error::{RepairError, Result};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::process::Command;
use std::time::Instant;
use tracing::debug;

/// Maximum output length to capture per stream
const MAX_OUTPUT_BYTES: usize = 256 * 1024;

/// `CREATE_NO_WINDOW` process creation flag
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Captured result of one external command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Program that was executed
    pub program: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Exit code (-1 when terminated by a signal)
    pub exit_code: i32,
    /// Decoded stdout (truncated if too long)
    pub stdout: String,
    /// Decoded stderr (truncated if too long)
    pub stderr: String,
    /// Execution duration
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Build an output record without running anything
    pub fn new(program: &str, args: &[&str], exit_code: i32) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// True when the tool wrote something meaningful to stderr
    pub fn has_diagnostic(&self) -> bool {
        !self.stderr.trim().is_empty()
    }

    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Seam over process execution so repair components can run against fakes
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion.
    ///
    /// Returns `Err` only when the process could not be started; a process
    /// that started and exited non-zero is still `Ok`.
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        (**self).run(program, args)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for std::sync::Arc<R> {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        (**self).run(program, args)
    }
}

/// Runs commands on the real system with console windows suppressed
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(program: &str, args: &[&str]) -> Command {
        let mut command = Command::new(program);
        command.args(args);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        command
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let start = Instant::now();

        let output = Self::command(program, args)
            .output()
            .map_err(|source| RepairError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let result = CommandOutput {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: decode_output(&output.stdout),
            stderr: decode_output(&output.stderr),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        debug!(
            command = %result.command_line(),
            exit_code = result.exit_code,
            duration_ms = result.duration_ms,
            "command finished"
        );

        Ok(result)
    }
}

/// Encoding console tools fall back to when they do not write UTF-8
pub fn console_encoding() -> &'static Encoding {
    #[cfg(windows)]
    {
        // SAFETY: GetOEMCP has no arguments or preconditions
        let code_page = unsafe { windows_sys::Win32::Globalization::GetOEMCP() };
        if let Some(encoding) = u16::try_from(code_page).ok().and_then(codepage::to_encoding) {
            return encoding;
        }
    }
    encoding_rs::UTF_8
}

fn decode_output(bytes: &[u8]) -> String {
    decode_console_output(bytes, console_encoding())
}

/// Decode captured output: UTF-8 when it is valid UTF-8, `fallback`
/// otherwise. Output is capped at `MAX_OUTPUT_BYTES`.
pub fn decode_console_output(bytes: &[u8], fallback: &'static Encoding) -> String {
    let truncated = bytes.len() > MAX_OUTPUT_BYTES;
    let slice = if truncated {
        &bytes[..MAX_OUTPUT_BYTES]
    } else {
        bytes
    };

    match std::str::from_utf8(slice) {
        Ok(text) => text.to_string(),
        // Only the cap cut a character short
        Err(e) if truncated && e.error_len().is_none() => {
            String::from_utf8_lossy(&slice[..e.valid_up_to()]).into_owned()
        }
        Err(_) => {
            let (text, _, had_errors) = fallback.decode(slice);
            if had_errors {
                debug!(encoding = fallback.name(), "undecodable bytes in command output");
            }
            text.into_owned()
        }
    }
}
