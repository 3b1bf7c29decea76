//! Ethernet adapter discovery
//!
//! Parses `ipconfig /all` into [`Adapter`] records. The listing is read
//! line by line with a "current adapter" cursor: an `Ethernet adapter <name>:`
//! header opens a record, the following `Description` line completes it.
//! English and Chinese Windows output are both recognised.

use crate::command_exec::CommandRunner;
use crate::config::DEFAULT_ETHERNET_TOKENS;
use crate::error::{RepairError, Result};
use crate::events::EventSink;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Section headers that open an Ethernet adapter block
const ETHERNET_HEADERS: &[&str] = &["Ethernet adapter", "以太网适配器"];

/// Property labels carrying the adapter description
const DESCRIPTION_LABELS: &[&str] = &["Description", "描述"];

/// A network adapter as reported by the OS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adapter {
    /// Connection name, unique within a run
    pub name: String,
    /// Hardware description; the join key for the management interface
    pub description: String,
}

impl Adapter {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Discovers Ethernet-class adapters
pub trait AdapterEnumerator: Send + Sync {
    /// Returns every qualifying adapter in listing order. An empty result is
    /// not an error here; the caller decides what it means for the run.
    fn enumerate(&self, sink: &dyn EventSink) -> Result<Vec<Adapter>>;
}

/// Enumerates adapters by parsing `ipconfig /all`
pub struct IpconfigEnumerator<R> {
    runner: R,
    tokens: Vec<String>,
}

impl<R: CommandRunner> IpconfigEnumerator<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            tokens: DEFAULT_ETHERNET_TOKENS.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Replace the Ethernet-indicating name tokens
    pub fn with_tokens(mut self, tokens: Vec<String>) -> Self {
        self.tokens = tokens;
        self
    }
}

impl<R: CommandRunner> AdapterEnumerator for IpconfigEnumerator<R> {
    fn enumerate(&self, sink: &dyn EventSink) -> Result<Vec<Adapter>> {
        sink.log("Getting Ethernet adapter information...");

        let output = self
            .runner
            .run("ipconfig", &["/all"])
            .map_err(|e| RepairError::Enumeration(e.to_string()))?;

        debug!(exit_code = output.exit_code, "ipconfig /all finished");

        let adapters = parse_adapter_listing(&output.stdout, &self.tokens);
        for adapter in &adapters {
            info!(adapter = %adapter.name, description = %adapter.description, "found adapter");
            sink.log(&format!(
                "  📡 Found adapter: {} ({})",
                adapter.name, adapter.description
            ));
        }

        Ok(adapters)
    }
}

/// Parse an adapter listing into the adapters whose names carry one of
/// `tokens` (case-insensitive).
pub fn parse_adapter_listing(output: &str, tokens: &[String]) -> Vec<Adapter> {
    let mut adapters: Vec<Adapter> = Vec::new();
    let mut current: Option<String> = None;

    for raw in output.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if is_section_header(raw) {
            current = ethernet_header_name(line);
            continue;
        }

        let Some(name) = current.as_deref() else {
            continue;
        };

        if let Some(description) = description_value(line) {
            if is_ethernet_name(name, tokens) && !adapters.iter().any(|a| a.name == name) {
                adapters.push(Adapter::new(name, description));
            }
            // One description per block
            current = None;
        }
    }

    adapters
}

/// Whether an adapter name carries an Ethernet-indicating token
pub fn is_ethernet_name(name: &str, tokens: &[String]) -> bool {
    let lowered = name.to_lowercase();
    tokens
        .iter()
        .any(|token| lowered.contains(&token.to_lowercase()))
}

/// Section headers start at column 0 and end with a colon
fn is_section_header(raw: &str) -> bool {
    let starts_flush = raw.chars().next().map_or(false, |c| !c.is_whitespace());
    starts_flush && raw.trim_end().ends_with(':')
}

fn ethernet_header_name(line: &str) -> Option<String> {
    ETHERNET_HEADERS.iter().find_map(|header| {
        line.strip_prefix(header)
            .map(|rest| rest.replace(':', "").trim().to_string())
            .filter(|name| !name.is_empty())
    })
}

fn description_value(line: &str) -> Option<String> {
    if !DESCRIPTION_LABELS.iter().any(|label| line.starts_with(label)) {
        return None;
    }
    line.split_once(':')
        .map(|(_, value)| value.trim().to_string())
}
