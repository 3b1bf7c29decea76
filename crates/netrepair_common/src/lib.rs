//! netrepair common - repair components and the sequencer that drives them
//!
//! Everything that touches the network configuration lives here; the
//! `netrepair` binary only adds presentation, logging setup and the exit
//! timer around [`sequencer::RepairSequencer`].

pub mod adapter;
pub mod command_exec;
pub mod config;
pub mod configurator;
pub mod dns_reset;
pub mod error;
pub mod events;
pub mod inspector;
pub mod privilege;
pub mod refresher;
pub mod sequencer;
pub mod steps;
pub mod testing;

pub use adapter::{Adapter, AdapterEnumerator, IpconfigEnumerator};
pub use command_exec::{CommandOutput, CommandRunner, SystemRunner};
pub use config::RepairConfig;
pub use configurator::{AdapterConfigurator, NetshConfigurator};
pub use dns_reset::{CimManagement, DnsResetter, ManagementDnsResetter, ManagementInterface};
pub use error::{RepairError, Result};
pub use events::{ChannelSink, EventSink, MemorySink, RepairEvent};
pub use inspector::{IpconfigInspector, NetworkInspector};
pub use privilege::{authorize, Authorization, PrivilegeGuard, SystemPrivilegeGuard, RELAUNCH_MARKER};
pub use refresher::{CommandRefresher, NetworkRefresher};
pub use sequencer::{RepairComponents, RepairSequencer, RunReport, StartResult};
pub use steps::{RunOutcome, Step, StepBoard, StepOutcome, StepState};
