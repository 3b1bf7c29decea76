//! Command-line flags. All optional: no arguments runs the repair.

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "netrepair")]
#[command(about = "Reset Ethernet adapters to DHCP and refresh the network stack", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file to load
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug-level diagnostic logging on stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not close automatically after the run; wait for Ctrl+C
    #[arg(long)]
    pub stay_open: bool,

    /// Seconds to wait before closing after the run
    #[arg(long, value_name = "SECS")]
    pub exit_delay: Option<u64>,

    /// Write the default configuration to the user config path and exit
    #[arg(long)]
    pub write_default_config: bool,

    /// Set on the copy started by an elevation relaunch
    #[arg(long = "elevated-relaunch", hide = true)]
    pub elevated_relaunch: bool,
}
