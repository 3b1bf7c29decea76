//! netrepair - one-shot repair of wired network connectivity
//!
//! The repair itself lives in `netrepair_common`; this crate renders it on
//! the terminal and owns the process lifecycle around it.

pub mod app;
pub mod cli;
pub mod exit_timer;
pub mod logging;
pub mod presenter;
