//! Configuration loading through the command line

use clap::Parser;
use netrepair::app;
use netrepair::cli::Cli;
use netrepair_common::config::ColorMode;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn file_values_and_flag_override() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("netrepair.toml");
    fs::write(
        &path,
        "[timing]\nexit_delay_secs = 30\nrenegotiation_pause_secs = 2\n\n[output]\ncolor = \"never\"\n",
    )
    .unwrap();

    let cli = Cli::try_parse_from(["netrepair", "--config", path.to_str().unwrap()]).unwrap();
    let config = app::load_config(&cli).unwrap();
    assert_eq!(config.timing.exit_delay(), Duration::from_secs(30));
    assert_eq!(config.timing.renegotiation_pause(), Duration::from_secs(2));
    assert_eq!(config.output.color, ColorMode::Never);

    let cli = Cli::try_parse_from([
        "netrepair",
        "--config",
        path.to_str().unwrap(),
        "--exit-delay",
        "5",
    ])
    .unwrap();
    let config = app::load_config(&cli).unwrap();
    assert_eq!(config.timing.exit_delay(), Duration::from_secs(5));
}

#[test]
fn malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[timing\nexit_delay_secs = ").unwrap();

    let cli = Cli::try_parse_from(["netrepair", "--config", path.to_str().unwrap()]).unwrap();
    let err = app::load_config(&cli).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to load configuration"));
}
