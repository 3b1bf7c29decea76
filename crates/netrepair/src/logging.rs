//! Diagnostic logging setup
//!
//! Diagnostics go to stderr through `tracing`; the repair log itself is
//! rendered by the presenter on stdout.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive
pub const LOG_ENV: &str = "NETREPAIR_LOG";

/// Pick the filter directive: the environment wins, then `--verbose`
pub fn filter_directive(verbose: bool, env: Option<&str>) -> String {
    match env {
        Some(directive) if !directive.trim().is_empty() => directive.trim().to_string(),
        _ if verbose => "debug".to_string(),
        _ => "warn".to_string(),
    }
}

pub fn init(verbose: bool) {
    let env = std::env::var(LOG_ENV).ok();
    let directive = filter_directive(verbose, env.as_deref());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));

    // A second init (tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive_precedence() {
        assert_eq!(filter_directive(false, None), "warn");
        assert_eq!(filter_directive(true, None), "debug");
        assert_eq!(filter_directive(true, Some("netrepair_common=trace")), "netrepair_common=trace");
        assert_eq!(filter_directive(false, Some("  ")), "warn");
    }
}
