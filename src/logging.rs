//! WC-014: Diagnostic logging setup.
//!
//! Silent unless asked. The level comes from `WEBCHEF_LOGLEVEL`, or from the
//! `WEBCHEF_INFO=1` / `WEBCHEF_DEBUG=1` shortcuts (INFO wins when both are
//! set). `WEBCHEF_LOGFILE` redirects output to a file opened for append.
//! `RUST_LOG`, when set, overrides the computed filter.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const ENV_LOGLEVEL: &str = "WEBCHEF_LOGLEVEL";
pub const ENV_INFO: &str = "WEBCHEF_INFO";
pub const ENV_DEBUG: &str = "WEBCHEF_DEBUG";
pub const ENV_LOGFILE: &str = "WEBCHEF_LOGFILE";

/// Map the logging environment to a tracing level name; `None` means off.
pub fn resolve_level(
    loglevel: Option<&str>,
    info: Option<&str>,
    debug: Option<&str>,
    verbose: bool,
) -> Option<&'static str> {
    if verbose {
        return Some("debug");
    }
    if let Some(level) = loglevel {
        return match level.trim().to_ascii_lowercase().as_str() {
            "error" => Some("error"),
            "warn" | "warning" => Some("warn"),
            "info" => Some("info"),
            "debug" => Some("debug"),
            "trace" | "verbose" | "silly" => Some("trace"),
            _ => None,
        };
    }
    if info == Some("1") {
        return Some("info");
    }
    if debug == Some("1") {
        return Some("debug");
    }
    None
}

/// Install the global subscriber. Does nothing when logging is off.
pub fn init(verbose: bool) -> Result<(), String> {
    let var = |name: &str| std::env::var(name).ok();
    let level = resolve_level(
        var(ENV_LOGLEVEL).as_deref(),
        var(ENV_INFO).as_deref(),
        var(ENV_DEBUG).as_deref(),
        verbose,
    );
    let Some(level) = level else {
        return Ok(());
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match var(ENV_LOGFILE) {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(Path::new(&path))
                .map_err(|e| format!("cannot open log file {}: {}", path, e))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| e.to_string())
        }
        None => builder
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| e.to_string()),
    }
}
