//! Logging Configuration
//!
//! The transport crates log through the `log` facade; the subscriber
//! installed here picks those records up as well.

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_LEVEL_ENV: &str = "OFFICE_LOG_LEVEL";

// socket plumbing stays quiet unless explicitly asked for
const QUIET_DEPENDENCIES: &str = "tungstenite=warn,tokio_tungstenite=warn,rustls=warn";

pub fn parse_log_level(value: &str) -> Option<log::LevelFilter> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some(log::LevelFilter::Trace),
        "debug" => Some(log::LevelFilter::Debug),
        "info" => Some(log::LevelFilter::Info),
        "warn" => Some(log::LevelFilter::Warn),
        "error" => Some(log::LevelFilter::Error),
        "off" => Some(log::LevelFilter::Off),
        _ => None,
    }
}

pub fn level_to_str(level: log::LevelFilter) -> &'static str {
    match level {
        log::LevelFilter::Trace => "trace",
        log::LevelFilter::Debug => "debug",
        log::LevelFilter::Info => "info",
        log::LevelFilter::Warn => "warn",
        log::LevelFilter::Error => "error",
        log::LevelFilter::Off => "off",
    }
}

fn default_level(verbose: bool) -> log::LevelFilter {
    if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    }
}

pub fn resolve_level(env_value: Option<&str>, verbose: bool) -> log::LevelFilter {
    match env_value {
        Some(val) => parse_log_level(val).unwrap_or_else(|| {
            eprintln!(
                "Warning: Invalid {} '{}', falling back to default",
                LOG_LEVEL_ENV, val
            );
            default_level(verbose)
        }),
        None => default_level(verbose),
    }
}

/// Installs the global subscriber. Log lines go to stderr so stdout stays
/// reserved for the event feed.
pub fn init(verbose: bool) -> log::LevelFilter {
    let env_value = std::env::var(LOG_LEVEL_ENV).ok();
    let level = resolve_level(env_value.as_deref(), verbose);

    let filter = EnvFilter::new(format!("{},{}", level_to_str(level), QUIET_DEPENDENCIES));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    level
}
