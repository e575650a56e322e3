//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--silent`, `--quiet` or `--verbose` on the command line
//! 2. `ASSETFLOW_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`

use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt;

/// Environment variable consulted when no verbosity flag is given
pub const LOG_ENV: &str = "ASSETFLOW_LOG";

/// Output verbosity selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only; no run summary
    Silent,
    /// Only warnings and errors
    Quiet,
    /// Default output
    #[default]
    Normal,
    /// Debug output
    Verbose,
}

/// Install the global subscriber; call once at startup
pub fn init_logging(verbosity: Verbosity) {
    let level = match verbosity {
        Verbosity::Normal => std::env::var(LOG_ENV)
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(LevelFilter::INFO),
        other => level_for(other),
    };

    fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn level_for(verbosity: Verbosity) -> LevelFilter {
    match verbosity {
        Verbosity::Silent => LevelFilter::ERROR,
        Verbosity::Quiet => LevelFilter::WARN,
        Verbosity::Normal => LevelFilter::INFO,
        Verbosity::Verbose => LevelFilter::DEBUG,
    }
}

fn parse_level_str(s: &str) -> Option<LevelFilter> {
    match s.trim().to_lowercase().as_str() {
        "off" => Some(LevelFilter::OFF),
        "error" => Some(LevelFilter::ERROR),
        "warn" | "warning" => Some(LevelFilter::WARN),
        "info" => Some(LevelFilter::INFO),
        "debug" => Some(LevelFilter::DEBUG),
        "trace" => Some(LevelFilter::TRACE),
        _ => None,
    }
}
