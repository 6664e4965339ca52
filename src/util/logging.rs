//! Structured logging setup for manifest-dispatch
//!
//! Logs always go to stderr so that a report written to stdout stays a
//! single clean document.
//!
//! # Features
//!
//! - Console output with compact formatting (default)
//! - Optional JSON output for log collectors
//! - `RUST_LOG` overrides every other setting
//! - Thread-safe, can only be initialized once
//!
//! # Example
//!
//! ```no_run
//! use manifest_dispatch::util::logging;
//!
//! logging::init_from_env();
//!
//! use tracing::{info, warn};
//! info!("Application started");
//! warn!(ecosystem = "npm", "Handler timed out");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Ensures logging is only initialized once
static INIT: Once = Once::new();

/// Target prefix of every event emitted by this crate.
pub const LOG_TARGET: &str = "manifest_dispatch";

pub const LOG_LEVEL_ENV: &str = "MANIFEST_DISPATCH_LOG_LEVEL";
pub const LOG_JSON_ENV: &str = "MANIFEST_DISPATCH_LOG_JSON";

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level for this crate's events
    pub level: Level,

    /// Use JSON output format
    pub use_json: bool,

    /// Include the module target (e.g., manifest_dispatch::runner) in logs
    pub include_target: bool,

    /// Include thread ID and name in logs
    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    /// Defaults: INFO, plain text, targets on, thread IDs off.
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Reads `MANIFEST_DISPATCH_LOG_LEVEL` and `MANIFEST_DISPATCH_LOG_JSON`.
    pub fn from_env() -> Self {
        let level = env::var(LOG_LEVEL_ENV)
            .map(|s| parse_level(&s))
            .unwrap_or(Level::INFO);

        let use_json = env::var(LOG_JSON_ENV)
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        Self {
            level,
            use_json,
            // Worker threads matter once handlers run concurrently.
            include_thread_ids: use_json,
            ..Default::default()
        }
    }

    /// Applies command-line overrides: an explicit level wins, then
    /// `verbose` (DEBUG), then `quiet` (ERROR).
    pub fn with_overrides(mut self, log_level: Option<&str>, verbose: bool, quiet: bool) -> Self {
        if let Some(level) = log_level {
            self.level = parse_level(level);
        } else if verbose {
            self.level = Level::DEBUG;
        } else if quiet {
            self.level = Level::ERROR;
        }
        self
    }

    /// The filter used when `RUST_LOG` is not set.
    pub fn default_directives(&self) -> String {
        format!("warn,{}={}", LOG_TARGET, self.level)
    }
}

/// Parses a log level from a string
///
/// # Example
///
/// ```
/// use manifest_dispatch::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("debug"), Level::DEBUG);
/// assert_eq!(parse_level("INFO"), Level::INFO);
/// assert_eq!(parse_level("invalid"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

/// Initializes the logging system with the provided configuration
///
/// Only the first call has any effect.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = match env::var("RUST_LOG") {
            Ok(_) => EnvFilter::from_default_env(),
            Err(_) => EnvFilter::new(config.default_directives()),
        };

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_thread_ids(config.include_thread_ids)
                        .with_thread_names(config.include_thread_ids),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_thread_ids(config.include_thread_ids)
                        .with_thread_names(config.include_thread_ids),
                )
                .init();
        }
    });
}

/// Initializes logging from environment variables
pub fn init_from_env() {
    init_logging(LoggingConfig::from_env());
}
