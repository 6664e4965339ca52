//! Engine configuration
//!
//! Settings come from three layers: built-in defaults, then environment
//! variables, then command-line flags (applied by the CLI).
//!
//! # Environment Variables
//!
//! - `MANIFEST_DISPATCH_CONFIG`: handler catalog path - default: installed or built-in catalog
//! - `MANIFEST_DISPATCH_PARALLELISM`: concurrent handlers - default: hardware threads
//! - `MANIFEST_DISPATCH_TIMEOUT_MS`: per-handler timeout - default: "60000"
//! - `MANIFEST_DISPATCH_MAX_OUTPUT_BYTES`: stdout ceiling - default: "16777216" (16 MiB)
//! - `MANIFEST_DISPATCH_PASS_ENV`: comma separated variables passed to handlers
//! - `MANIFEST_DISPATCH_LOG_LEVEL`: logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use manifest_dispatch::EngineConfig;
//!
//! let config = EngineConfig::from_env().expect("invalid environment");
//! config.validate().expect("Invalid configuration");
//! println!("{}", config);
//! ```

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::registry::catalog::CONFIG_ENV;
use crate::runner::{
    RunnerLimits, DEFAULT_GRACE_PERIOD, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_STDERR_LIMIT,
};
use crate::scan::{WalkConfig, DEFAULT_EXCLUDED_DIRS};
use crate::util::logging::LOG_LEVEL_ENV;

pub const PARALLELISM_ENV: &str = "MANIFEST_DISPATCH_PARALLELISM";
pub const TIMEOUT_ENV: &str = "MANIFEST_DISPATCH_TIMEOUT_MS";
pub const MAX_OUTPUT_ENV: &str = "MANIFEST_DISPATCH_MAX_OUTPUT_BYTES";
pub const PASS_ENV_ENV: &str = "MANIFEST_DISPATCH_PASS_ENV";

const DEFAULT_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_LOG_LEVEL: &str = "info";
const MAX_PARALLELISM: usize = 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Explicit catalog path. `None` means the installed or built-in catalog.
    pub config_path: Option<PathBuf>,

    /// Directory basenames pruned from the walk.
    pub exclude_dirs: Vec<String>,

    /// Ecosystems removed from the registry for this run.
    pub disabled: Vec<String>,

    /// Maximum number of handlers running at once.
    pub parallelism: usize,

    /// Default handler timeout in milliseconds.
    pub timeout_ms: u64,

    pub grace_period_ms: u64,

    /// Ceiling on captured stdout per handler.
    pub max_output_bytes: usize,

    pub stderr_limit: usize,

    /// Environment variables passed through to handlers besides `PATH`.
    pub pass_env: Vec<String>,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for EngineConfig {
    /// Built-in defaults, ignoring the environment.
    fn default() -> Self {
        Self {
            config_path: None,
            exclude_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|d| d.to_string()).collect(),
            disabled: Vec::new(),
            parallelism: default_parallelism(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            grace_period_ms: DEFAULT_GRACE_PERIOD.as_millis() as u64,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            stderr_limit: DEFAULT_STDERR_LIMIT,
            pass_env: Vec::new(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `MANIFEST_DISPATCH_*` variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` when a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            config.config_path = Some(PathBuf::from(path));
        }
        if let Some(parallelism) = parse_env(PARALLELISM_ENV)? {
            config.parallelism = parallelism;
        }
        if let Some(timeout_ms) = parse_env(TIMEOUT_ENV)? {
            config.timeout_ms = timeout_ms;
        }
        if let Some(max_output_bytes) = parse_env(MAX_OUTPUT_ENV)? {
            config.max_output_bytes = max_output_bytes;
        }
        if let Ok(list) = env::var(PASS_ENV_ENV) {
            config.pass_env = split_list(&list);
        }
        if let Ok(level) = env::var(LOG_LEVEL_ENV) {
            config.log_level = level.to_lowercase();
        }

        Ok(config)
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any validation fails
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 {
            return Err(ConfigError::ValidationFailed(
                "Parallelism must be at least 1".to_string(),
            ));
        }
        if self.parallelism > MAX_PARALLELISM {
            return Err(ConfigError::ValidationFailed(format!(
                "Parallelism cannot exceed {}",
                MAX_PARALLELISM
            )));
        }

        if self.timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "Timeout must be at least 1 ms".to_string(),
            ));
        }

        if self.max_output_bytes == 0 {
            return Err(ConfigError::ValidationFailed(
                "Output ceiling must be at least 1 byte".to_string(),
            ));
        }

        if let Some(dir) = self
            .exclude_dirs
            .iter()
            .find(|d| d.is_empty() || d.contains('/'))
        {
            return Err(ConfigError::ValidationFailed(format!(
                "Excluded directory must be a plain name: '{}'",
                dir
            )));
        }

        if let Some(name) = self
            .pass_env
            .iter()
            .find(|n| n.is_empty() || n.contains('='))
        {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid environment variable name: '{}'",
                name
            )));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn walk_config(&self) -> WalkConfig {
        WalkConfig {
            exclude_dirs: self.exclude_dirs.clone(),
        }
    }

    pub fn runner_limits(&self) -> RunnerLimits {
        RunnerLimits {
            default_timeout: Duration::from_millis(self.timeout_ms),
            grace_period: Duration::from_millis(self.grace_period_ms),
            max_output_bytes: self.max_output_bytes,
            stderr_limit: self.stderr_limit,
            pass_env: self.pass_env.clone(),
        }
    }
}

impl fmt::Display for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Engine Configuration:")?;
        match &self.config_path {
            Some(path) => writeln!(f, "  Catalog: {}", path.display())?,
            None => writeln!(f, "  Catalog: <default>")?,
        }
        writeln!(f, "  Excluded Dirs: {}", self.exclude_dirs.join(", "))?;
        if !self.disabled.is_empty() {
            writeln!(f, "  Disabled: {}", self.disabled.join(", "))?;
        }
        writeln!(f, "  Parallelism: {}", self.parallelism)?;
        writeln!(f, "  Timeout: {}ms", self.timeout_ms)?;
        writeln!(f, "  Max Output: {} bytes", self.max_output_bytes)?;
        if !self.pass_env.is_empty() {
            writeln!(f, "  Pass Env: {}", self.pass_env.join(", "))?;
        }
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

/// Hardware threads, or 1 when that cannot be determined. Never above the
/// validated maximum.
pub fn default_parallelism() -> usize {
    clamp_parallelism(
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    )
}

fn clamp_parallelism(threads: usize) -> usize {
    threads.clamp(1, MAX_PARALLELISM)
}

fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<T>()
                .map(Some)
                .map_err(|err| ConfigError::ParseError {
                    field: key.to_string(),
                    error: err.to_string(),
                })
        }
        _ => Ok(None),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    fn clear_env() -> Vec<EnvGuard> {
        [
            CONFIG_ENV,
            PARALLELISM_ENV,
            TIMEOUT_ENV,
            MAX_OUTPUT_ENV,
            PASS_ENV_ENV,
            LOG_LEVEL_ENV,
        ]
        .iter()
        .map(|key| EnvGuard::unset(key))
        .collect()
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = clear_env();

        let config = EngineConfig::from_env().unwrap();

        assert_eq!(config.config_path, None);
        assert_eq!(config.exclude_dirs, vec![".git", ".hg", ".svn"]);
        assert_eq!(config.parallelism, default_parallelism());
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.max_output_bytes, 16 * 1024 * 1024);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _cleared = clear_env();
        let _guards = vec![
            EnvGuard::set(CONFIG_ENV, "/etc/handlers.yaml"),
            EnvGuard::set(PARALLELISM_ENV, "3"),
            EnvGuard::set(TIMEOUT_ENV, "2500"),
            EnvGuard::set(MAX_OUTPUT_ENV, "1024"),
            EnvGuard::set(PASS_ENV_ENV, "HOME, JAVA_HOME,,GOPATH"),
            EnvGuard::set(LOG_LEVEL_ENV, "DEBUG"),
        ];

        let config = EngineConfig::from_env().unwrap();

        assert_eq!(
            config.config_path,
            Some(PathBuf::from("/etc/handlers.yaml"))
        );
        assert_eq!(config.parallelism, 3);
        assert_eq!(config.timeout_ms, 2500);
        assert_eq!(config.max_output_bytes, 1024);
        assert_eq!(config.pass_env, vec!["HOME", "JAVA_HOME", "GOPATH"]);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_unparseable_environment_value() {
        let _cleared = clear_env();
        let _guard = EnvGuard::set(TIMEOUT_ENV, "soon");

        let err = EngineConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { ref field, .. } if field == TIMEOUT_ENV));
    }

    #[test]
    fn test_validation_rejects_zero_parallelism() {
        let config = EngineConfig {
            parallelism: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_parallelism_within_validated_range() {
        assert_eq!(clamp_parallelism(4096), MAX_PARALLELISM);
        assert_eq!(clamp_parallelism(8), 8);
        assert!(default_parallelism() <= MAX_PARALLELISM);

        let config = EngineConfig {
            parallelism: clamp_parallelism(usize::MAX),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let config = EngineConfig {
            timeout_ms: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_nested_exclude() {
        let config = EngineConfig {
            exclude_dirs: vec!["vendor/cache".to_string()],
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let config = EngineConfig {
            log_level: "chatty".to_string(),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_runner_limits_conversion() {
        let config = EngineConfig {
            timeout_ms: 1500,
            pass_env: vec!["HOME".to_string()],
            ..EngineConfig::default()
        };

        let limits = config.runner_limits();
        assert_eq!(limits.default_timeout, Duration::from_millis(1500));
        assert_eq!(limits.grace_period, DEFAULT_GRACE_PERIOD);
        assert_eq!(limits.pass_env, vec!["HOME".to_string()]);
    }

    #[test]
    fn test_config_display() {
        let display = format!("{}", EngineConfig::default());
        assert!(display.contains("Engine Configuration:"));
        assert!(display.contains("Parallelism:"));
        assert!(display.contains("Catalog: <default>"));
    }
}
