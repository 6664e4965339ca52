//! Handler runner
//!
//! Executes one handler as an isolated child process and turns whatever
//! happens to it into a [`HandlerResult`]. A failing, hanging or noisy
//! handler never fails the run: it only produces a non-`ok` result.
//!
//! ## Key Components
//!
//! - [`Invocation`] - one materialized task: descriptor, target, matched files
//! - [`RunnerLimits`] - timeout, grace period, output ceilings, environment
//! - [`HandlerExecutor`] - the seam between dispatch and process execution
//! - [`ProcessRunner`] - the sub-process implementation

mod format;
mod process;

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub use format::interpret;

use crate::dispatch::CancelToken;
use crate::output::{HandlerResult, Status};
use crate::registry::HandlerDescriptor;
use process::{run_process, ProcessOutcome};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_STDERR_LIMIT: usize = 4 * 1024;

pub const EXECUTABLE_NOT_FOUND: &str = "executable not found";
pub const EMPTY_MANIFEST: &str = "empty manifest";

/// A single unit of handler work.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub descriptor: Arc<HandlerDescriptor>,
    /// Path substituted into the command: a file, or a directory for
    /// directory-grouped handlers.
    pub target: PathBuf,
    pub working_dir: PathBuf,
    /// The `path` reported in the result. Directories end in `/`.
    pub display_path: String,
    pub files: Vec<PathBuf>,
    pub total_bytes: u64,
    pub grouped: bool,
}

impl Invocation {
    pub fn ecosystem(&self) -> &str {
        self.descriptor.ecosystem()
    }

    /// Matched files as reported, only for directory-grouped results.
    pub fn reported_files(&self) -> Vec<String> {
        if !self.grouped {
            return Vec::new();
        }
        self.files
            .iter()
            .map(|f| f.to_string_lossy().into_owned())
            .collect()
    }

    pub fn is_empty_manifest(&self) -> bool {
        self.total_bytes == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerLimits {
    /// Applies to handlers that declare no timeout of their own.
    pub default_timeout: Duration,
    pub grace_period: Duration,
    pub max_output_bytes: usize,
    pub stderr_limit: usize,
    /// Variables copied from this process into the child, besides `PATH`.
    pub pass_env: Vec<String>,
}

impl Default for RunnerLimits {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            stderr_limit: DEFAULT_STDERR_LIMIT,
            pass_env: Vec::new(),
        }
    }
}

impl RunnerLimits {
    /// The complete environment a handler starts with.
    pub fn child_env(&self) -> Vec<(String, OsString)> {
        std::iter::once("PATH")
            .chain(self.pass_env.iter().map(String::as_str))
            .filter_map(|name| std::env::var_os(name).map(|value| (name.to_string(), value)))
            .collect()
    }
}

#[async_trait]
pub trait HandlerExecutor: Send + Sync {
    /// Runs one invocation to completion. Never fails: every outcome is a
    /// result. When `cancel` fires the returned result is discarded.
    async fn execute(&self, invocation: &Invocation, cancel: &CancelToken) -> HandlerResult;
}

/// Runs handlers as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    limits: RunnerLimits,
}

impl ProcessRunner {
    pub fn new(limits: RunnerLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &RunnerLimits {
        &self.limits
    }
}

#[async_trait]
impl HandlerExecutor for ProcessRunner {
    async fn execute(&self, invocation: &Invocation, cancel: &CancelToken) -> HandlerResult {
        let started = Instant::now();
        let ecosystem = invocation.ecosystem();
        let path = invocation.display_path.as_str();

        if invocation.is_empty_manifest() {
            debug!(ecosystem, path, "Skipping empty manifest");
            return HandlerResult::failed(ecosystem, path, Status::Skipped, EMPTY_MANIFEST)
                .with_files(invocation.reported_files());
        }

        let timeout = invocation
            .descriptor
            .effective_timeout(self.limits.default_timeout);
        let outcome = run_process(invocation, &self.limits, timeout, cancel).await;

        let result = match outcome {
            ProcessOutcome::Exited {
                status,
                stdout,
                stderr,
            } => {
                if status.success() {
                    match interpret(invocation.descriptor.output_format(), &stdout) {
                        Ok(data) => HandlerResult::ok(ecosystem, path, data),
                        Err(message) => HandlerResult::failed(
                            ecosystem,
                            path,
                            Status::UnreadableOutput,
                            message,
                        ),
                    }
                } else {
                    HandlerResult::failed(
                        ecosystem,
                        path,
                        Status::HandlerFailure,
                        failure_diagnostic(&stderr, status),
                    )
                }
            }
            ProcessOutcome::OutputTooLarge { limit } => HandlerResult::failed(
                ecosystem,
                path,
                Status::UnreadableOutput,
                format!("output exceeded {limit} bytes"),
            ),
            ProcessOutcome::TimedOut { after } => {
                return HandlerResult::failed(
                    ecosystem,
                    path,
                    Status::Timeout,
                    format!("timed out after {} ms", timeout.as_millis()),
                )
                .with_files(invocation.reported_files())
                .with_duration(after);
            }
            ProcessOutcome::Cancelled => {
                HandlerResult::failed(ecosystem, path, Status::HandlerFailure, "cancelled")
            }
            ProcessOutcome::SpawnFailed(err) => {
                let message = if err.kind() == std::io::ErrorKind::NotFound {
                    EXECUTABLE_NOT_FOUND.to_string()
                } else {
                    err.to_string()
                };
                HandlerResult::failed(ecosystem, path, Status::HandlerFailure, message)
            }
        };

        result
            .with_files(invocation.reported_files())
            .with_duration(started.elapsed())
    }
}

fn failure_diagnostic(stderr: &[u8], status: std::process::ExitStatus) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if !text.is_empty() {
        return text.to_string();
    }
    format!("exited with status {}", describe_status(status))
}

fn describe_status(status: std::process::ExitStatus) -> String {
    if let Some(code) = status.code() {
        return code.to_string();
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("signal {signal}");
        }
    }
    status.to_string()
}
