//! manifest-dispatch - run manifest handlers over a source tree
//!
//! This library walks a directory tree, matches files against a declarative
//! catalog of handler descriptors, runs each matching handler as an isolated
//! child process with bounded concurrency, and aggregates everything the
//! handlers report into one deterministic document.
//!
//! # Core Concepts
//!
//! - **Ecosystem**: A packaging system (npm, maven, pypi, go) represented by
//!   exactly one handler descriptor
//! - **Handler**: External executable that parses a manifest file or directory
//!   and prints its findings on stdout
//! - **Aggregate report**: `{"results": [...]}` ordered by path, then ecosystem
//!
//! # Example Usage
//!
//! ```no_run
//! use manifest_dispatch::{CancelToken, DispatchEngine, EngineConfig};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::from_env()?;
//! let engine = DispatchEngine::from_config(&config)?;
//!
//! let report = engine.run(Path::new("/path/to/repo"), &CancelToken::new()).await?;
//! for result in report.results() {
//!     println!("{} {} {}", result.ecosystem, result.path, result.status);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`scan`]: Deterministic, read-only filesystem walk
//! - [`matcher`]: Glob matching of files to descriptors
//! - [`registry`]: Handler catalog loading and validation
//! - [`runner`]: Sub-process execution with timeouts and output ceilings
//! - [`dispatch`]: Task grouping, worker pool and cancellation
//! - [`output`]: Report schema and writer

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod matcher;
pub mod output;
pub mod registry;
pub mod runner;
pub mod scan;
pub mod util;

pub use config::{ConfigError, EngineConfig};
pub use dispatch::{CancelToken, DispatchEngine};
pub use error::EngineError;
pub use matcher::PathMatcher;
pub use output::{AggregateReport, HandlerResult, ReportFormat, ReportSink, Status};
pub use registry::{CatalogError, CatalogSource, HandlerDescriptor, HandlerRegistry};
pub use runner::{HandlerExecutor, Invocation, ProcessRunner, RunnerLimits};
pub use scan::{WalkConfig, Walker};
pub use util::{init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
