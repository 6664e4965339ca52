//! Dispatch engine
//!
//! Drives one run: a single blocking walker thread feeds candidate files to
//! the matcher, matched files are grouped into tasks, and a fixed pool of
//! workers executes them through a [`crate::runner::HandlerExecutor`].
//!
//! ```text
//! walker ──mpsc──▶ matcher + planner ──mpsc──▶ N workers ──▶ Mutex<Vec<HandlerResult>>
//! ```
//!
//! Every stage observes the [`CancelToken`]; a cancelled run yields
//! [`crate::EngineError::Cancelled`] and no report.

mod cancel;
mod engine;
mod grouping;

pub use cancel::{install_signal_handlers, CancelToken};
pub use engine::DispatchEngine;
pub use grouping::TaskPlanner;
