pub mod commands;
pub mod handlers;

pub use commands::{CliArgs, ReportFormatArg};
pub use handlers::handle_scan;
