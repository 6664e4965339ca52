//! Aggregate report model and writer

pub mod schema;
mod writer;

pub use schema::{AggregateReport, HandlerResult, Status};
pub use writer::{render, write_document, write_report, ReportError, ReportFormat, ReportSink};
