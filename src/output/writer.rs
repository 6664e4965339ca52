use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::schema::AggregateReport;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to serialize report as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to serialize report as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to write report to {path}: {source}")]
    Io { path: String, source: io::Error },
}

/// Document format of the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Json,
    Yaml,
}

/// Where the report goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReportSink {
    #[default]
    Stdout,
    File(PathBuf),
}

impl ReportSink {
    pub fn from_option(path: Option<&Path>) -> Self {
        match path {
            Some(path) => ReportSink::File(path.to_path_buf()),
            None => ReportSink::Stdout,
        }
    }
}

/// Renders any serializable value as a complete document.
pub fn render<T: Serialize>(value: &T, format: ReportFormat) -> Result<Vec<u8>, ReportError> {
    match format {
        ReportFormat::Json => {
            let mut bytes = serde_json::to_vec_pretty(value)?;
            bytes.push(b'\n');
            Ok(bytes)
        }
        ReportFormat::Yaml => Ok(serde_yaml::to_string(value)?.into_bytes()),
    }
}

/// Serializes the report fully in memory, then writes it in one go.
///
/// File sinks are written to a sibling temporary file that is renamed over
/// the target, so a failed run never leaves a truncated report behind.
pub fn write_report(
    report: &AggregateReport,
    format: ReportFormat,
    sink: &ReportSink,
) -> Result<(), ReportError> {
    let bytes = render(report, format)?;
    write_document(&bytes, sink)?;
    debug!(results = report.len(), bytes = bytes.len(), "Report written");
    Ok(())
}

pub fn write_document(bytes: &[u8], sink: &ReportSink) -> Result<(), ReportError> {
    match sink {
        ReportSink::Stdout => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(bytes)
                .and_then(|_| handle.flush())
                .map_err(|source| ReportError::Io {
                    path: "<stdout>".to_string(),
                    source,
                })
        }
        ReportSink::File(path) => write_atomically(path, bytes).map_err(|source| ReportError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "output path has no file name"))?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(format!(".tmp-{}", std::process::id()));
    let tmp_path = parent.join(tmp_name);

    let result = (|| {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
