//! Report schema
//!
//! Field names here are the stable output contract:
//!
//! ```json
//! {
//!   "results": [
//!     {
//!       "ecosystem": "npm",
//!       "path": "/repo/web/package.json",
//!       "status": "ok",
//!       "data": { "name": "web", "version": "1.0.0" },
//!       "duration_ms": 41
//!     }
//!   ]
//! }
//! ```
//!
//! `data` is present only for `ok`, `error` only for every other status.
//! `files` lists the matched manifests of a directory-grouped result.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Outcome of one handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Ok,
    HandlerFailure,
    Timeout,
    UnreadableOutput,
    Skipped,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::HandlerFailure => "handler-failure",
            Status::Timeout => "timeout",
            Status::UnreadableOutput => "unreadable-output",
            Status::Skipped => "skipped",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerResult {
    pub ecosystem: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl HandlerResult {
    pub fn ok(ecosystem: impl Into<String>, path: impl Into<String>, data: Value) -> Self {
        Self {
            ecosystem: ecosystem.into(),
            path: path.into(),
            files: Vec::new(),
            status: Status::Ok,
            data: Some(data),
            error: None,
            duration_ms: 0,
        }
    }

    /// A non-`ok` result. Passing [`Status::Ok`] here is a logic error and
    /// is recorded as a handler failure instead.
    pub fn failed(
        ecosystem: impl Into<String>,
        path: impl Into<String>,
        status: Status,
        error: impl Into<String>,
    ) -> Self {
        let status = if status == Status::Ok {
            Status::HandlerFailure
        } else {
            status
        };
        Self {
            ecosystem: ecosystem.into(),
            path: path.into(),
            files: Vec::new(),
            status,
            data: None,
            error: Some(error.into()),
            duration_ms: 0,
        }
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

/// All results of a run, ordered by path then ecosystem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    results: Vec<HandlerResult>,
}

impl AggregateReport {
    pub fn new(mut results: Vec<HandlerResult>) -> Self {
        results.sort_by(|a, b| {
            a.path
                .as_bytes()
                .cmp(b.path.as_bytes())
                .then_with(|| a.ecosystem.cmp(&b.ecosystem))
        });
        Self { results }
    }

    pub fn results(&self) -> &[HandlerResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of results per status, for the end-of-run log line.
    pub fn count(&self, status: Status) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&Status::HandlerFailure).unwrap(),
            "\"handler-failure\""
        );
        assert_eq!(
            serde_json::to_string(&Status::UnreadableOutput).unwrap(),
            "\"unreadable-output\""
        );
        assert_eq!(Status::Timeout.to_string(), "timeout");
    }

    #[test]
    fn test_ok_result_fields() {
        let result = HandlerResult::ok("npm", "/p/package.json", json!({"name": "x"}))
            .with_duration(Duration::from_millis(12));

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "ecosystem": "npm",
                "path": "/p/package.json",
                "status": "ok",
                "data": {"name": "x"},
                "duration_ms": 12
            })
        );
    }

    #[test]
    fn test_failed_result_fields() {
        let result = HandlerResult::failed("maven", "/p/", Status::Timeout, "timed out")
            .with_files(vec!["/p/pom.xml".to_string()]);

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "timeout");
        assert_eq!(value["error"], "timed out");
        assert_eq!(value["files"], json!(["/p/pom.xml"]));
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_failed_refuses_ok_status() {
        let result = HandlerResult::failed("npm", "/p", Status::Ok, "boom");
        assert_eq!(result.status, Status::HandlerFailure);
    }

    #[test]
    fn test_report_ordering_by_path_then_ecosystem() {
        let report = AggregateReport::new(vec![
            HandlerResult::ok("npm", "/b/pom.xml", json!(null)),
            HandlerResult::ok("pypi", "/a/", json!(null)),
            HandlerResult::ok("maven", "/a/", json!(null)),
            HandlerResult::ok("npm", "/a/pkg.json", json!(null)),
        ]);

        let order: Vec<(&str, &str)> = report
            .results()
            .iter()
            .map(|r| (r.path.as_str(), r.ecosystem.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("/a/", "maven"),
                ("/a/", "pypi"),
                ("/a/pkg.json", "npm"),
                ("/b/pom.xml", "npm"),
            ]
        );
    }

    #[test]
    fn test_empty_report_shape() {
        let value = serde_json::to_value(AggregateReport::default()).unwrap();
        assert_eq!(value, json!({"results": []}));
    }
}
