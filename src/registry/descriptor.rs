use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::catalog::CatalogEntry;
use super::template::CommandTemplate;
use super::CatalogError;
use crate::matcher::FilePattern;

/// How a handler's standard output is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// A JSON document.
    #[default]
    Doc,
    /// `key=value` lines.
    Kv,
    /// Opaque UTF-8 text.
    Raw,
}

/// A validated registry entry binding an ecosystem to patterns, a command
/// and runtime limits.
#[derive(Debug, Clone)]
pub struct HandlerDescriptor {
    ecosystem: String,
    patterns: Vec<FilePattern>,
    command: CommandTemplate,
    output_format: OutputFormat,
    group_by_directory: bool,
    timeout_ms: u64,
}

impl HandlerDescriptor {
    pub(super) fn from_entry(index: usize, entry: CatalogEntry) -> Result<Self, CatalogError> {
        let ecosystem = entry.ecosystem.trim().to_string();
        if ecosystem.is_empty() {
            return Err(CatalogError::EmptyEcosystem { index });
        }

        if entry.patterns.is_empty() {
            return Err(CatalogError::NoPatterns(ecosystem));
        }

        let patterns = entry
            .patterns
            .iter()
            .map(|raw| {
                if raw.trim().is_empty() {
                    return Err(CatalogError::InvalidPattern {
                        ecosystem: ecosystem.clone(),
                        pattern: raw.clone(),
                        message: "pattern is empty".to_string(),
                    });
                }
                FilePattern::parse(raw).map_err(|err| CatalogError::InvalidPattern {
                    ecosystem: ecosystem.clone(),
                    pattern: raw.clone(),
                    message: err.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let command =
            CommandTemplate::parse(&entry.command).map_err(|source| CatalogError::InvalidCommand {
                ecosystem: ecosystem.clone(),
                source,
            })?;

        Ok(Self {
            ecosystem,
            patterns,
            command,
            output_format: entry.format,
            group_by_directory: entry.group_by_directory,
            timeout_ms: entry.timeout_ms,
        })
    }

    pub fn ecosystem(&self) -> &str {
        &self.ecosystem
    }

    pub fn patterns(&self) -> &[FilePattern] {
        &self.patterns
    }

    pub fn command(&self) -> &CommandTemplate {
        &self.command
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub fn group_by_directory(&self) -> bool {
        self.group_by_directory
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// The handler's own timeout, or `default` when it declares none.
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        if self.timeout_ms == 0 {
            default
        } else {
            Duration::from_millis(self.timeout_ms)
        }
    }

    pub fn to_entry(&self) -> CatalogEntry {
        CatalogEntry {
            ecosystem: self.ecosystem.clone(),
            patterns: self
                .patterns
                .iter()
                .map(|p| p.source().to_string())
                .collect(),
            command: self.command.tokens().to_vec(),
            format: self.output_format,
            group_by_directory: self.group_by_directory,
            timeout_ms: self.timeout_ms,
        }
    }
}
