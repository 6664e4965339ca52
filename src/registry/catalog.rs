//! Handler catalog documents
//!
//! The catalog is a YAML sequence with one mapping per handler. Each mapping
//! recognizes exactly `ecosystem`, `patterns`, `command`, `format`,
//! `group_by_directory` and `timeout_ms`; anything else is rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{CatalogError, OutputFormat};

/// Environment variable naming the catalog file.
pub const CONFIG_ENV: &str = "MANIFEST_DISPATCH_CONFIG";

/// Directory name under the platform data directory.
pub const DATA_DIR_NAME: &str = "manifest-dispatch";

/// File name of the catalog inside the data directory.
pub const CATALOG_FILE_NAME: &str = "handlers.yaml";

/// Catalog shipped inside the binary, used when no catalog file is installed.
pub const BUILTIN_CATALOG: &str = include_str!("../../data/handlers.yaml");

/// One catalog entry as written in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogEntry {
    pub ecosystem: String,
    pub patterns: Vec<String>,
    pub command: Vec<String>,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub group_by_directory: bool,
    #[serde(default)]
    pub timeout_ms: u64,
}

/// Where the catalog was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    File(PathBuf),
    BuiltIn,
}

impl CatalogSource {
    /// Picks the catalog to load.
    ///
    /// An explicit path must exist. Without one, the conventional
    /// `<data_dir>/manifest-dispatch/handlers.yaml` is used when present,
    /// otherwise the built-in catalog.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, CatalogError> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(CatalogError::NotFound(path.to_path_buf()));
            }
            return Ok(CatalogSource::File(path.to_path_buf()));
        }

        match default_catalog_path() {
            Some(path) if path.is_file() => {
                debug!(path = %path.display(), "Using installed handler catalog");
                Ok(CatalogSource::File(path))
            }
            _ => {
                debug!("No installed handler catalog, using built-in catalog");
                Ok(CatalogSource::BuiltIn)
            }
        }
    }

    pub fn load(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        match self {
            CatalogSource::File(path) => {
                let content =
                    std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
                        path: path.clone(),
                        source,
                    })?;
                parse_catalog(&content, &path.display().to_string())
            }
            CatalogSource::BuiltIn => parse_catalog(BUILTIN_CATALOG, "built-in catalog"),
        }
    }
}

impl fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogSource::File(path) => write!(f, "{}", path.display()),
            CatalogSource::BuiltIn => write!(f, "<built-in>"),
        }
    }
}

/// `<data_dir>/manifest-dispatch/handlers.yaml`, if the platform has a data dir.
pub fn default_catalog_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(DATA_DIR_NAME).join(CATALOG_FILE_NAME))
}

/// Parses a catalog document. `origin` only labels error messages.
pub fn parse_catalog(content: &str, origin: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
    serde_yaml::from_str(content).map_err(|source| CatalogError::Parse {
        origin: origin.to_string(),
        source,
    })
}
