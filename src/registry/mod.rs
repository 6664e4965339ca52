//! Handler registry
//!
//! The registry is the immutable, ordered set of [`HandlerDescriptor`]s built
//! from a catalog at startup. Declaration order is preserved because it
//! decides which handler wins when several patterns match the same file.
//!
//! ## Key Components
//!
//! - [`HandlerRegistry`] - validated descriptors in declaration order
//! - [`HandlerDescriptor`] - one ecosystem's patterns, command and limits
//! - [`CatalogSource`] - where the catalog document comes from
//! - [`CommandTemplate`] - the `{path}`-substituting invocation template

pub mod catalog;
mod descriptor;
pub mod template;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub use catalog::{CatalogEntry, CatalogSource};
pub use descriptor::{HandlerDescriptor, OutputFormat};
pub use template::{CommandTemplate, TemplateError};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("handler catalog not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read handler catalog {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid handler catalog ({origin}): {source}")]
    Parse {
        origin: String,
        source: serde_yaml::Error,
    },

    #[error("catalog entry #{index} has an empty ecosystem")]
    EmptyEcosystem { index: usize },

    #[error("handler '{0}' declares no patterns")]
    NoPatterns(String),

    #[error("handler '{ecosystem}' has an invalid pattern {pattern:?}: {message}")]
    InvalidPattern {
        ecosystem: String,
        pattern: String,
        message: String,
    },

    #[error("handler '{ecosystem}' has an invalid command: {source}")]
    InvalidCommand {
        ecosystem: String,
        source: TemplateError,
    },

    #[error("duplicate ecosystem '{0}' in handler catalog")]
    DuplicateEcosystem(String),
}

/// Immutable, ordered collection of handler descriptors.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    descriptors: Vec<Arc<HandlerDescriptor>>,
}

impl HandlerRegistry {
    /// Loads and validates the catalog named by `source`.
    pub fn load(source: &CatalogSource) -> Result<Self, CatalogError> {
        let registry = Self::from_entries(source.load()?)?;
        info!(
            catalog = %source,
            handlers = registry.len(),
            "Handler registry loaded"
        );
        Ok(registry)
    }

    /// Validates entries and builds the registry, keeping declaration order.
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        let mut descriptors = Vec::with_capacity(entries.len());

        for (index, entry) in entries.into_iter().enumerate() {
            let descriptor = HandlerDescriptor::from_entry(index, entry)?;
            if !seen.insert(descriptor.ecosystem().to_string()) {
                return Err(CatalogError::DuplicateEcosystem(
                    descriptor.ecosystem().to_string(),
                ));
            }
            descriptors.push(Arc::new(descriptor));
        }

        Ok(Self { descriptors })
    }

    /// Returns a registry without the named ecosystems, plus the names that
    /// matched nothing.
    pub fn without(&self, disabled: &[String]) -> (Self, Vec<String>) {
        let unknown = disabled
            .iter()
            .filter(|name| self.get(name).is_none())
            .cloned()
            .collect();

        let descriptors = self
            .descriptors
            .iter()
            .filter(|d| !disabled.iter().any(|name| name == d.ecosystem()))
            .cloned()
            .collect::<Vec<_>>();

        debug!(
            before = self.len(),
            after = descriptors.len(),
            "Applied disabled ecosystems"
        );

        (Self { descriptors }, unknown)
    }

    /// Iterates descriptors in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<HandlerDescriptor>> {
        self.descriptors.iter()
    }

    pub fn get(&self, ecosystem: &str) -> Option<&Arc<HandlerDescriptor>> {
        self.descriptors.iter().find(|d| d.ecosystem() == ecosystem)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Catalog entries in declaration order, for display.
    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.descriptors.iter().map(|d| d.to_entry()).collect()
    }
}
