//! Path matcher
//!
//! Decides which handler, if any, owns a file. Patterns are globs compiled
//! with `globset`; a pattern without a `/` is tested against the file's
//! basename, a pattern containing `/` against the path relative to the scan
//! root. The first descriptor in registry order with a matching pattern wins.

use globset::{GlobBuilder, GlobMatcher};
use std::path::Path;
use std::sync::Arc;

use crate::registry::{HandlerDescriptor, HandlerRegistry};

/// Prefix that makes a single pattern case-insensitive.
pub const CASE_INSENSITIVE_MARKER: &str = "(?i)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternScope {
    /// Matched against the file name only.
    Basename,
    /// Matched against the root-relative path, `/`-separated.
    RelativePath,
}

/// A compiled file pattern from a catalog entry.
#[derive(Debug, Clone)]
pub struct FilePattern {
    source: String,
    scope: PatternScope,
    matcher: GlobMatcher,
}

impl FilePattern {
    pub fn parse(source: &str) -> Result<Self, globset::Error> {
        let (glob, case_insensitive) = match source.strip_prefix(CASE_INSENSITIVE_MARKER) {
            Some(rest) => (rest, true),
            None => (source, false),
        };

        let scope = if glob.contains('/') {
            PatternScope::RelativePath
        } else {
            PatternScope::Basename
        };

        let matcher = GlobBuilder::new(glob)
            .literal_separator(true)
            .case_insensitive(case_insensitive)
            .build()?
            .compile_matcher();

        Ok(Self {
            source: source.to_string(),
            scope,
            matcher,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn scope(&self) -> PatternScope {
        self.scope
    }

    /// Tests a root-relative path against this pattern.
    pub fn is_match(&self, relative: &Path) -> bool {
        match self.scope {
            PatternScope::Basename => relative
                .file_name()
                .map(|name| self.matcher.is_match(Path::new(name)))
                .unwrap_or(false),
            PatternScope::RelativePath => {
                let normalized = relative.to_string_lossy().replace('\\', "/");
                self.matcher.is_match(normalized.as_str())
            }
        }
    }
}

/// Resolves files to the winning handler descriptor.
#[derive(Clone)]
pub struct PathMatcher {
    registry: Arc<HandlerRegistry>,
}

impl PathMatcher {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// Returns the earliest-declared descriptor with a pattern matching `relative`.
    pub fn match_file(&self, relative: &Path) -> Option<&Arc<HandlerDescriptor>> {
        self.registry
            .iter()
            .find(|descriptor| descriptor.patterns().iter().any(|p| p.is_match(relative)))
    }
}
