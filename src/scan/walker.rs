use ignore::{DirEntry, WalkBuilder};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, Metadata};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Directories pruned when no exclusion list is configured.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[".git", ".hg", ".svn"];

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("scan root does not exist: {0}")]
    RootMissing(PathBuf),

    #[error("scan root is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("scan root is not readable: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// Directory basenames whose subtrees are never entered.
    pub exclude_dirs: Vec<String>,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A regular file found beneath the scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Absolute path inside the root. For a followed symlink this is the
    /// link's own path, not its target.
    pub path: PathBuf,
    /// `path` relative to the root.
    pub relative: PathBuf,
    pub size: u64,
}

impl WalkEntry {
    pub fn parent(&self) -> &Path {
        self.path.parent().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub files_offered: usize,
    pub entries_skipped: usize,
}

/// Deterministic, read-only traversal of a source tree.
#[derive(Debug, Clone)]
pub struct Walker {
    root: PathBuf,
    config: WalkConfig,
}

impl Walker {
    pub fn new(root: &Path, config: WalkConfig) -> Result<Self, WalkError> {
        if !root.exists() {
            return Err(WalkError::RootMissing(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(WalkError::NotADirectory(root.to_path_buf()));
        }

        let root = root.canonicalize().map_err(|source| WalkError::Unreadable {
            path: root.to_path_buf(),
            source,
        })?;
        fs::read_dir(&root).map_err(|source| WalkError::Unreadable {
            path: root.clone(),
            source,
        })?;

        debug!(
            root = %root.display(),
            excluded = ?config.exclude_dirs,
            "Walker initialized"
        );

        Ok(Self { root, config })
    }

    /// The canonical scan root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Visits every regular file in pre-order, siblings sorted by name bytes.
    ///
    /// `visit` may return [`ControlFlow::Break`] to stop the walk early.
    pub fn walk<F>(&self, mut visit: F) -> WalkStats
    where
        F: FnMut(WalkEntry) -> ControlFlow<()>,
    {
        let start = Instant::now();
        let mut stats = WalkStats::default();
        let mut visited: HashSet<(u64, u64)> = HashSet::new();

        let excluded: HashSet<OsString> = self
            .config
            .exclude_dirs
            .iter()
            .map(OsString::from)
            .collect();
        let pruned = excluded.clone();

        let walker = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .hidden(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().map_or(false, |t| t.is_dir());
                !(is_dir && entry.depth() > 0 && excluded.contains(entry.file_name()))
            })
            .build();

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "Skipping unreadable entry");
                    stats.entries_skipped += 1;
                    continue;
                }
            };

            let metadata = match self.classify(&entry) {
                Some(Candidate::Regular(metadata)) => {
                    // Hardlinks are distinct files and are all offered.
                    visited.insert(file_identity(&metadata));
                    metadata
                }
                Some(Candidate::Linked { metadata, target }) => {
                    if self.walk_reaches(&target, &pruned) {
                        debug!(
                            path = %entry.path().display(),
                            target = %target.display(),
                            "Symlink target is offered under its own path"
                        );
                        continue;
                    }
                    if !visited.insert(file_identity(&metadata)) {
                        debug!(path = %entry.path().display(), "File already visited through another link");
                        continue;
                    }
                    metadata
                }
                None => continue,
            };

            let path = entry.path().to_path_buf();
            let relative = path
                .strip_prefix(&self.root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.clone());

            stats.files_offered += 1;
            let walk_entry = WalkEntry {
                path,
                relative,
                size: metadata.len(),
            };

            if visit(walk_entry).is_break() {
                debug!("Walk stopped by consumer");
                break;
            }
        }

        info!(
            root = %self.root.display(),
            files_offered = stats.files_offered,
            entries_skipped = stats.entries_skipped,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Walk completed"
        );

        stats
    }

    /// Convenience for callers that want the whole listing at once.
    pub fn collect(&self) -> Vec<WalkEntry> {
        let mut entries = Vec::new();
        self.walk(|entry| {
            entries.push(entry);
            ControlFlow::Continue(())
        });
        entries
    }

    /// Whether the walk visits `target` under its own path: it lies inside
    /// the root and no directory on the way there is pruned.
    fn walk_reaches(&self, target: &Path, pruned: &HashSet<OsString>) -> bool {
        let Ok(relative) = target.strip_prefix(&self.root) else {
            return false;
        };
        relative
            .parent()
            .map(|dirs| !dirs.iter().any(|dir| pruned.contains(dir)))
            .unwrap_or(true)
    }

    /// The regular file behind `entry`, or `None` for directories, special
    /// files and symlinks that leave the root or point elsewhere.
    fn classify(&self, entry: &DirEntry) -> Option<Candidate> {
        let file_type = entry.file_type()?;

        if file_type.is_file() {
            return match entry.metadata() {
                Ok(metadata) => Some(Candidate::Regular(metadata)),
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "Failed to stat file");
                    None
                }
            };
        }

        if !file_type.is_symlink() {
            // Directories are descended by the walker; sockets, FIFOs and
            // devices are dropped silently.
            return None;
        }

        let target = match fs::canonicalize(entry.path()) {
            Ok(target) => target,
            Err(err) => {
                debug!(path = %entry.path().display(), error = %err, "Dangling symlink");
                return None;
            }
        };

        if !target.starts_with(&self.root) {
            debug!(
                path = %entry.path().display(),
                target = %target.display(),
                "Symlink leaves the scan root"
            );
            return None;
        }

        match fs::metadata(&target) {
            Ok(metadata) if metadata.is_file() => Some(Candidate::Linked { metadata, target }),
            Ok(_) => None,
            Err(err) => {
                warn!(path = %target.display(), error = %err, "Failed to stat symlink target");
                None
            }
        }
    }
}

enum Candidate {
    Regular(Metadata),
    /// A symlink resolving to a regular file inside the root.
    Linked { metadata: Metadata, target: PathBuf },
}

#[cfg(unix)]
fn file_identity(metadata: &Metadata) -> (u64, u64) {
    use std::os::unix::fs::MetadataExt;
    (metadata.dev(), metadata.ino())
}

#[cfg(not(unix))]
fn file_identity(metadata: &Metadata) -> (u64, u64) {
    // No stable inode outside unix; fall back to a per-file unique key.
    static NEXT: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let _ = metadata;
    (0, NEXT.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
}
