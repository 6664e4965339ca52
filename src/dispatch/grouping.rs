use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::registry::HandlerDescriptor;
use crate::runner::Invocation;
use crate::scan::WalkEntry;

struct PendingGroup {
    descriptor: Arc<HandlerDescriptor>,
    grouped: bool,
    files: Vec<PathBuf>,
    total_bytes: u64,
}

/// Collects matched files and turns them into invocations.
///
/// Files of a `group_by_directory` handler collapse into one task per
/// (ecosystem, directory); every other file is its own task.
#[derive(Default)]
pub struct TaskPlanner {
    groups: BTreeMap<(String, PathBuf), PendingGroup>,
    matched_files: usize,
}

impl TaskPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, descriptor: &Arc<HandlerDescriptor>, entry: WalkEntry) {
        let grouped = descriptor.group_by_directory();
        let key = if grouped {
            entry.parent().to_path_buf()
        } else {
            entry.path.clone()
        };

        let group = self
            .groups
            .entry((descriptor.ecosystem().to_string(), key))
            .or_insert_with(|| PendingGroup {
                descriptor: Arc::clone(descriptor),
                grouped,
                files: Vec::new(),
                total_bytes: 0,
            });
        group.files.push(entry.path);
        group.total_bytes = group.total_bytes.saturating_add(entry.size);
        self.matched_files += 1;
    }

    pub fn matched_files(&self) -> usize {
        self.matched_files
    }

    pub fn task_count(&self) -> usize {
        self.groups.len()
    }

    pub fn finish(self) -> Vec<Invocation> {
        self.groups
            .into_iter()
            .map(|((_, key), group)| {
                if group.grouped {
                    Invocation {
                        descriptor: group.descriptor,
                        display_path: directory_display(&key),
                        working_dir: key.clone(),
                        target: key,
                        files: group.files,
                        total_bytes: group.total_bytes,
                        grouped: true,
                    }
                } else {
                    let working_dir = key
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| key.clone());
                    Invocation {
                        descriptor: group.descriptor,
                        display_path: key.to_string_lossy().into_owned(),
                        working_dir,
                        target: key,
                        files: group.files,
                        total_bytes: group.total_bytes,
                        grouped: false,
                    }
                }
            })
            .collect()
    }
}

/// Directory paths are reported with a trailing `/`.
fn directory_display(dir: &Path) -> String {
    let mut display = dir.to_string_lossy().into_owned();
    if !display.ends_with('/') {
        display.push('/');
    }
    display
}
