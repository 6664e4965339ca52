//! Shared fixtures for integration tests: a scratch tree, `/bin/sh` stub
//! handlers living outside it, and a tree digest for no-mutation checks.

#![allow(dead_code)]

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Path of the compiled binary under test.
pub fn manifest_dispatch_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_manifest-dispatch"))
}

pub struct Sandbox {
    dir: TempDir,
    root: PathBuf,
    handlers: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let root = dir.path().join("repo");
        let handlers = dir.path().join("handlers");
        fs::create_dir_all(&root).expect("Failed to create repo dir");
        fs::create_dir_all(&handlers).expect("Failed to create handlers dir");
        let root = root.canonicalize().expect("Failed to canonicalize root");
        Self {
            dir,
            root,
            handlers,
        }
    }

    /// The scan root, canonical.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root as reported in results, for building expected paths.
    pub fn root_str(&self) -> String {
        self.root.to_string_lossy().into_owned()
    }

    pub fn scratch(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a file into the scanned tree.
    pub fn file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root.join(relative);
        fs::create_dir_all(path.parent().expect("file has a parent"))
            .expect("Failed to create parent dir");
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Writes a stub handler script outside the scanned tree.
    pub fn handler(&self, name: &str, body: &str) -> PathBuf {
        let path = self.handlers.join(format!("{name}.sh"));
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write handler");
        path
    }

    /// Writes a catalog document and returns its path.
    pub fn catalog(&self, yaml: &str) -> PathBuf {
        let path = self.dir.path().join("handlers.yaml");
        fs::write(&path, yaml).expect("Failed to write catalog");
        path
    }

    /// Digest over every path, content and modification time in the tree.
    pub fn tree_digest(&self) -> String {
        let mut files = Vec::new();
        collect(&self.root, &mut files);
        files.sort();

        let mut hasher = Sha256::new();
        for path in files {
            let relative = path.strip_prefix(&self.root).expect("path inside root");
            hasher.update(relative.to_string_lossy().as_bytes());
            let metadata = fs::symlink_metadata(&path).expect("Failed to stat");
            if metadata.is_file() {
                hasher.update(fs::read(&path).expect("Failed to read"));
                if let Ok(modified) = metadata.modified() {
                    hasher.update(format!("{modified:?}").as_bytes());
                }
            }
        }
        hex::encode(hasher.finalize())
    }

    /// Runs the binary with an environment isolated from the developer's.
    pub fn run_cli(&self, args: &[&str]) -> Output {
        let mut command = Command::new(manifest_dispatch_bin());
        for (key, _) in std::env::vars_os() {
            if key.to_string_lossy().starts_with("MANIFEST_DISPATCH_") {
                command.env_remove(&key);
            }
        }
        command
            .args(args)
            .env_remove("RUST_LOG")
            .env("MANIFEST_DISPATCH_LOG_LEVEL", "error")
            .env("XDG_DATA_HOME", self.dir.path().join("data"))
            .output()
            .expect("Failed to execute manifest-dispatch")
    }
}

fn collect(dir: &Path, out: &mut Vec<PathBuf>) {
    for entry in fs::read_dir(dir).expect("Failed to read dir") {
        let path = entry.expect("Failed to read entry").path();
        out.push(path.clone());
        let is_dir = fs::symlink_metadata(&path)
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if is_dir {
            collect(&path, out);
        }
    }
}

/// A catalog entry running `script` through `/bin/sh`.
pub fn entry(ecosystem: &str, patterns: &[&str], script: &Path, extra: &str) -> String {
    let patterns = patterns
        .iter()
        .map(|p| format!("\"{p}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let mut yaml = format!(
        "- ecosystem: {ecosystem}\n  patterns: [{patterns}]\n  command: [\"/bin/sh\", \"{}\", \"{{path}}\"]\n",
        script.display()
    );
    for line in extra.lines().filter(|l| !l.trim().is_empty()) {
        yaml.push_str("  ");
        yaml.push_str(line.trim());
        yaml.push('\n');
    }
    yaml
}

/// Parses a JSON report and zeroes `duration_ms`, which is wall-clock.
pub fn normalized_report(bytes: &[u8]) -> serde_json::Value {
    let mut value: serde_json::Value = serde_json::from_slice(bytes).expect("report is JSON");
    if let Some(results) = value["results"].as_array_mut() {
        for result in results {
            result["duration_ms"] = serde_json::json!(0);
        }
    }
    value
}
