//! CLI integration tests
//!
//! These tests run the compiled binary and verify:
//! - Exit codes for success, bad configuration and a missing root
//! - The report on stdout and in `--output` files
//! - Catalog listing and flag handling

mod support;

use serde_json::json;
use std::fs;
use std::process::Command;
use support::{entry, manifest_dispatch_bin, normalized_report, Sandbox};

#[test]
fn test_cli_help() {
    let output = Command::new(manifest_dispatch_bin())
        .arg("--help")
        .output()
        .expect("Failed to execute manifest-dispatch");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("manifest-dispatch"));
    assert!(stdout.contains("--parallelism"));
    assert!(stdout.contains("--exclude-dir"));
}

#[test]
fn test_cli_version() {
    let output = Command::new(manifest_dispatch_bin())
        .arg("--version")
        .output()
        .expect("Failed to execute manifest-dispatch");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_empty_tree_prints_empty_results() {
    let sandbox = Sandbox::new();
    let handler = sandbox.handler("npm", "printf '{}'");
    let catalog = sandbox.catalog(&entry("npm", &["package.json"], &handler, ""));

    let output = sandbox.run_cli(&[
        sandbox.root().to_str().unwrap(),
        "--config",
        catalog.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(0));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value, json!({"results": []}));
}

#[test]
fn test_report_on_stdout() {
    let sandbox = Sandbox::new();
    sandbox.file("app/package.json", "{}");
    let handler = sandbox.handler("npm", r#"printf '{"name":"x","version":"1.0"}'"#);
    let catalog = sandbox.catalog(&entry("npm", &["package.json"], &handler, ""));

    let output = sandbox.run_cli(&[
        sandbox.root().to_str().unwrap(),
        "--config",
        catalog.to_str().unwrap(),
        "--parallelism",
        "2",
    ]);

    assert_eq!(output.status.code(), Some(0));
    let report = normalized_report(&output.stdout);
    assert_eq!(
        report,
        json!({
            "results": [{
                "ecosystem": "npm",
                "path": format!("{}/app/package.json", sandbox.root_str()),
                "status": "ok",
                "data": {"name": "x", "version": "1.0"},
                "duration_ms": 0
            }]
        })
    );
}

#[test]
fn test_failed_handlers_still_exit_zero() {
    let sandbox = Sandbox::new();
    sandbox.file("package.json", "{}");
    let handler = sandbox.handler("npm", "echo 'bad manifest' >&2; exit 2");
    let catalog = sandbox.catalog(&entry("npm", &["package.json"], &handler, ""));

    let output = sandbox.run_cli(&[
        sandbox.root().to_str().unwrap(),
        "--config",
        catalog.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(0));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["results"][0]["status"], "handler-failure");
    assert_eq!(value["results"][0]["error"], "bad manifest");
}

#[test]
fn test_output_file() {
    let sandbox = Sandbox::new();
    sandbox.file("pom.xml", "<project/>");
    let handler = sandbox.handler("maven", "echo groupId=org.example");
    let catalog = sandbox.catalog(&entry("maven", &["pom.xml"], &handler, "format: kv"));
    let report_path = sandbox.scratch().join("report.json");

    let output = sandbox.run_cli(&[
        sandbox.root().to_str().unwrap(),
        "--config",
        catalog.to_str().unwrap(),
        "--output",
        report_path.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(
        value["results"][0]["data"],
        json!({"groupId": "org.example"})
    );
}

#[test]
fn test_yaml_format() {
    let sandbox = Sandbox::new();
    sandbox.file("package.json", "{}");
    let handler = sandbox.handler("npm", "printf '{}'");
    let catalog = sandbox.catalog(&entry("npm", &["package.json"], &handler, ""));

    let output = sandbox.run_cli(&[
        sandbox.root().to_str().unwrap(),
        "--config",
        catalog.to_str().unwrap(),
        "--format",
        "yaml",
    ]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("results:"));
    assert!(stdout.contains("status: ok"));
}

#[test]
fn test_missing_root_exits_one() {
    let sandbox = Sandbox::new();
    let handler = sandbox.handler("npm", "printf '{}'");
    let catalog = sandbox.catalog(&entry("npm", &["package.json"], &handler, ""));
    let missing = sandbox.scratch().join("nope");

    let output = sandbox.run_cli(&[
        missing.to_str().unwrap(),
        "--config",
        catalog.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

#[test]
fn test_missing_catalog_exits_one() {
    let sandbox = Sandbox::new();
    let missing = sandbox.scratch().join("absent.yaml");

    let output = sandbox.run_cli(&[
        sandbox.root().to_str().unwrap(),
        "--config",
        missing.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_invalid_catalog_exits_one() {
    let sandbox = Sandbox::new();
    let catalog = sandbox.catalog(
        "- ecosystem: npm\n  patterns: [\"package.json\"]\n  command: [\"npm-handler\"]\n",
    );

    let output = sandbox.run_cli(&[
        sandbox.root().to_str().unwrap(),
        "--config",
        catalog.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_unknown_catalog_key_exits_one() {
    let sandbox = Sandbox::new();
    let catalog = sandbox.catalog(
        "- ecosystem: npm\n  patterns: [\"package.json\"]\n  command: [\"h\", \"{path}\"]\n  retries: 3\n",
    );

    let output = sandbox.run_cli(&[
        sandbox.root().to_str().unwrap(),
        "--config",
        catalog.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_config_from_environment() {
    let sandbox = Sandbox::new();
    sandbox.file("package.json", "{}");
    let handler = sandbox.handler("npm", r#"printf '{"from":"env"}'"#);
    let catalog = sandbox.catalog(&entry("npm", &["package.json"], &handler, ""));

    let output = Command::new(manifest_dispatch_bin())
        .arg(sandbox.root())
        .env("MANIFEST_DISPATCH_CONFIG", &catalog)
        .env("MANIFEST_DISPATCH_LOG_LEVEL", "error")
        .output()
        .expect("Failed to execute manifest-dispatch");

    assert_eq!(output.status.code(), Some(0));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["results"][0]["data"], json!({"from": "env"}));
}

#[test]
fn test_exclude_dir_replaces_defaults() {
    let sandbox = Sandbox::new();
    sandbox.file(".git/package.json", "{}");
    sandbox.file("vendor/package.json", "{}");
    sandbox.file("package.json", "{}");
    let handler = sandbox.handler("npm", "printf '{}'");
    let catalog = sandbox.catalog(&entry("npm", &["package.json"], &handler, ""));

    let output = sandbox.run_cli(&[
        sandbox.root().to_str().unwrap(),
        "--config",
        catalog.to_str().unwrap(),
        "--exclude-dir",
        "vendor",
    ]);

    assert_eq!(output.status.code(), Some(0));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let paths: Vec<&str> = value["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["path"].as_str().unwrap())
        .collect();
    let root = sandbox.root_str();
    assert_eq!(
        paths,
        vec![
            format!("{root}/.git/package.json"),
            format!("{root}/package.json"),
        ]
    );
}

#[test]
fn test_list_handlers_builtin_catalog() {
    let sandbox = Sandbox::new();

    let output = sandbox.run_cli(&["--list-handlers"]);

    assert_eq!(output.status.code(), Some(0));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ecosystems: Vec<&str> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["ecosystem"].as_str().unwrap())
        .collect();
    assert_eq!(ecosystems, vec!["npm", "maven", "pypi", "go"]);
}

#[test]
fn test_list_handlers_honours_disable() {
    let sandbox = Sandbox::new();

    let output = sandbox.run_cli(&["--list-handlers", "--disable", "go", "--disable", "npm"]);

    assert_eq!(output.status.code(), Some(0));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 2);
    assert_eq!(value[0]["ecosystem"], "maven");
}

#[test]
fn test_zero_parallelism_is_usage_error() {
    let sandbox = Sandbox::new();
    let output = sandbox.run_cli(&[sandbox.root().to_str().unwrap(), "--parallelism", "0"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}

#[cfg(unix)]
#[test]
fn test_sigterm_cancels_run_with_exit_two() {
    use std::process::Stdio;
    use std::time::{Duration, Instant};

    let sandbox = Sandbox::new();
    sandbox.file("pom.xml", "<project/>");
    let handler = sandbox.handler("slow", "sleep 30");
    let catalog = sandbox.catalog(&entry("maven", &["pom.xml"], &handler, ""));

    let mut child = Command::new(manifest_dispatch_bin())
        .arg(sandbox.root())
        .arg("--config")
        .arg(&catalog)
        .env("MANIFEST_DISPATCH_LOG_LEVEL", "error")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn manifest-dispatch");

    std::thread::sleep(Duration::from_millis(500));
    let pid = nix::unistd::Pid::from_raw(child.id() as i32);
    nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM).unwrap();

    let started = Instant::now();
    let output = child.wait_with_output().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}
