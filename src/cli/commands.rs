use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::EngineConfig;
use crate::output::ReportFormat;

/// Runs manifest handlers over a source tree and aggregates their output
#[derive(Parser, Debug, Clone)]
#[command(
    name = "manifest-dispatch",
    about = "Run manifest handlers over a source tree and aggregate their output",
    version,
    long_about = "manifest-dispatch walks a source tree, matches files against a catalog \
                  of handler descriptors, runs each matching handler as a separate process \
                  with bounded concurrency and writes one JSON report.\n\n\
                  Examples:\n  \
                  manifest-dispatch /path/to/repo\n  \
                  manifest-dispatch . --parallelism 4 --timeout-ms 30000\n  \
                  manifest-dispatch . --config handlers.yaml --output report.json\n  \
                  manifest-dispatch --list-handlers"
)]
pub struct CliArgs {
    #[arg(
        value_name = "ROOT",
        required_unless_present = "list_handlers",
        help = "Root directory of the tree to scan"
    )]
    pub root: Option<PathBuf>,

    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        help = "Handler catalog (defaults to the installed or built-in catalog)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long = "exclude-dir",
        value_name = "NAME",
        help = "Directory name to skip, repeatable (replaces the default .git, .hg, .svn)"
    )]
    pub exclude_dir: Vec<String>,

    #[arg(
        long,
        value_name = "ECOSYSTEM",
        help = "Ecosystem to disable for this run, repeatable"
    )]
    pub disable: Vec<String>,

    #[arg(
        short = 'j',
        long,
        value_name = "N",
        value_parser = parse_positive,
        help = "Maximum number of handlers running at once (defaults to hardware threads)"
    )]
    pub parallelism: Option<usize>,

    #[arg(
        long,
        value_name = "MS",
        value_parser = parse_positive_u64,
        help = "Default per-handler timeout in milliseconds"
    )]
    pub timeout_ms: Option<u64>,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write the report to a file instead of stdout"
    )]
    pub output: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "json",
        help = "Report format"
    )]
    pub format: ReportFormatArg,

    #[arg(
        long,
        value_name = "BYTES",
        value_parser = parse_positive,
        help = "Maximum captured stdout per handler"
    )]
    pub max_output_bytes: Option<usize>,

    #[arg(
        long = "pass-env",
        value_name = "VAR",
        help = "Environment variable passed through to handlers, repeatable"
    )]
    pub pass_env: Vec<String>,

    #[arg(long, help = "Print the effective handler catalog and exit")]
    pub list_handlers: bool,

    #[arg(long, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, help = "Verbose logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        conflicts_with = "verbose",
        help = "Quiet mode - only errors are logged"
    )]
    pub quiet: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormatArg {
    Json,
    Yaml,
}

impl From<ReportFormatArg> for ReportFormat {
    fn from(arg: ReportFormatArg) -> Self {
        match arg {
            ReportFormatArg::Json => ReportFormat::Json,
            ReportFormatArg::Yaml => ReportFormat::Yaml,
        }
    }
}

impl CliArgs {
    /// Overlays the flags that were given on `config`.
    pub fn apply_to(&self, config: &mut EngineConfig) {
        if let Some(path) = &self.config {
            config.config_path = Some(path.clone());
        }
        if !self.exclude_dir.is_empty() {
            config.exclude_dirs = self.exclude_dir.clone();
        }
        if !self.disable.is_empty() {
            config.disabled = self.disable.clone();
        }
        if let Some(parallelism) = self.parallelism {
            config.parallelism = parallelism;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(max_output_bytes) = self.max_output_bytes {
            config.max_output_bytes = max_output_bytes;
        }
        for name in &self.pass_env {
            if !config.pass_env.contains(name) {
                config.pass_env.push(name.clone());
            }
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.to_lowercase();
        }
    }
}

fn parse_positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(format!("invalid number '{}': {}", s, e)),
    }
}

fn parse_positive_u64(s: &str) -> Result<u64, String> {
    match s.parse::<u64>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(format!("invalid number '{}': {}", s, e)),
    }
}
