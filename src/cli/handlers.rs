use anyhow::Context;
use tracing::{debug, error, info};

use super::commands::CliArgs;
use crate::config::{ConfigError, EngineConfig};
use crate::dispatch::{install_signal_handlers, CancelToken, DispatchEngine};
use crate::error::{EngineError, EXIT_INTERNAL, EXIT_SUCCESS};
use crate::output::{render, write_document, write_report, ReportFormat, ReportSink};

/// Runs the command line and returns the process exit code.
pub async fn handle_scan(args: &CliArgs) -> i32 {
    let engine = match prepare(args) {
        Ok(engine) => engine,
        Err(err) => return fail(&err),
    };

    let format: ReportFormat = args.format.into();
    let sink = ReportSink::from_option(args.output.as_deref());

    if args.list_handlers {
        return match list_handlers(&engine, format, &sink) {
            Ok(()) => EXIT_SUCCESS,
            Err(err) => {
                error!("Failed to list handlers: {err:#}");
                eprintln!("manifest-dispatch: {err:#}");
                EXIT_INTERNAL
            }
        };
    }

    match scan(args, &engine, format, &sink).await {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => fail(&err),
    }
}

fn prepare(args: &CliArgs) -> Result<DispatchEngine, EngineError> {
    let mut config = EngineConfig::from_env()?;
    args.apply_to(&mut config);
    debug!("{}", config);

    DispatchEngine::from_config(&config)
}

async fn scan(
    args: &CliArgs,
    engine: &DispatchEngine,
    format: ReportFormat,
    sink: &ReportSink,
) -> Result<(), EngineError> {
    let root = args.root.as_deref().ok_or_else(|| {
        EngineError::Config(ConfigError::ValidationFailed(
            "a ROOT directory is required".to_string(),
        ))
    })?;

    let cancel = CancelToken::new();
    let signals = install_signal_handlers(cancel.clone());
    let outcome = engine.run(root, &cancel).await;
    signals.abort();

    let report = outcome?;
    write_report(&report, format, sink)?;
    info!(results = report.len(), "Report emitted");
    Ok(())
}

fn list_handlers(
    engine: &DispatchEngine,
    format: ReportFormat,
    sink: &ReportSink,
) -> anyhow::Result<()> {
    let entries = engine.registry().entries();
    let bytes = render(&entries, format).context("failed to render handler catalog")?;
    write_document(&bytes, sink).context("failed to write handler catalog")?;
    Ok(())
}

fn fail(err: &EngineError) -> i32 {
    match err {
        EngineError::Cancelled => info!("Run cancelled, no report written"),
        _ => error!(error = %err, "Run failed"),
    }
    eprintln!("manifest-dispatch: {err}");
    err.exit_code()
}
