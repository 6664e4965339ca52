use manifest_dispatch::cli::commands::CliArgs;
use manifest_dispatch::cli::handlers::handle_scan;
use manifest_dispatch::error::{EXIT_INIT_FAILURE, EXIT_SUCCESS};
use manifest_dispatch::util::{init_logging, LoggingConfig};
use manifest_dispatch::VERSION;

use clap::Parser;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // Usage errors are initialization failures; help and version are not errors.
            let code = if err.use_stderr() {
                EXIT_INIT_FAILURE
            } else {
                EXIT_SUCCESS
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    init_logging_from_args(&args);

    debug!("manifest-dispatch v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = handle_scan(&args).await;

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let config =
        LoggingConfig::from_env().with_overrides(args.log_level.as_deref(), args.verbose, args.quiet);
    init_logging(config);
}
