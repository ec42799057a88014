//! Flowkestra CLI - dispatch ML training jobs to local and remote hosts

use clap::Parser;
use tracing_subscriber::EnvFilter;

use flowkestra_cli::cli::Cli;
use flowkestra_cli::commands::run::RunFailed;
use flowkestra_cli::domain::ConfigError;
use flowkestra_cli::output::json::format_error;

/// Environment variable holding the log filter directive.
const LOG_ENV_VAR: &str = "FLOWKESTRA_LOG";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let json = cli.json;
    if let Err(e) = cli.run().await {
        if json {
            // The report already went to stdout.
            if !e.is::<RunFailed>()
                && let Ok(obj) = format_error(&format!("{e:#}"), error_code(&e))
            {
                println!("{obj}");
            }
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn error_code(e: &anyhow::Error) -> &'static str {
    if e.is::<ConfigError>() {
        "config_error"
    } else if e.is::<RunFailed>() {
        "run_failed"
    } else {
        "error"
    }
}
