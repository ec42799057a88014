//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, OutputFlags};
use crate::commands;

/// Dispatch ETL and training scripts to local and remote hosts
#[derive(Parser)]
#[command(
    name = "flowkestra",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Show debug logs on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run every configured instance
    Run(commands::run::RunArgs),

    /// Check the configuration without running anything
    Validate(commands::ConfigArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            json,
            quiet,
            no_color,
            command,
            ..
        } = self;
        let app = AppContext::new(&OutputFlags {
            no_color,
            quiet,
            json,
        });
        match command {
            Command::Run(args) => commands::run::run(&app, &args).await,
            Command::Validate(args) => commands::validate::run(&app, &args),
            Command::Version => {
                commands::version::run(&app);
                Ok(())
            }
        }
    }
}
