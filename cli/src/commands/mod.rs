//! Command implementations

pub mod run;
pub mod validate;
pub mod version;

use std::path::PathBuf;

use clap::Args;

/// Configuration file selection shared by every command that reads one.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Configuration file [default: $FLOWKESTRA_CONFIG or ./flowkestra.yaml]
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: Option<PathBuf>,
}
