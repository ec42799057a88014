//! Application context — unified state passed to every command handler.
//!
//! Built once in `Cli::run()` from the global flags.

use crate::output::OutputContext;

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// JSON mode implies quiet terminal output so stdout carries only the
    /// JSON document.
    #[must_use]
    pub fn new(flags: &OutputFlags) -> Self {
        let mode = if flags.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        let quiet = flags.quiet || flags.json;
        Self {
            output: OutputContext::new(flags.no_color, quiet),
            mode,
        }
    }

    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }
}
