//! Logging init for the command-line binary

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Verbosity selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    /// Every message including transport failure details
    Verbose,
    /// Request lifecycle messages and errors
    #[default]
    Info,
    /// Errors only
    Error,
    /// Nothing
    None,
}

impl LogLevel {
    /// Filter directive equivalent to this level
    pub fn directive(&self) -> &'static str {
        match self {
            LogLevel::Verbose => "debug",
            LogLevel::Info => "info",
            LogLevel::Error => "error",
            LogLevel::None => "off",
        }
    }

    /// `RUST_LOG` when set, otherwise this level
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directive()))
    }
}

/// Initializes logging to stderr so stdout only carries results
pub fn init_logging(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(level.env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
