//! Command-line interface for pingback
//!
//! Sends a single request chain or tracks a single event against a
//! collector, using the same controller the library exposes:
//!
//! - `send` dispatches an arbitrary request, optionally polling while the
//!   collector asks for it
//! - `track` dispatches an event to the collector's event endpoint
//!
//! The finished report is printed as JSON on stdout; logs go to stderr.

use clap::{Parser, Subcommand};

use crate::logging::LogLevel;
use crate::options::{Method, ParamValue};

/// Main command-line interface structure for pingback
///
/// Global options configure the collector connection and logging and apply
/// to every subcommand.
///
/// # Examples
///
/// ```
/// use clap::Parser;
/// use pingback::cli::{Cli, Commands};
///
/// let cli = Cli::try_parse_from([
///     "pingback", "--base-url", "https://collector.example.com",
///     "send", "--url", "/session", "--param", "app_token=abc",
/// ]).unwrap();
///
/// assert!(matches!(cli.command, Commands::Send { .. }));
/// ```
#[derive(Parser, Debug)]
#[command(
    name = "pingback",
    about = "Reliable delivery of tracking requests to a remote collector",
    version
)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Collector origin that request urls are resolved against
    #[arg(short = 'b', long, env = "PINGBACK_BASE_URL")]
    pub base_url: String,

    /// Timeout of a single HTTP attempt in milliseconds
    #[arg(short = 't', long, default_value = "5000")]
    pub timeout_ms: u64,

    /// Log verbosity (RUST_LOG takes precedence when set)
    #[arg(short = 'l', long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one request chain
    ///
    /// Transport failures are retried with backoff until the request
    /// succeeds or `--max-failures` is reached.
    Send {
        /// Request url, absolute or relative to the base url
        #[arg(short, long)]
        url: String,

        /// Request method
        #[arg(short, long, default_value = "GET")]
        method: Method,

        /// Request parameter as key=value (repeatable)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, ParamValue)>,

        /// Wait before the first attempt in milliseconds
        #[arg(short, long, default_value = "150")]
        wait: u64,

        /// Give up after this many consecutive transport failures
        #[arg(long)]
        max_failures: Option<u32>,

        /// Retry after the number of milliseconds found under this response field
        #[arg(long)]
        follow_field: Option<String>,
    },
    /// Track one event
    Track {
        /// Event token
        #[arg(short, long)]
        event_token: String,

        /// Revenue amount (requires --currency)
        #[arg(short, long, requires = "currency")]
        revenue: Option<f64>,

        /// Revenue currency code
        #[arg(short, long)]
        currency: Option<String>,

        /// Identifier used by the collector to drop duplicate events
        #[arg(long)]
        deduplication_id: Option<String>,

        /// Callback parameter as key=value (repeatable)
        #[arg(long = "callback-param", value_parser = parse_pair)]
        callback_params: Vec<(String, String)>,

        /// Partner parameter as key=value (repeatable)
        #[arg(long = "partner-param", value_parser = parse_pair)]
        partner_params: Vec<(String, String)>,

        /// Give up after this many consecutive transport failures
        #[arg(long)]
        max_failures: Option<u32>,
    },
}

/// Parses a `key=value` pair
pub fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("Expected key=value, got: {}", raw)),
    }
}

/// Parses a `key=value` request param, keeping integers and booleans typed
pub fn parse_param(raw: &str) -> Result<(String, ParamValue), String> {
    let (key, value) = parse_pair(raw)?;
    let value = if let Ok(int) = value.parse::<i64>() {
        ParamValue::Int(int)
    } else if let Ok(flag) = value.parse::<bool>() {
        ParamValue::Bool(flag)
    } else {
        ParamValue::Str(value)
    };
    Ok((key, value))
}
