//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use reqwest::header::{HeaderName, HeaderValue};

use refetch_core::DEFAULT_MAX_RETRIES;

/// Fetch a URL to a file, resuming after dropped connections.
///
/// Refetch issues a single GET and, whenever the body is cut short, asks the
/// server for the remainder with a Range request until every advertised byte
/// has arrived.
#[derive(Parser, Debug)]
#[command(name = "refetch")]
#[command(author, version, about)]
pub struct Args {
    /// URL to fetch (http or https)
    pub url: String,

    /// File to write the body to
    #[arg(short, long)]
    pub output: PathBuf,

    /// Extra request header, as 'Name: value' (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(HeaderName, HeaderValue)>,

    /// Maximum attempts per request, the first one included (1-10)
    #[arg(short = 'a', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_attempts: u8,

    /// Connect timeout in seconds (1-600)
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub connect_timeout: u64,

    /// Idle timeout between body reads in seconds (1-3600)
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: u64,

    /// Give up and cancel the transfer after this many seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub deadline: Option<u64>,

    /// Ask for and transparently decode gzip bodies
    #[arg(long)]
    pub decompress: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Print the summary as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Default tracing level when `RUST_LOG` is not set.
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}

/// Parses a `Name: value` header argument.
fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{raw}'"))?;
    let name = HeaderName::try_from(name.trim())
        .map_err(|e| format!("invalid header name '{}': {e}", name.trim()))?;
    let value = HeaderValue::try_from(value.trim())
        .map_err(|e| format!("invalid header value for '{name}': {e}"))?;
    Ok((name, value))
}
