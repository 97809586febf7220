use clap::Parser;
use std::ffi::OsString;

use crate::logger::Severity;

pub const DEFAULT_PORT: u16 = 80;

/// Serve the current directory over HTTP, with Ctrl+C handled cleanly.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "ws", version, about, long_about = None)]
pub struct Cli {
    /// Port number for the web server
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Console log level (DEBUG, INFO, WARNING, ERROR, CRITICAL); the log file always records DEBUG
    #[arg(long = "log-level", value_name = "LEVEL", value_parser = parse_severity)]
    pub log_level: Option<Severity>,

    /// Show the last 200 lines of the log file and exit
    #[arg(long)]
    pub log: bool,

    /// Run the static file server in the foreground
    #[arg(long, hide = true)]
    pub serve: bool,
}

fn parse_severity(value: &str) -> Result<Severity, String> {
    value.parse().map_err(|e| format!("{e}"))
}

impl Cli {
    pub fn parse_normalized() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }
}

/// Rewrites the single-dash long flags (`-log`, `-log-level`) into the
/// double-dash forms clap understands. Everything else passes through.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| match arg.to_str() {
            Some("-log") => OsString::from("--log"),
            Some("-log-level") => OsString::from("--log-level"),
            Some(s) if s.starts_with("-log-level=") => OsString::from(format!("-{s}")),
            _ => arg,
        })
        .collect()
}
