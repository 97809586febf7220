mod level;
mod rotating;
mod style;

pub use level::{CRITICAL_TARGET, Severity};
pub use rotating::RotatingFile;
pub use style::{LogStyle, default_prefix};

use ansi_term::Colour;
use chrono::Local;
use env_logger::{Builder, Env, Target};
use log::{LevelFilter, Log, Metadata, Record};
use regex::Regex;
use std::borrow::Cow;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, Once, RwLock};
use thiserror::Error;

use crate::config::AppConfig;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("ANSI escape pattern is valid")
});

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Invalid log level: {0} (expected DEBUG|INFO|WARNING|ERROR|CRITICAL)")]
    InvalidLevel(String),

    #[error("Can't create log directory {path:?}: {source}")]
    LogDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_ESCAPE.replace_all(text, "")
}

/// Dual-sink logger: a styled console sink filtered by `threshold` and a plain
/// rotating file sink that records everything from DEBUG up.
pub struct RotatingLogger {
    threshold: Severity,
    console: env_logger::Logger,
    file: Mutex<RotatingFile>,
    log_path: PathBuf,
}

impl RotatingLogger {
    pub fn new(threshold: Severity, style: LogStyle, file: RotatingFile, target: Target) -> Self {
        let console = Builder::new()
            .filter_level(LevelFilter::Trace)
            .target(target)
            .format(move |buf, record| {
                writeln!(
                    buf,
                    "{} {}",
                    style.prefix(Severity::of(record)),
                    record.args()
                )
            })
            .build();

        Self {
            threshold,
            console,
            log_path: file.path().to_path_buf(),
            file: Mutex::new(file),
        }
    }

    pub fn threshold(&self) -> Severity {
        self.threshold
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    fn write_file(&self, severity: Severity, record: &Record) {
        let message = record.args().to_string();
        let line = format!(
            "[{}] {}: {}",
            Local::now().format(TIMESTAMP_FORMAT),
            severity,
            strip_ansi(&message)
        );

        if let Ok(mut file) = self.file.lock()
            && let Err(e) = file.write_line(&line)
        {
            eprintln!("Failed to write {:?}: {}", self.log_path, e);
        }
    }
}

impl Log for RotatingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let severity = Severity::of(record);
        if severity >= self.threshold {
            self.console.log(record);
        }
        self.write_file(severity, record);
    }

    fn flush(&self) {
        self.console.flush();
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

/// Forwards the `log` facade to the most recently initialised logger.
struct Dispatch;

static ACTIVE: RwLock<Option<Arc<RotatingLogger>>> = RwLock::new(None);
static DISPATCH: Dispatch = Dispatch;
static INSTALL: Once = Once::new();

impl Log for Dispatch {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(active) = ACTIVE.read()
            && let Some(logger) = active.as_ref()
        {
            logger.log(record);
        }
    }

    fn flush(&self) {
        if let Ok(active) = ACTIVE.read()
            && let Some(logger) = active.as_ref()
        {
            logger.flush();
        }
    }
}

/// Builds the process logger and routes the `log` macros to it.
///
/// Calling this again replaces the previously attached sinks instead of
/// stacking a second set on top of them.
pub fn init(
    config: &AppConfig,
    style: LogStyle,
    console_override: Option<Severity>,
    log_path: &Path,
) -> Result<(Arc<RotatingLogger>, PathBuf), LoggerError> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).map_err(|source| LoggerError::LogDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let threshold = console_override.unwrap_or(config.log_level);
    let file = RotatingFile::new(log_path, config.max_bytes, config.backup_count);
    let logger = Arc::new(RotatingLogger::new(threshold, style, file, Target::Stdout));

    let previous = match ACTIVE.write() {
        Ok(mut slot) => slot.replace(Arc::clone(&logger)),
        Err(poisoned) => poisoned.into_inner().replace(Arc::clone(&logger)),
    };
    if let Some(previous) = previous {
        previous.flush();
    }

    INSTALL.call_once(|| {
        if log::set_logger(&DISPATCH).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });

    Ok((logger, log_path.to_path_buf()))
}

/// Console-only logger for `--serve` mode. Verbosity follows `RUST_LOG`
/// (default `info`); nothing is written to the rotating file.
pub fn init_serve_console() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stderr)
        .format(|buf, record| {
            let level = match record.level() {
                log::Level::Error => Colour::Red.paint(record.level().to_string()),
                log::Level::Warn => Colour::Yellow.paint(record.level().to_string()),
                log::Level::Info => Colour::Green.paint(record.level().to_string()),
                log::Level::Debug => Colour::Blue.paint(record.level().to_string()),
                log::Level::Trace => Colour::Purple.paint(record.level().to_string()),
            };

            writeln!(
                buf,
                "[{} {}] {}",
                Local::now().format(TIMESTAMP_FORMAT),
                level,
                record.args()
            )
        })
        .init();
}
