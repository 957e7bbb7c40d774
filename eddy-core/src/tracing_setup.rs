//! Tracing setup for Eddy
//!
//! Console logs at a user-chosen level plus a full trace log on disk. Per-pass
//! scheduler reports are emitted at trace level, so the file is where they land.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// File name of the trace log written for every run.
const LOG_FILE_NAME: &str = "eddy-last-run.log";

/// Installs the global subscriber: a console layer filtered at `console_level`
/// (or `RUST_LOG` when set) and a trace-level layer writing to
/// `eddy-last-run.log` inside `logs_dir` (`./logs` when `None`).
///
/// # Errors
///
/// - `std::io::Error` - If the logs directory cannot be created or the log file cannot be opened
/// - `tracing_subscriber::util::TryInitError` - If a global subscriber is already installed
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (log_file, log_file_path) = create_log_file(logs_dir)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new("trace"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(
        "Tracing initialized: console={}, trace_file={}",
        console_level,
        log_file_path.display()
    );

    Ok(())
}

/// Creates (truncating) the run log inside `logs_dir`, creating the directory if needed.
///
/// # Errors
///
/// - `std::io::Error` - If the directory or file cannot be created
pub fn create_log_file(logs_dir: Option<&Path>) -> Result<(File, PathBuf), std::io::Error> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new("logs"));
    create_dir_all(logs_path)?;

    let log_file_path = logs_path.join(LOG_FILE_NAME);
    let log_file = File::create(&log_file_path)?;
    Ok((log_file, log_file_path))
}

/// Verbosity of the console layer, as chosen on the command line.
///
/// The trace file always records everything; this only filters the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConsoleLevel {
    Error,
    Warn,
    /// Command start and finish
    Info,
    /// Download registration and driver start/stop
    Debug,
    /// Per-pass dispatch reports and refused requests
    Trace,
}

impl ConsoleLevel {
    const ALL: [ConsoleLevel; 5] = [
        ConsoleLevel::Error,
        ConsoleLevel::Warn,
        ConsoleLevel::Info,
        ConsoleLevel::Debug,
        ConsoleLevel::Trace,
    ];

    /// The `tracing` level this console setting admits.
    ///
    /// # Examples
    /// ```
    /// use eddy_core::tracing_setup::ConsoleLevel;
    ///
    /// assert_eq!(ConsoleLevel::Trace.as_tracing_level(), tracing::Level::TRACE);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            ConsoleLevel::Error => Level::ERROR,
            ConsoleLevel::Warn => Level::WARN,
            ConsoleLevel::Info => Level::INFO,
            ConsoleLevel::Debug => Level::DEBUG,
            ConsoleLevel::Trace => Level::TRACE,
        }
    }

    /// Lowercase name accepted by `--log-level`.
    pub fn as_str(self) -> &'static str {
        match self {
            ConsoleLevel::Error => "error",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Debug => "debug",
            ConsoleLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for ConsoleLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConsoleLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown console level '{s}'"))
    }
}

impl std::fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
