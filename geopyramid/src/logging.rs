//! Logging infrastructure.
//!
//! Structured `tracing` output to both a log file and stdout:
//! - The log file is truncated at session start
//! - The file writer is non-blocking; keep the [`LoggingGuard`] alive
//! - Verbosity comes from `RUST_LOG`, defaulting to `info`

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    path: PathBuf,
}

impl LoggingGuard {
    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Initialize logging.
///
/// # Arguments
///
/// * `log_dir` - Directory for the log file, created if missing
/// * `log_file` - Log file name inside `log_dir`
///
/// # Errors
///
/// Returns an error if the directory or file cannot be prepared, or if a
/// global subscriber is already installed.
pub fn init_logging(log_dir: &Path, log_file: &str) -> Result<LoggingGuard, io::Error> {
    let path = prepare_log_file(log_dir, log_file)?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .with_target(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        path,
    })
}

/// Creates the log directory and truncates the log file.
fn prepare_log_file(log_dir: &Path, log_file: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(log_file);
    fs::write(&path, "")?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_creates_directory_and_file() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested/logs");

        let path = prepare_log_file(&dir, "run.log").unwrap();
        assert_eq!(path, dir.join("run.log"));
        assert!(path.exists());
    }

    #[test]
    fn test_prepare_truncates_previous_session() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("run.log"), "old session").unwrap();

        let path = prepare_log_file(temp.path(), "run.log").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "");
    }
}
