//! WinFs logging
//!
//! Console logging plus an optional rolling JSON log file.

mod logging;

pub use logging::{cleanup_old_logs, cleanup_old_logs_in, init_logging};
pub use tracing_appender::non_blocking::WorkerGuard;

use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the log directory
pub fn log_dir() -> PathBuf {
    ProjectDirs::from("com", "WinFs", "WinFs")
        .map(|dirs| dirs.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("./logs"))
}
