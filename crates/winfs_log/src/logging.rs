//! Structured logging setup with tracing

use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the logging system
///
/// `level` is the filter used when `RUST_LOG` is unset. With `file`, JSON
/// records also go to a daily rolling file in [`crate::log_dir`]; keep the
/// returned guard alive until exit or buffered records are lost.
pub fn init_logging(level: &str, file: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    #[cfg(debug_assertions)]
    let console = fmt::layer().pretty().with_writer(std::io::stderr).boxed();

    #[cfg(not(debug_assertions))]
    let console = fmt::layer().compact().with_writer(std::io::stderr).boxed();

    let (file_layer, guard) = if file {
        let log_dir = super::log_dir();
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "winfs.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        (Some(fmt::layer().json().with_writer(non_blocking)), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file_layer)
        .try_init()?;

    tracing::debug!("Logging initialized");
    Ok(guard)
}

/// Clean up log files older than specified days
pub fn cleanup_old_logs(days: u32) -> anyhow::Result<usize> {
    cleanup_old_logs_in(&super::log_dir(), days)
}

/// Clean up `*.log*` files in `log_dir` older than `days`
pub fn cleanup_old_logs_in(log_dir: &Path, days: u32) -> anyhow::Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let threshold = SystemTime::now() - Duration::from_secs(days as u64 * 24 * 60 * 60);
    let mut deleted = 0;

    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();

        // Rolling files are named `winfs.log.YYYY-MM-DD`
        let is_log = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| name.contains(".log"));
        if !is_log {
            continue;
        }

        let modified = entry.metadata().and_then(|m| m.modified());
        if let Ok(modified) = modified {
            if modified < threshold && std::fs::remove_file(&path).is_ok() {
                deleted += 1;
                tracing::debug!("Deleted old log: {:?}", path);
            }
        }
    }

    if deleted > 0 {
        tracing::info!("Cleaned up {} old log files", deleted);
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, FileTimes};

    #[test]
    fn test_cleanup_old_logs() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("winfs.log.2020-01-01");
        let fresh = dir.path().join("winfs.log.2099-01-01");
        let other = dir.path().join("notes.txt");

        for path in [&old, &fresh, &other] {
            File::create(path).unwrap();
        }
        let long_ago = SystemTime::now() - Duration::from_secs(30 * 24 * 60 * 60);
        for path in [&old, &other] {
            let file = File::options().write(true).open(path).unwrap();
            file.set_times(FileTimes::new().set_modified(long_ago)).unwrap();
        }

        assert_eq!(cleanup_old_logs_in(dir.path(), 7).unwrap(), 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs_in(&dir.path().join("none"), 7).unwrap(), 0);
    }
}
