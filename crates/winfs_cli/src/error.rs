//! CLI error types

use thiserror::Error;
use winfs::FsError;

/// Errors reported by a subcommand
#[derive(Error, Debug)]
pub enum CliError {
    // ===== Recoverable (report, exit non-zero) =====
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Name service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Invalid argument: {0}")]
    Usage(String),

    // ===== Fatal =====
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CliError {
    /// Is this error recoverable?
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CliError::Config(_))
    }

    /// Get a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            CliError::NotFound(path) => format!("No such file or folder: {}", path),
            CliError::AlreadyExists(path) => format!("Already exists: {}", path),
            CliError::ServiceUnavailable(_) => {
                "The name service is not available; only plain paths work".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl From<FsError> for CliError {
    fn from(e: FsError) -> Self {
        match e {
            FsError::Io(inner) => CliError::Io(inner),
            FsError::NotFound(p) => CliError::NotFound(p),
            FsError::CreateFailed(p) | FsError::DestinationCollision(p) => CliError::AlreadyExists(p),
            FsError::ServiceUnavailable(reason) => CliError::ServiceUnavailable(reason),
            FsError::InvalidMode(mode) => CliError::Usage(format!("open mode {}", mode)),
            FsError::Config(msg) => CliError::Config(msg),
            other => CliError::Operation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fs_error() {
        assert!(matches!(
            CliError::from(FsError::DestinationCollision("/a".into())),
            CliError::AlreadyExists(_)
        ));
        assert!(matches!(
            CliError::from(FsError::service("move_file", "/a", std::io::ErrorKind::Other.into())),
            CliError::Operation(_)
        ));

        let config = CliError::from(FsError::Config("bad".into()));
        assert!(!config.is_recoverable());
        assert!(CliError::from(FsError::NotFound("/x".into())).is_recoverable());
    }
}
