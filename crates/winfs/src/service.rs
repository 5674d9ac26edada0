//! Name service - the Unicode-capable channel
//!
//! A [`NameService`] can address any Unicode path and hand back an alternate
//! path the narrow native API can open. [`ServiceAdapter`] owns one lazily
//! connected instance.

use crate::config::ServiceConfig;
use crate::{FsError, Result};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Children of a folder as reported by the name service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderListing {
    pub folders: Vec<String>,
    pub files: Vec<String>,
}

impl FolderListing {
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.files.is_empty()
    }
}

/// Unicode-aware name resolution and file manipulation
///
/// Every path argument is absolute. Manipulation failures are reported as
/// [`FsError::ServiceOperationFailed`].
pub trait NameService: Send + Sync {
    /// Is there a file at `path`?
    fn file_exists(&self, path: &str) -> Result<bool>;

    /// Is there a folder at `path`?
    fn folder_exists(&self, path: &str) -> Result<bool>;

    /// OS-addressable alternate path of an existing file or folder
    fn short_path(&self, path: &str) -> Result<String>;

    /// Sub folders and files of a folder
    fn list_folder(&self, path: &str) -> Result<FolderListing>;

    /// Canonical absolute form of `path` (no existence requirement)
    fn absolute_path_name(&self, path: &str) -> Result<String>;

    /// Create an empty file; fails if it exists and `overwrite` is false
    fn create_text_file(&self, path: &str, overwrite: bool) -> Result<()>;

    fn create_folder(&self, path: &str) -> Result<()>;

    fn delete_file(&self, path: &str, force: bool) -> Result<()>;

    /// Delete a folder and everything below it
    fn delete_folder(&self, path: &str) -> Result<()>;

    fn copy_file(&self, from: &str, to: &str, overwrite: bool) -> Result<()>;

    /// Move a file; fails if `to` exists
    fn move_file(&self, from: &str, to: &str) -> Result<()>;

    /// Move a folder; fails if `to` exists
    fn move_folder(&self, from: &str, to: &str) -> Result<()>;

    /// Set the hidden attribute on an existing file
    fn set_hidden(&self, path: &str) -> Result<()>;

    fn is_hidden(&self, path: &str) -> Result<bool>;

    /// Drop any name records kept for `path` after it was removed or moved
    /// without going through the service
    fn forget(&self, _path: &str) -> Result<()> {
        Ok(())
    }
}

type Connector = Box<dyn Fn() -> Result<Arc<dyn NameService>> + Send + Sync>;

/// Lazily connected, shared name service handle
///
/// The connection is made on first use and kept for the adapter's lifetime.
/// A failed connection is not remembered; the next call tries again.
pub struct ServiceAdapter {
    connector: Connector,
    handle: OnceCell<Arc<dyn NameService>>,
}

impl ServiceAdapter {
    /// Connect through `connector` on first use
    pub fn new<F>(connector: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn NameService>> + Send + Sync + 'static,
    {
        Self {
            connector: Box::new(connector),
            handle: OnceCell::new(),
        }
    }

    /// Use an already constructed service
    pub fn with_service(service: Arc<dyn NameService>) -> Self {
        let handle = OnceCell::new();
        let _ = handle.set(Arc::clone(&service));
        Self {
            connector: Box::new(move || Ok(Arc::clone(&service))),
            handle,
        }
    }

    /// An adapter whose service never comes up
    pub fn unavailable() -> Self {
        Self::new(|| Err(FsError::ServiceUnavailable("name service disabled".into())))
    }

    /// Platform default service as described by `config`
    pub fn from_config(config: &ServiceConfig) -> Self {
        if !config.enabled {
            return Self::unavailable();
        }

        let code_page = config.code_page;

        #[cfg(windows)]
        {
            Self::new(move || {
                crate::win32::WideNameService::connect(code_page)
                    .map(|service| Arc::new(service) as Arc<dyn NameService>)
            })
        }

        #[cfg(not(windows))]
        {
            Self::new(move || {
                crate::short_name::ShortNameService::connect(code_page)
                    .map(|service| Arc::new(service) as Arc<dyn NameService>)
            })
        }
    }

    /// Shared handle, connecting on first use
    pub fn get(&self) -> Result<&dyn NameService> {
        let handle = self.handle.get_or_try_init(|| {
            let service = (self.connector)();
            match &service {
                Ok(_) => tracing::info!("Name service connected"),
                Err(e) => tracing::warn!("Name service connection failed: {}", e),
            }
            service.map_err(|e| match e {
                FsError::ServiceUnavailable(msg) => FsError::ServiceUnavailable(msg),
                other => FsError::ServiceUnavailable(other.to_string()),
            })
        })?;
        Ok(handle.as_ref())
    }

    pub fn is_connected(&self) -> bool {
        self.handle.get().is_some()
    }
}

impl std::fmt::Debug for ServiceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAdapter")
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_unavailable() {
        let adapter = ServiceAdapter::unavailable();
        assert!(matches!(adapter.get(), Err(FsError::ServiceUnavailable(_))));
        assert!(!adapter.is_connected());
    }

    #[test]
    fn test_failed_connection_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let adapter = ServiceAdapter::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(FsError::Config("boom".into()))
        });

        assert!(matches!(adapter.get(), Err(FsError::ServiceUnavailable(_))));
        assert!(adapter.get().is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_connects_once() {
        let dir = tempfile::tempdir().unwrap();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let adapter = ServiceAdapter::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(crate::ShortNameService::new()) as Arc<dyn NameService>)
        });

        let root = dir.path().to_string_lossy().into_owned();
        assert!(adapter.get().unwrap().folder_exists(&root).unwrap());
        assert!(adapter.get().unwrap().folder_exists(&root).unwrap());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(adapter.is_connected());
    }
}
