//! Alternate path resolution
//!
//! The central fallback decision: ask the name service for an OS-safe
//! alternate path, and silently keep the normalized path when the service is
//! down, errors out, or does not know the target.

use crate::path::{AbsolutePath, PathNormalizer};
use crate::service::{NameService, ServiceAdapter};
use crate::Result;

/// Which channel carried an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// The name service (alternate path or service call)
    Service,
    /// The native filesystem, directly
    Native,
}

/// Result of resolving a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// The service produced an OS-addressable path
    Alternate {
        logical: AbsolutePath,
        alternate: String,
    },
    /// Service unavailable or target unknown to it: the normalized path
    Fallback(AbsolutePath),
}

impl Resolved {
    /// Path to hand to the native filesystem
    pub fn path(&self) -> &str {
        match self {
            Resolved::Alternate { alternate, .. } => alternate,
            Resolved::Fallback(path) => path.as_str(),
        }
    }

    /// The normalized path the caller asked for
    pub fn logical(&self) -> &AbsolutePath {
        match self {
            Resolved::Alternate { logical, .. } => logical,
            Resolved::Fallback(path) => path,
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            Resolved::Alternate { .. } => Channel::Service,
            Resolved::Fallback(_) => Channel::Native,
        }
    }

    pub fn is_alternate(&self) -> bool {
        matches!(self, Resolved::Alternate { .. })
    }
}

/// Resolves user paths through the name service
#[derive(Debug)]
pub struct Resolver {
    normalizer: PathNormalizer,
    service: ServiceAdapter,
}

impl Resolver {
    pub fn new(normalizer: PathNormalizer, service: ServiceAdapter) -> Self {
        Self { normalizer, service }
    }

    pub fn normalizer(&self) -> &PathNormalizer {
        &self.normalizer
    }

    pub(crate) fn set_normalizer(&mut self, normalizer: PathNormalizer) {
        self.normalizer = normalizer;
    }

    pub fn normalize(&self, path: &str) -> AbsolutePath {
        self.normalizer.normalize(path)
    }

    /// The name service, if it can be reached
    pub fn service(&self) -> Result<&dyn NameService> {
        self.service.get()
    }

    /// Alternate path for `path`, or the normalized path itself
    pub fn resolve(&self, path: &str) -> Resolved {
        let logical = self.normalize(path);

        match self.lookup(&logical) {
            Ok(Some(alternate)) => Resolved::Alternate { logical, alternate },
            Ok(None) => Resolved::Fallback(logical),
            Err(e) => {
                tracing::debug!("Resolution of {} fell back: {}", logical, e);
                Resolved::Fallback(logical)
            }
        }
    }

    fn lookup(&self, path: &AbsolutePath) -> Result<Option<String>> {
        let service = self.service.get()?;

        if service.file_exists(path.as_str())? || service.folder_exists(path.as_str())? {
            return service.short_path(path.as_str()).map(Some);
        }

        Ok(None)
    }

    /// Is there a file at `path` according to the service? False if unreachable.
    pub fn file_exists(&self, path: &AbsolutePath) -> bool {
        self.check(path, |service, p| service.file_exists(p))
    }

    /// Is there a folder at `path` according to the service? False if unreachable.
    pub fn folder_exists(&self, path: &AbsolutePath) -> bool {
        self.check(path, |service, p| service.folder_exists(p))
    }

    fn check<F>(&self, path: &AbsolutePath, query: F) -> bool
    where
        F: Fn(&dyn NameService, &str) -> Result<bool>,
    {
        self.service
            .get()
            .and_then(|service| query(service, path.as_str()))
            .unwrap_or_else(|e| {
                tracing::debug!("Existence check on {} failed: {}", path, e);
                false
            })
    }

    /// `.`, `..`, sub folders, then files; empty on any failure
    pub fn list(&self, path: &str) -> Vec<String> {
        let logical = self.normalize(path);

        let listing = match self.service.get().and_then(|s| s.list_folder(logical.as_str())) {
            Ok(listing) => listing,
            Err(e) => {
                tracing::debug!("Service listing of {} failed: {}", logical, e);
                return Vec::new();
            }
        };

        let mut names = Vec::with_capacity(listing.folders.len() + listing.files.len() + 2);
        names.push(".".to_string());
        names.push("..".to_string());
        names.extend(listing.folders);
        names.extend(listing.files);
        names
    }
}
