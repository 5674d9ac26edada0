//! WinFs - Unicode-aware filesystem access layer
//!
//! Routes every path-touching operation through a name service that can
//! address Unicode names, then hands the resolved (OS-safe) path to the
//! native filesystem:
//! - Path normalization to absolute, separator-normalized form
//! - Name service adapter (8.3 short names, alias tables, wide Win32 API)
//! - Alternate path resolution with silent native fallback
//! - Operation dispatch mirroring the standard filesystem verbs
//! - Snapshot directory streams

mod path;
mod encoding;
mod service;
mod short_name;
#[cfg(windows)]
mod win32;
mod native;
mod resolver;
mod dispatch;
mod dir_stream;
mod ini;
pub mod config;

pub use path::{AbsolutePath, PathNormalizer};
pub use encoding::{decode_bytes, detect_encoding, encoding_for_code_page, is_representable, EncodingHint};
pub use service::{FolderListing, NameService, ServiceAdapter};
pub use short_name::ShortNameService;
#[cfg(windows)]
pub use win32::WideNameService;
pub use native::{Access, FileKind, FileStat, NativeFs, OpenKind, OpenMode, StdNativeFs};
pub use resolver::{Channel, Resolved, Resolver};
pub use dispatch::{LineFlags, Outcome, StreamContext, WinFs, WriteFlags};
pub use dir_stream::{DirHandle, DirectoryStream, SortOrder, StreamBacking, StreamState};
pub use ini::{parse_ini, IniDocument, IniSection, IniValue};
pub use config::WinFsConfig;

use thiserror::Error;

/// File system errors
#[derive(Error, Debug)]
pub enum FsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Name service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Name service {op} failed on {path}: {source}")]
    ServiceOperationFailed {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Not a folder: {0}")]
    NotAFolder(String),

    #[error("Destination is an existing folder: {0}")]
    DestinationCollision(String),

    #[error("Cannot create: {0}")]
    CreateFailed(String),

    #[error("Directory stream is closed")]
    StreamClosed,

    #[error("No directory stream is open")]
    NoOpenStream,

    #[error("Invalid open mode: {0}")]
    InvalidMode(String),

    #[error("INI syntax error on line {line}: {message}")]
    IniSyntax { line: usize, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FsError {
    /// Wrap an io error raised by a name service call
    pub fn service(op: &'static str, path: impl Into<String>, source: std::io::Error) -> Self {
        FsError::ServiceOperationFailed {
            op,
            path: path.into(),
            source,
        }
    }

    /// Does this error come from the name service channel?
    pub fn is_service_error(&self) -> bool {
        matches!(
            self,
            FsError::ServiceUnavailable(_) | FsError::ServiceOperationFailed { .. }
        )
    }
}

impl From<FsError> for std::io::Error {
    fn from(e: FsError) -> Self {
        use std::io::ErrorKind;

        let kind = match &e {
            FsError::Io(inner) => inner.kind(),
            FsError::NotFound(_) => ErrorKind::NotFound,
            FsError::CreateFailed(_) | FsError::DestinationCollision(_) => ErrorKind::AlreadyExists,
            FsError::InvalidMode(_) | FsError::NotAFolder(_) => ErrorKind::InvalidInput,
            FsError::IniSyntax { .. } => ErrorKind::InvalidData,
            _ => ErrorKind::Other,
        };

        match e {
            FsError::Io(inner) => inner,
            other => std::io::Error::new(kind, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;
