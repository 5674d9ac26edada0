//! Name service backed by the wide-character Win32 API
//!
//! std's filesystem calls are already wide on Windows; the Win32 calls here
//! cover what std does not expose (8.3 short paths, full path names and the
//! hidden attribute).

use crate::encoding::CP_UTF8;
use crate::service::{FolderListing, NameService};
use crate::{FsError, Result};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;
use windows::core::HSTRING;
use windows::Win32::Storage::FileSystem::{
    GetFileAttributesW, GetFullPathNameW, GetShortPathNameW, SetFileAttributesW,
    FILE_ATTRIBUTE_HIDDEN, FILE_FLAGS_AND_ATTRIBUTES,
};

const INVALID_FILE_ATTRIBUTES: u32 = u32::MAX;

/// Unicode name service over the wide Win32 API
#[derive(Debug, Default)]
pub struct WideNameService {
    _private: (),
}

impl WideNameService {
    /// Construct for a caller speaking `code_page`; only UTF-8 is supported
    pub fn connect(code_page: u32) -> Result<Self> {
        if code_page != CP_UTF8 {
            return Err(FsError::ServiceUnavailable(format!(
                "unsupported code page {}",
                code_page
            )));
        }
        Ok(Self::default())
    }

    fn attributes(path: &str) -> Option<u32> {
        let attributes = unsafe { GetFileAttributesW(&HSTRING::from(path)) };
        (attributes != INVALID_FILE_ATTRIBUTES).then_some(attributes)
    }

    fn exists(path: &str) -> bool {
        Self::attributes(path).is_some()
    }

    fn is_dir(path: &str) -> bool {
        Path::new(path).is_dir()
    }

    fn is_file(path: &str) -> bool {
        Path::new(path).is_file()
    }

    /// Call a `(input, buffer) -> length` style API with the usual two-pass sizing
    fn wide_call<F>(path: &str, call: F) -> io::Result<String>
    where
        F: Fn(&HSTRING, Option<&mut [u16]>) -> u32,
    {
        let input = HSTRING::from(path);

        let needed = call(&input, None);
        if needed == 0 {
            return Err(io::Error::last_os_error());
        }

        let mut buffer = vec![0u16; needed as usize];
        let written = call(&input, Some(&mut buffer));
        if written == 0 || written as usize >= buffer.len() {
            return Err(io::Error::last_os_error());
        }

        Ok(String::from_utf16_lossy(&buffer[..written as usize]))
    }
}

fn refuse(op: &'static str, path: &str, kind: ErrorKind, msg: &str) -> FsError {
    FsError::service(op, path, io::Error::new(kind, msg.to_string()))
}

impl NameService for WideNameService {
    fn file_exists(&self, path: &str) -> Result<bool> {
        Ok(Self::is_file(path))
    }

    fn folder_exists(&self, path: &str) -> Result<bool> {
        Ok(Self::is_dir(path))
    }

    fn short_path(&self, path: &str) -> Result<String> {
        if !Self::exists(path) {
            return Err(FsError::NotFound(path.to_string()));
        }
        Self::wide_call(path, |input, buffer| unsafe { GetShortPathNameW(input, buffer) })
            .map_err(|e| FsError::service("short_path", path, e))
    }

    fn list_folder(&self, path: &str) -> Result<FolderListing> {
        if !Self::exists(path) {
            return Err(FsError::NotFound(path.to_string()));
        }
        if !Self::is_dir(path) {
            return Err(FsError::NotAFolder(path.to_string()));
        }

        let mut listing = FolderListing::default();
        for entry in fs::read_dir(path).map_err(|e| FsError::service("list_folder", path, e))? {
            let entry = entry.map_err(|e| FsError::service("list_folder", path, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() {
                listing.folders.push(name);
            } else {
                listing.files.push(name);
            }
        }

        listing.folders.sort_by_key(|n| n.to_lowercase());
        listing.files.sort_by_key(|n| n.to_lowercase());
        Ok(listing)
    }

    fn absolute_path_name(&self, path: &str) -> Result<String> {
        Self::wide_call(path, |input, buffer| unsafe { GetFullPathNameW(input, buffer, None) })
            .map_err(|e| FsError::service("absolute_path_name", path, e))
    }

    fn create_text_file(&self, path: &str, overwrite: bool) -> Result<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        options
            .open(path)
            .map(|_| ())
            .map_err(|e| FsError::service("create_text_file", path, e))
    }

    fn create_folder(&self, path: &str) -> Result<()> {
        fs::create_dir(path).map_err(|e| FsError::service("create_folder", path, e))
    }

    fn delete_file(&self, path: &str, force: bool) -> Result<()> {
        if force {
            if let Ok(metadata) = fs::metadata(path) {
                let mut permissions = metadata.permissions();
                if permissions.readonly() {
                    #[allow(clippy::permissions_set_readonly_false)]
                    permissions.set_readonly(false);
                    let _ = fs::set_permissions(path, permissions);
                }
            }
        }
        fs::remove_file(path).map_err(|e| FsError::service("delete_file", path, e))
    }

    fn delete_folder(&self, path: &str) -> Result<()> {
        fs::remove_dir_all(path).map_err(|e| FsError::service("delete_folder", path, e))
    }

    fn copy_file(&self, from: &str, to: &str, overwrite: bool) -> Result<()> {
        if Self::is_dir(to) || (!overwrite && Self::exists(to)) {
            return Err(refuse("copy_file", to, ErrorKind::AlreadyExists, "destination exists"));
        }
        fs::copy(from, to)
            .map(|_| ())
            .map_err(|e| FsError::service("copy_file", from, e))
    }

    fn move_file(&self, from: &str, to: &str) -> Result<()> {
        if !Self::is_file(from) {
            return Err(refuse("move_file", from, ErrorKind::NotFound, "source not found"));
        }
        if Self::exists(to) {
            return Err(refuse("move_file", to, ErrorKind::AlreadyExists, "destination exists"));
        }
        fs::rename(from, to).map_err(|e| FsError::service("move_file", from, e))
    }

    fn move_folder(&self, from: &str, to: &str) -> Result<()> {
        if !Self::is_dir(from) {
            return Err(refuse("move_folder", from, ErrorKind::NotFound, "source not found"));
        }
        if Self::exists(to) {
            return Err(refuse("move_folder", to, ErrorKind::AlreadyExists, "destination exists"));
        }
        fs::rename(from, to).map_err(|e| FsError::service("move_folder", from, e))
    }

    fn set_hidden(&self, path: &str) -> Result<()> {
        if !Self::is_file(path) {
            return Err(FsError::NotFound(path.to_string()));
        }
        let attributes = Self::attributes(path).ok_or_else(|| FsError::NotFound(path.to_string()))?;

        unsafe {
            SetFileAttributesW(
                &HSTRING::from(path),
                FILE_FLAGS_AND_ATTRIBUTES(attributes | FILE_ATTRIBUTE_HIDDEN.0),
            )
        }
        .map_err(|e| FsError::service("set_hidden", path, io::Error::other(e)))
    }

    fn is_hidden(&self, path: &str) -> Result<bool> {
        let attributes = Self::attributes(path).ok_or_else(|| FsError::NotFound(path.to_string()))?;
        Ok(attributes & FILE_ATTRIBUTE_HIDDEN.0 != 0)
    }
}
