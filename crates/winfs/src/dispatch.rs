//! Operation dispatch - the filesystem verbs
//!
//! Each verb normalizes its path, resolves it through the name service and
//! calls the native filesystem with the result. Creation verbs first create
//! the target through the service so a new Unicode name becomes resolvable.
//! Service failures never escape a verb (except `hide`); native failures are
//! returned as `std::io::Error`.

use crate::config::{DispatchConfig, WinFsConfig};
use crate::dir_stream::{sort_names, DirHandle, DirTable, DirectoryStream, SortOrder, StreamBacking};
use crate::ini::{parse_ini, IniDocument};
use crate::native::{Access, FileKind, FileStat, NativeFs, OpenKind, OpenMode, StdNativeFs};
use crate::path::{split_parent, AbsolutePath, PathNormalizer};
use crate::resolver::{Channel, Resolved, Resolver};
use crate::service::ServiceAdapter;
use crate::{FsError, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::time::SystemTime;

/// Caller supplied stream context
///
/// Its presence alone changes routing: copy, rename, mkdir, directory opens
/// and scandir given a context go straight to the native filesystem.
#[derive(Debug, Clone, Default)]
pub struct StreamContext {
    pub options: BTreeMap<String, String>,
}

impl StreamContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Flags for `put_contents`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteFlags {
    /// Append instead of truncating
    pub append: bool,
}

/// Flags for `lines`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineFlags {
    /// Strip line terminators
    pub ignore_new_lines: bool,
    /// Drop lines that end up empty
    pub skip_empty_lines: bool,
}

/// Result of a verb whose plain form is a success flag
#[derive(Debug)]
pub enum Outcome {
    /// Succeeded through this channel
    Done(Channel),
    /// Failed; the error says which channel and why
    Failed(FsError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn channel(&self) -> Option<Channel> {
        match self {
            Outcome::Done(channel) => Some(*channel),
            Outcome::Failed(_) => None,
        }
    }

    pub fn into_result(self) -> Result<Channel> {
        match self {
            Outcome::Done(channel) => Ok(channel),
            Outcome::Failed(e) => Err(e),
        }
    }

    fn native<T>(result: io::Result<T>) -> Self {
        match result {
            Ok(_) => Outcome::Done(Channel::Native),
            Err(e) => Outcome::Failed(FsError::Io(e)),
        }
    }

    fn service(result: Result<()>) -> Self {
        match result {
            Ok(()) => Outcome::Done(Channel::Service),
            Err(e) => Outcome::Failed(e),
        }
    }
}

/// Unicode-aware filesystem façade
pub struct WinFs<N: NativeFs = StdNativeFs> {
    native: N,
    resolver: Resolver,
    options: DispatchConfig,
    dirs: Mutex<DirTable>,
}

impl WinFs<StdNativeFs> {
    /// Build from configuration
    pub fn from_config(config: &WinFsConfig) -> Result<Self> {
        config.validate()?;
        let fs = WinFs::new(config.native()?, ServiceAdapter::from_config(&config.service))
            .with_normalizer(config.normalizer())
            .with_options(config.dispatch.clone());
        Ok(fs)
    }
}

impl<N: NativeFs> WinFs<N> {
    pub fn new(native: N, service: ServiceAdapter) -> Self {
        Self {
            native,
            resolver: Resolver::new(PathNormalizer::new(), service),
            options: DispatchConfig::default(),
            dirs: Mutex::new(DirTable::default()),
        }
    }

    pub fn with_normalizer(mut self, normalizer: PathNormalizer) -> Self {
        self.resolver.set_normalizer(normalizer);
        self
    }

    pub fn with_options(mut self, options: DispatchConfig) -> Self {
        self.options = options;
        self
    }

    pub fn native(&self) -> &N {
        &self.native
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn normalize(&self, path: &str) -> AbsolutePath {
        self.resolver.normalize(path)
    }

    /// Alternate path for `path`, or its normalized form
    pub fn resolve(&self, path: &str) -> Resolved {
        self.resolver.resolve(path)
    }

    /// Service listing: `.`, `..`, folders, files; empty when unavailable
    pub fn ls(&self, path: &str) -> Vec<String> {
        self.resolver.list(path)
    }

    /// Create an empty file through the service unless one exists
    fn precreate(&self, logical: &AbsolutePath) -> Result<()> {
        self.resolver
            .service()?
            .create_text_file(logical.as_str(), false)
    }

    fn precreate_best_effort(&self, logical: &AbsolutePath) {
        if let Err(e) = self.precreate(logical) {
            tracing::debug!("Pre-create of {} skipped: {}", logical, e);
        }
    }

    /// Tell the service a native verb removed `logical`
    fn forget(&self, logical: &AbsolutePath) {
        let result = self
            .resolver
            .service()
            .and_then(|service| service.forget(logical.as_str()));
        if let Err(e) = result {
            tracing::debug!("Could not forget {}: {}", logical, e);
        }
    }

    // ===== Content =====

    /// Open a file with an fopen style mode string
    pub fn open(&self, path: &str, mode: &str) -> io::Result<N::File> {
        let mode = OpenMode::parse(mode)?;
        self.open_with(path, mode)
    }

    /// Open a file
    ///
    /// `w`, `a` and `x` create the target through the service first. For `x`
    /// that creation must succeed, and the native open then truncates the
    /// file it just made.
    pub fn open_with(&self, path: &str, mode: OpenMode) -> io::Result<N::File> {
        let logical = self.normalize(path);
        let mut mode = mode;

        match mode.kind {
            OpenKind::Exclusive => match self.precreate(&logical) {
                Ok(()) => mode = mode.with_kind(OpenKind::Write),
                Err(FsError::ServiceUnavailable(reason)) => {
                    tracing::debug!("Exclusive open of {} goes native: {}", logical, reason);
                }
                Err(e) => {
                    tracing::debug!("Exclusive create of {} failed: {}", logical, e);
                    return Err(FsError::CreateFailed(logical.into_string()).into());
                }
            },
            OpenKind::Write | OpenKind::Append => self.precreate_best_effort(&logical),
            OpenKind::Read | OpenKind::Create => {}
        }

        let resolved = self.resolve(path);
        self.native.open(resolved.path(), mode)
    }

    /// Whole file contents (`file_get_contents`)
    pub fn get_contents(&self, path: &str) -> io::Result<Vec<u8>> {
        self.native.read(self.resolve(path).path())
    }

    /// Contents from `offset`, at most `max_len` bytes
    pub fn get_contents_range(&self, path: &str, offset: u64, max_len: Option<usize>) -> io::Result<Vec<u8>> {
        let resolved = self.resolve(path);
        let mut file = self.native.open(resolved.path(), OpenMode::new(OpenKind::Read))?;
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = Vec::new();
        match max_len {
            Some(max_len) => {
                Read::take(&mut file, max_len as u64).read_to_end(&mut buffer)?;
            }
            None => {
                file.read_to_end(&mut buffer)?;
            }
        }
        Ok(buffer)
    }

    /// Write contents (`file_put_contents`); returns bytes written
    pub fn put_contents(&self, path: &str, data: impl AsRef<[u8]>, flags: WriteFlags) -> io::Result<usize> {
        self.precreate_best_effort(&self.normalize(path));
        self.native
            .write(self.resolve(path).path(), data.as_ref(), flags.append)
    }

    /// File split into lines (`file`)
    pub fn lines(&self, path: &str, flags: LineFlags) -> io::Result<Vec<String>> {
        let bytes = self.get_contents(path)?;
        let text = String::from_utf8_lossy(&bytes);

        let lines = text
            .split_inclusive('\n')
            .map(|line| {
                if flags.ignore_new_lines {
                    line.trim_end_matches('\n').trim_end_matches('\r')
                } else {
                    line
                }
            })
            .filter(|line| !(flags.skip_empty_lines && line.is_empty()))
            .map(str::to_string)
            .collect();
        Ok(lines)
    }

    /// Stream a file into `out` (`readfile`); returns bytes copied
    pub fn read_to<W: Write>(&self, path: &str, out: &mut W) -> io::Result<u64> {
        let resolved = self.resolve(path);
        let mut file = self.native.open(resolved.path(), OpenMode::new(OpenKind::Read))?;
        io::copy(&mut file, out)
    }

    /// Parse an INI file (`parse_ini_file`)
    pub fn parse_ini(&self, path: &str, process_sections: bool) -> io::Result<IniDocument> {
        let bytes = self.get_contents(path)?;
        Ok(parse_ini(&String::from_utf8_lossy(&bytes), process_sections)?)
    }

    // ===== Manipulation =====

    /// Copy a file
    ///
    /// With a context, or when the service does not know the source as a
    /// file, this is a native copy. Otherwise the service copies (overwriting)
    /// and a service failure is final: there is no native retry.
    pub fn copy(&self, from: &str, to: &str, context: Option<&StreamContext>) -> Outcome {
        let from = self.normalize(from);
        let to = self.normalize(to);

        if context.is_some() || !self.resolver.file_exists(&from) {
            tracing::debug!("Native copy {} -> {}", from, to);
            return Outcome::native(self.native.copy(from.as_str(), to.as_str()));
        }

        Outcome::service(
            self.resolver
                .service()
                .and_then(|service| service.copy_file(from.as_str(), to.as_str(), true)),
        )
    }

    /// Rename a file or folder
    ///
    /// An existing destination file is replaced; an existing destination
    /// folder fails the call untouched. Without a context the move always
    /// goes through the service, with no native retry.
    pub fn rename(&self, from: &str, to: &str, context: Option<&StreamContext>) -> Outcome {
        let from = self.normalize(from);
        let to = self.normalize(to);

        if context.is_some() {
            let result = self.native.rename(from.as_str(), to.as_str());
            if result.is_ok() {
                self.forget(&from);
            }
            return Outcome::native(result);
        }

        let service = match self.resolver.service() {
            Ok(service) => service,
            Err(e) => return Outcome::Failed(e),
        };

        if self.resolver.file_exists(&to) {
            if let Err(e) = service.delete_file(to.as_str(), true) {
                tracing::debug!("Could not clear rename target {}: {}", to, e);
            }
        } else if self.resolver.folder_exists(&to) {
            return Outcome::Failed(FsError::DestinationCollision(to.into_string()));
        }

        if self.resolver.file_exists(&from) {
            return Outcome::service(service.move_file(from.as_str(), to.as_str()));
        }
        if self.resolver.folder_exists(&from) {
            return Outcome::service(service.move_folder(from.as_str(), to.as_str()));
        }

        Outcome::Failed(FsError::NotFound(from.into_string()))
    }

    /// Create a directory
    ///
    /// Native by default. With `service_mkdir` enabled and no context, the
    /// service creates it (and its missing ancestors when `recursive`); the
    /// native call remains the fallback.
    pub fn mkdir(&self, path: &str, mode: u32, recursive: bool, context: Option<&StreamContext>) -> io::Result<()> {
        let logical = self.normalize(path);

        if self.options.service_mkdir && context.is_none() {
            match self.service_mkdir(&logical, recursive) {
                Ok(()) => return Ok(()),
                Err(e) => tracing::debug!("Service mkdir of {} fell back: {}", logical, e),
            }
        }

        self.native.create_dir(logical.as_str(), mode, recursive)
    }

    fn service_mkdir(&self, logical: &AbsolutePath, recursive: bool) -> Result<()> {
        let service = self.resolver.service()?;
        let separator = self.resolver.normalizer().separator();
        let target = self.resolver.normalizer().collapse(logical);

        if service.file_exists(target.as_str())? || service.folder_exists(target.as_str())? {
            return Err(FsError::CreateFailed(target.into_string()));
        }

        // Missing folders, deepest first
        let mut missing = vec![target.as_str().to_string()];
        let mut cursor = target.into_string();
        loop {
            let Some((parent, _)) = split_parent(&cursor, separator) else {
                break;
            };
            if service.folder_exists(&parent)? {
                break;
            }
            missing.push(parent.clone());
            cursor = parent;
        }

        if !recursive && missing.len() > 1 {
            return Err(FsError::NotFound(missing[1].clone()));
        }

        for folder in missing.iter().rev() {
            service.create_folder(folder)?;
        }
        Ok(())
    }

    pub fn rmdir(&self, path: &str) -> io::Result<()> {
        self.native.remove_dir(self.resolve(path).path())?;
        self.forget(&self.normalize(path));
        Ok(())
    }

    pub fn unlink(&self, path: &str) -> io::Result<()> {
        self.native.remove_file(self.resolve(path).path())?;
        self.forget(&self.normalize(path));
        Ok(())
    }

    /// Create if missing and set times; `mtime` defaults to now, `atime` to `mtime`
    pub fn touch(&self, path: &str, mtime: Option<SystemTime>, atime: Option<SystemTime>) -> io::Result<()> {
        self.precreate_best_effort(&self.normalize(path));

        let mtime = mtime.unwrap_or_else(SystemTime::now);
        let atime = atime.unwrap_or(mtime);
        self.native.touch(self.resolve(path).path(), mtime, atime)
    }

    /// Set the hidden attribute; the one verb whose service errors surface
    pub fn hide(&self, path: &str) -> Result<()> {
        let logical = self.normalize(path);
        self.resolver.service()?.set_hidden(logical.as_str())
    }

    pub fn is_hidden(&self, path: &str) -> Result<bool> {
        let logical = self.normalize(path);
        self.resolver.service()?.is_hidden(logical.as_str())
    }

    pub fn chmod(&self, path: &str, mode: u32) -> io::Result<()> {
        self.native.set_mode(self.resolve(path).path(), mode)
    }

    pub fn chown(&self, path: &str, uid: u32) -> io::Result<()> {
        self.native.set_owner(self.resolve(path).path(), Some(uid), None)
    }

    pub fn chgrp(&self, path: &str, gid: u32) -> io::Result<()> {
        self.native.set_owner(self.resolve(path).path(), None, Some(gid))
    }

    // ===== Queries =====

    /// Does the service know a file or folder at `path`?
    ///
    /// Always false while the service is unavailable; there is no native check.
    pub fn exists(&self, path: &str) -> bool {
        let logical = self.normalize(path);
        self.resolver.file_exists(&logical) || self.resolver.folder_exists(&logical)
    }

    /// Canonical absolute path of an existing entry
    pub fn realpath(&self, path: &str) -> Option<String> {
        if !self.exists(path) {
            return None;
        }

        let logical = self.normalize(path);
        self.resolver
            .service()
            .and_then(|service| service.absolute_path_name(logical.as_str()))
            .map_err(|e| tracing::debug!("realpath of {} failed: {}", logical, e))
            .ok()
    }

    pub fn stat(&self, path: &str) -> io::Result<FileStat> {
        self.native.metadata(self.resolve(path).path(), true)
    }

    pub fn lstat(&self, path: &str) -> io::Result<FileStat> {
        self.native.metadata(self.resolve(path).path(), false)
    }

    pub fn size(&self, path: &str) -> io::Result<u64> {
        Ok(self.stat(path)?.size)
    }

    pub fn atime(&self, path: &str) -> io::Result<i64> {
        Ok(self.stat(path)?.atime)
    }

    pub fn mtime(&self, path: &str) -> io::Result<i64> {
        Ok(self.stat(path)?.mtime)
    }

    pub fn ctime(&self, path: &str) -> io::Result<i64> {
        Ok(self.stat(path)?.ctime)
    }

    pub fn owner(&self, path: &str) -> io::Result<u32> {
        Ok(self.stat(path)?.uid)
    }

    pub fn group(&self, path: &str) -> io::Result<u32> {
        Ok(self.stat(path)?.gid)
    }

    pub fn inode(&self, path: &str) -> io::Result<u64> {
        Ok(self.stat(path)?.inode)
    }

    /// Type and permission bits
    pub fn perms(&self, path: &str) -> io::Result<u32> {
        Ok(self.stat(path)?.mode)
    }

    /// Entry type without following links
    pub fn file_type(&self, path: &str) -> io::Result<FileKind> {
        Ok(self.lstat(path)?.kind)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.stat(path).map(|s| s.kind == FileKind::Dir).unwrap_or(false)
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.stat(path).map(|s| s.kind == FileKind::File).unwrap_or(false)
    }

    pub fn is_readable(&self, path: &str) -> bool {
        self.native.access(self.resolve(path).path(), Access::Read)
    }

    pub fn is_writable(&self, path: &str) -> bool {
        self.native.access(self.resolve(path).path(), Access::Write)
    }

    pub fn is_writeable(&self, path: &str) -> bool {
        self.is_writable(path)
    }

    pub fn is_executable(&self, path: &str) -> bool {
        self.native.access(self.resolve(path).path(), Access::Execute)
    }

    // ===== Directories =====

    /// Open an owned directory stream
    ///
    /// Folders known to the service get a service listing, falling back to
    /// the native listing and then to nothing. Everything else, and any call
    /// with a context, lists natively and reports native errors.
    pub fn dir(&self, path: &str, context: Option<&StreamContext>) -> io::Result<DirectoryStream> {
        let logical = self.normalize(path);

        if context.is_none() && self.resolver.folder_exists(&logical) {
            let mut entries = self.resolver.list(path);
            if entries.is_empty() {
                entries = self
                    .native
                    .list_dir(self.resolve(path).path())
                    .unwrap_or_default();
            }
            return Ok(DirectoryStream::new(path, entries, StreamBacking::Service));
        }

        let entries = self.native.list_dir(logical.as_str())?;
        Ok(DirectoryStream::new(path, entries, StreamBacking::Native))
    }

    /// Open a directory stream and make it the default for handle-less calls
    pub fn open_dir(&self, path: &str, context: Option<&StreamContext>) -> io::Result<DirHandle> {
        let stream = self.dir(path, context)?;
        let handle = self.dirs.lock().insert(stream);
        tracing::debug!("Opened directory stream {} on {}", handle.id(), path);
        Ok(handle)
    }

    /// Next entry of `handle`, or of the last opened stream
    pub fn read_dir(&self, handle: Option<DirHandle>) -> Result<Option<String>> {
        self.dirs.lock().with(handle, DirectoryStream::read)
    }

    pub fn rewind_dir(&self, handle: Option<DirHandle>) -> Result<()> {
        self.dirs.lock().with(handle, DirectoryStream::rewind)
    }

    /// Close `handle`, or the last opened stream
    pub fn close_dir(&self, handle: Option<DirHandle>) -> Result<()> {
        self.dirs.lock().close(handle)
    }

    /// Sorted directory listing
    pub fn scandir(&self, path: &str, order: SortOrder, context: Option<&StreamContext>) -> io::Result<Vec<String>> {
        let logical = self.normalize(path);

        let mut names = if context.is_some() {
            self.native.list_dir(logical.as_str())?
        } else {
            let names = self.resolver.list(path);
            if names.is_empty() {
                self.native.list_dir(logical.as_str())?
            } else {
                names
            }
        };

        sort_names(&mut names, order);
        Ok(names)
    }
}

impl<N: NativeFs + std::fmt::Debug> std::fmt::Debug for WinFs<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WinFs")
            .field("native", &self.native)
            .field("resolver", &self.resolver)
            .field("options", &self.options)
            .finish()
    }
}
