//! Native filesystem primitives
//!
//! [`NativeFs`] is the narrow, OS-level channel every verb ends up calling
//! with a resolved path. [`StdNativeFs`] implements it over `std::fs`; in
//! narrow mode it refuses any path the configured ANSI code page cannot
//! represent, which is how the native API behaves on the platforms this crate
//! targets.

use crate::encoding::{decode_bytes, encoding_for_code_page, is_representable, EncodingHint};
use crate::{FsError, Result};
use encoding_rs::Encoding;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::SystemTime;

/// Primary open mode (first character of an fopen mode string)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenKind {
    /// `r`
    Read,
    /// `w`: create or truncate
    Write,
    /// `a`: create, write at end
    Append,
    /// `x`: create, fail if it exists
    Exclusive,
    /// `c`: create, no truncation
    Create,
}

/// Parsed fopen style mode (`"r"`, `"w+b"`, `"x"`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    pub kind: OpenKind,
    /// `+`: open for reading and writing
    pub update: bool,
}

impl OpenMode {
    pub fn new(kind: OpenKind) -> Self {
        Self { kind, update: false }
    }

    /// Parse an fopen mode string; `b` and `t` flags are accepted and ignored
    pub fn parse(mode: &str) -> Result<Self> {
        let mut chars = mode.chars();
        let kind = match chars.next() {
            Some('r') => OpenKind::Read,
            Some('w') => OpenKind::Write,
            Some('a') => OpenKind::Append,
            Some('x') => OpenKind::Exclusive,
            Some('c') => OpenKind::Create,
            _ => return Err(FsError::InvalidMode(mode.to_string())),
        };

        let mut update = false;
        for flag in chars {
            match flag {
                '+' => update = true,
                'b' | 't' => {}
                _ => return Err(FsError::InvalidMode(mode.to_string())),
            }
        }

        Ok(Self { kind, update })
    }

    /// Does opening in this mode create the target?
    pub fn creates(&self) -> bool {
        !matches!(self.kind, OpenKind::Read)
    }

    /// Same mode with a different primary kind
    pub fn with_kind(self, kind: OpenKind) -> Self {
        Self { kind, ..self }
    }

    fn options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self.kind {
            OpenKind::Read => {
                options.read(true).write(self.update);
            }
            OpenKind::Write => {
                options.write(true).create(true).truncate(true).read(self.update);
            }
            OpenKind::Append => {
                options.append(true).create(true).read(self.update);
            }
            OpenKind::Exclusive => {
                options.write(true).create_new(true).read(self.update);
            }
            OpenKind::Create => {
                options.write(true).create(true).read(self.update);
            }
        }
        options
    }
}

/// Kind of filesystem entry, named like `filetype()` results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Dir,
    Link,
    Fifo,
    Char,
    Block,
    Socket,
    Unknown,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::File => "file",
            FileKind::Dir => "dir",
            FileKind::Link => "link",
            FileKind::Fifo => "fifo",
            FileKind::Char => "char",
            FileKind::Block => "block",
            FileKind::Socket => "socket",
            FileKind::Unknown => "unknown",
        }
    }

    fn from_file_type(file_type: fs::FileType) -> Self {
        if file_type.is_symlink() {
            return FileKind::Link;
        }
        if file_type.is_dir() {
            return FileKind::Dir;
        }
        if file_type.is_file() {
            return FileKind::File;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            if file_type.is_fifo() {
                return FileKind::Fifo;
            }
            if file_type.is_char_device() {
                return FileKind::Char;
            }
            if file_type.is_block_device() {
                return FileKind::Block;
            }
            if file_type.is_socket() {
                return FileKind::Socket;
            }
        }

        FileKind::Unknown
    }
}

/// Metadata as returned by `stat()`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    /// Seconds since the Unix epoch
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub uid: u32,
    pub gid: u32,
    pub inode: u64,
    /// Type and permission bits (`0o100644` style)
    pub mode: u32,
    pub kind: FileKind,
}

impl FileStat {
    fn from_metadata(metadata: &fs::Metadata) -> Self {
        let kind = FileKind::from_file_type(metadata.file_type());

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Self {
                size: metadata.size(),
                atime: metadata.atime(),
                mtime: metadata.mtime(),
                ctime: metadata.ctime(),
                uid: metadata.uid(),
                gid: metadata.gid(),
                inode: metadata.ino(),
                mode: metadata.mode(),
                kind,
            }
        }

        #[cfg(not(unix))]
        {
            use std::time::UNIX_EPOCH;
            let seconds = |time: io::Result<SystemTime>| {
                time.ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0)
            };
            let type_bits = match kind {
                FileKind::Dir => 0o040000,
                FileKind::Link => 0o120000,
                _ => 0o100000,
            };
            let permission_bits = if metadata.permissions().readonly() { 0o444 } else { 0o666 };
            let exec_bits = if kind == FileKind::Dir { 0o111 } else { 0 };
            Self {
                size: metadata.len(),
                atime: seconds(metadata.accessed()),
                mtime: seconds(metadata.modified()),
                ctime: seconds(metadata.created()),
                uid: 0,
                gid: 0,
                inode: 0,
                mode: type_bits | permission_bits | exec_bits,
                kind,
            }
        }
    }

    /// Permission bits only
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }
}

/// Access check flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Execute,
}

/// Native OS filesystem calls, taking OS-native path strings
pub trait NativeFs: Send + Sync {
    type File: io::Read + io::Write + io::Seek;

    fn open(&self, path: &str, mode: OpenMode) -> io::Result<Self::File>;

    fn read(&self, path: &str) -> io::Result<Vec<u8>>;

    /// Write `data`, replacing the contents unless `append`; returns bytes written
    fn write(&self, path: &str, data: &[u8], append: bool) -> io::Result<usize>;

    fn copy(&self, from: &str, to: &str) -> io::Result<u64>;

    fn rename(&self, from: &str, to: &str) -> io::Result<()>;

    fn remove_file(&self, path: &str) -> io::Result<()>;

    fn remove_dir(&self, path: &str) -> io::Result<()>;

    fn create_dir(&self, path: &str, mode: u32, recursive: bool) -> io::Result<()>;

    /// `stat()` when `follow`, `lstat()` otherwise
    fn metadata(&self, path: &str, follow: bool) -> io::Result<FileStat>;

    fn access(&self, path: &str, access: Access) -> bool;

    fn set_mode(&self, path: &str, mode: u32) -> io::Result<()>;

    /// Change owner and/or group by numeric id
    fn set_owner(&self, path: &str, uid: Option<u32>, gid: Option<u32>) -> io::Result<()>;

    /// Create if missing, then set modification and access times
    fn touch(&self, path: &str, mtime: SystemTime, atime: SystemTime) -> io::Result<()>;

    /// Entry names including `.` and `..`, in directory order
    fn list_dir(&self, path: &str) -> io::Result<Vec<String>>;
}

/// [`NativeFs`] over `std::fs`
#[derive(Debug, Clone, Default)]
pub struct StdNativeFs {
    /// ANSI code page limiting representable paths; `None` means wide
    narrow: Option<(u32, &'static Encoding)>,
}

impl StdNativeFs {
    /// Unrestricted native filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Native filesystem limited to paths representable in `code_page`
    pub fn narrow(code_page: u32) -> Result<Self> {
        let encoding = encoding_for_code_page(code_page)
            .ok_or_else(|| FsError::Config(format!("unknown code page {}", code_page)))?;
        Ok(Self {
            narrow: Some((code_page, encoding)),
        })
    }

    pub fn code_page(&self) -> Option<u32> {
        self.narrow.map(|(code_page, _)| code_page)
    }

    /// Refuse paths the narrow API would mangle
    fn check<'a>(&self, path: &'a str) -> io::Result<&'a Path> {
        if let Some((code_page, encoding)) = self.narrow {
            if !is_representable(path, encoding) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("path not representable in code page {}: {}", code_page, path),
                ));
            }
        }
        Ok(Path::new(path))
    }

    fn entry_name(&self, name: &std::ffi::OsStr) -> String {
        if let Some(name) = name.to_str() {
            return name.to_string();
        }

        #[cfg(unix)]
        {
            use std::os::unix::ffi::OsStrExt;
            let hint = self
                .code_page()
                .map(EncodingHint::from_code_page)
                .unwrap_or(EncodingHint::None);
            decode_bytes(name.as_bytes(), hint).0
        }

        #[cfg(not(unix))]
        {
            name.to_string_lossy().into_owned()
        }
    }
}

impl NativeFs for StdNativeFs {
    type File = File;

    fn open(&self, path: &str, mode: OpenMode) -> io::Result<File> {
        mode.options().open(self.check(path)?)
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.check(path)?)
    }

    fn write(&self, path: &str, data: &[u8], append: bool) -> io::Result<usize> {
        let mode = OpenMode::new(if append { OpenKind::Append } else { OpenKind::Write });
        let mut file = mode.options().open(self.check(path)?)?;
        file.write_all(data)?;
        Ok(data.len())
    }

    fn copy(&self, from: &str, to: &str) -> io::Result<u64> {
        fs::copy(self.check(from)?, self.check(to)?)
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        fs::rename(self.check(from)?, self.check(to)?)
    }

    fn remove_file(&self, path: &str) -> io::Result<()> {
        fs::remove_file(self.check(path)?)
    }

    fn remove_dir(&self, path: &str) -> io::Result<()> {
        fs::remove_dir(self.check(path)?)
    }

    fn create_dir(&self, path: &str, mode: u32, recursive: bool) -> io::Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(recursive);

        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;

        builder.create(self.check(path)?)
    }

    fn metadata(&self, path: &str, follow: bool) -> io::Result<FileStat> {
        let path = self.check(path)?;
        let metadata = if follow {
            fs::metadata(path)?
        } else {
            fs::symlink_metadata(path)?
        };
        Ok(FileStat::from_metadata(&metadata))
    }

    fn access(&self, path: &str, access: Access) -> bool {
        let Ok(path) = self.check(path) else {
            return false;
        };
        let Ok(metadata) = fs::metadata(path) else {
            return false;
        };

        match access {
            Access::Read => {
                if metadata.is_dir() {
                    fs::read_dir(path).is_ok()
                } else {
                    File::open(path).is_ok()
                }
            }
            Access::Write => !metadata.permissions().readonly(),
            Access::Execute => {
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    metadata.is_file() && metadata.permissions().mode() & 0o111 != 0
                }

                #[cfg(not(unix))]
                {
                    metadata.is_file()
                        && path
                            .extension()
                            .and_then(|ext| ext.to_str())
                            .map(|ext| {
                                matches!(ext.to_ascii_lowercase().as_str(), "exe" | "com" | "bat" | "cmd")
                            })
                            .unwrap_or(false)
                }
            }
        }
    }

    fn set_mode(&self, path: &str, mode: u32) -> io::Result<()> {
        let path = self.check(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(mode))
        }

        #[cfg(not(unix))]
        {
            // Only the owner write bit maps onto the read-only attribute
            let mut permissions = fs::metadata(path)?.permissions();
            permissions.set_readonly(mode & 0o200 == 0);
            fs::set_permissions(path, permissions)
        }
    }

    fn set_owner(&self, path: &str, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
        let path = self.check(path)?;

        #[cfg(unix)]
        {
            std::os::unix::fs::chown(path, uid, gid)
        }

        #[cfg(not(unix))]
        {
            let _ = (path, uid, gid);
            Err(io::Error::new(io::ErrorKind::Unsupported, "ownership is not supported"))
        }
    }

    fn touch(&self, path: &str, mtime: SystemTime, atime: SystemTime) -> io::Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.check(path)?)?;
        file.set_times(fs::FileTimes::new().set_modified(mtime).set_accessed(atime))
    }

    fn list_dir(&self, path: &str) -> io::Result<Vec<String>> {
        let mut names = vec![".".to_string(), "..".to_string()];
        for entry in fs::read_dir(self.check(path)?)? {
            names.push(self.entry_name(&entry?.file_name()));
        }
        Ok(names)
    }
}
