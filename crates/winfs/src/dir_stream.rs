//! Directory streams - snapshot listings with a cursor

use crate::{FsError, Result};
use std::collections::HashMap;

/// Where a stream's entries came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamBacking {
    /// Listing produced by the name service (native listing as a fallback)
    Service,
    /// Listing produced by the native directory API
    Native,
}

/// Lifecycle of a stream: Open -> Iterating -> Closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Iterating,
    Closed,
}

/// Sort direction for scandir
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Sort entry names lexicographically
pub fn sort_names(names: &mut [String], order: SortOrder) {
    names.sort();
    if order == SortOrder::Descending {
        names.reverse();
    }
}

/// One open directory traversal
///
/// The entry list is fixed when the stream is opened; later changes to the
/// directory are not seen, not even after a rewind.
#[derive(Debug, Clone)]
pub struct DirectoryStream {
    path: String,
    entries: Vec<String>,
    cursor: usize,
    state: StreamState,
    backing: StreamBacking,
}

impl DirectoryStream {
    pub fn new(path: impl Into<String>, entries: Vec<String>, backing: StreamBacking) -> Self {
        Self {
            path: path.into(),
            entries,
            cursor: 0,
            state: StreamState::Open,
            backing,
        }
    }

    /// Path the stream was opened on
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn backing(&self) -> StreamBacking {
        self.backing
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// The snapshot, regardless of the cursor
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Next entry name, or `None` once exhausted
    pub fn read(&mut self) -> Result<Option<String>> {
        if self.state == StreamState::Closed {
            return Err(FsError::StreamClosed);
        }

        self.state = StreamState::Iterating;
        let entry = self.entries.get(self.cursor).cloned();
        if entry.is_some() {
            self.cursor += 1;
        }
        Ok(entry)
    }

    /// Back to the first entry; the snapshot is not refreshed
    pub fn rewind(&mut self) -> Result<()> {
        if self.state == StreamState::Closed {
            return Err(FsError::StreamClosed);
        }
        self.cursor = 0;
        Ok(())
    }

    /// Release the snapshot
    pub fn close(&mut self) -> Result<()> {
        if self.state == StreamState::Closed {
            return Err(FsError::StreamClosed);
        }
        self.state = StreamState::Closed;
        self.entries = Vec::new();
        self.path.clear();
        self.cursor = 0;
        Ok(())
    }
}

impl Iterator for DirectoryStream {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.read().ok().flatten()
    }
}

/// Handle of a stream registered with a [`crate::WinFs`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirHandle(u64);

impl DirHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Open streams plus the last-opened slot used when callers omit a handle
#[derive(Debug, Default)]
pub(crate) struct DirTable {
    streams: HashMap<DirHandle, DirectoryStream>,
    next_id: u64,
    last_opened: Option<DirHandle>,
}

impl DirTable {
    /// Register a stream; it becomes the default for handle-less calls
    pub(crate) fn insert(&mut self, stream: DirectoryStream) -> DirHandle {
        self.next_id += 1;
        let handle = DirHandle(self.next_id);
        self.streams.insert(handle, stream);
        self.last_opened = Some(handle);
        handle
    }

    /// Run `f` on the stream for `handle`, or the last opened one
    pub(crate) fn with<T, F>(&mut self, handle: Option<DirHandle>, f: F) -> Result<T>
    where
        F: FnOnce(&mut DirectoryStream) -> Result<T>,
    {
        let handle = handle.or(self.last_opened).ok_or(FsError::NoOpenStream)?;
        let stream = self.streams.get_mut(&handle).ok_or(FsError::StreamClosed)?;
        f(stream)
    }

    /// Close and forget a stream
    ///
    /// The last-opened slot keeps pointing at the closed handle, so a later
    /// handle-less call reports [`FsError::StreamClosed`].
    pub(crate) fn close(&mut self, handle: Option<DirHandle>) -> Result<()> {
        let handle = handle.or(self.last_opened).ok_or(FsError::NoOpenStream)?;
        let mut stream = self.streams.remove(&handle).ok_or(FsError::StreamClosed)?;
        stream.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> DirectoryStream {
        DirectoryStream::new(
            "/data",
            vec![".".into(), "..".into(), "ü.txt".into()],
            StreamBacking::Service,
        )
    }

    #[test]
    fn test_read_rewind() {
        let mut s = stream();
        assert_eq!(s.state(), StreamState::Open);
        assert_eq!(s.read().unwrap().as_deref(), Some("."));
        assert_eq!(s.state(), StreamState::Iterating);
        assert_eq!(s.read().unwrap().as_deref(), Some(".."));
        assert_eq!(s.read().unwrap().as_deref(), Some("ü.txt"));
        assert_eq!(s.read().unwrap(), None);
        assert_eq!(s.read().unwrap(), None);

        s.rewind().unwrap();
        assert_eq!(s.read().unwrap().as_deref(), Some("."));
    }

    #[test]
    fn test_closed_stream_errors() {
        let mut s = stream();
        s.close().unwrap();
        assert_eq!(s.state(), StreamState::Closed);
        assert!(s.entries().is_empty());
        assert!(matches!(s.read(), Err(FsError::StreamClosed)));
        assert!(matches!(s.rewind(), Err(FsError::StreamClosed)));
        assert!(matches!(s.close(), Err(FsError::StreamClosed)));
        assert_eq!(s.next(), None);
    }

    #[test]
    fn test_iterator() {
        let names: Vec<String> = stream().collect();
        assert_eq!(names, vec![".", "..", "ü.txt"]);
    }

    #[test]
    fn test_table_default_slot() {
        let mut table = DirTable::default();
        assert!(matches!(table.with(None, |s| s.read()), Err(FsError::NoOpenStream)));

        let first = table.insert(stream());
        let second = table.insert(DirectoryStream::new("/x", vec!["a".into()], StreamBacking::Native));

        assert_eq!(table.with(None, |s| s.read()).unwrap().as_deref(), Some("a"));
        assert_eq!(table.with(Some(first), |s| s.read()).unwrap().as_deref(), Some("."));

        table.close(None).unwrap();
        assert!(matches!(table.with(None, |s| s.read()), Err(FsError::StreamClosed)));
        assert!(matches!(table.close(Some(second)), Err(FsError::StreamClosed)));
        assert!(table.with(Some(first), |s| s.read()).is_ok());
    }

    #[test]
    fn test_sort_names() {
        let mut names: Vec<String> = vec!["b".into(), "..".into(), "a".into(), ".".into()];
        sort_names(&mut names, SortOrder::Ascending);
        assert_eq!(names, vec![".", "..", "a", "b"]);
        sort_names(&mut names, SortOrder::Descending);
        assert_eq!(names, vec!["b", "a", "..", "."]);
    }
}
