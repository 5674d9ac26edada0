//! Path normalization - absolute, separator-normalized path strings

use serde::{Deserialize, Serialize};
use std::fmt;

/// An absolute path in canonical separator form
///
/// Always starts with a separator, carries a drive/scheme colon, or starts
/// with the working directory the normalizer prepended.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbsolutePath(String);

impl AbsolutePath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for AbsolutePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AbsolutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Converts user supplied paths into [`AbsolutePath`]s
///
/// Pure string transformation: no filesystem access, no failure modes.
#[derive(Debug, Clone)]
pub struct PathNormalizer {
    separator: char,
    /// Fixed working directory; `None` reads the process cwd on each call
    base: Option<String>,
}

impl Default for PathNormalizer {
    fn default() -> Self {
        Self {
            separator: std::path::MAIN_SEPARATOR,
            base: None,
        }
    }
}

impl PathNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific separator instead of the platform one
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Resolve relative paths against `base` instead of the process cwd
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// Make `path` absolute
    ///
    /// Forward slashes become the separator. Paths starting with the
    /// separator or containing a colon are already absolute; anything else is
    /// prefixed with the working directory.
    pub fn normalize(&self, path: &str) -> AbsolutePath {
        let path = self.replace_slashes(path);

        if path.starts_with(self.separator) || path.contains(':') {
            return AbsolutePath(path);
        }

        let cwd = match &self.base {
            Some(base) => base.clone(),
            None => std::env::current_dir()
                .map(|dir| dir.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let cwd = self.replace_slashes(&cwd);
        let cwd = cwd.trim_end_matches(self.separator);

        AbsolutePath(format!("{}{}{}", cwd, self.separator, path))
    }

    /// Remove `.` components and resolve `..` without touching the disk
    ///
    /// `..` never climbs above the root.
    pub fn collapse(&self, path: &AbsolutePath) -> AbsolutePath {
        AbsolutePath(collapse(path.as_str(), self.separator))
    }

    fn replace_slashes(&self, path: &str) -> String {
        if self.separator == '/' {
            path.to_string()
        } else {
            path.replace('/', &self.separator.to_string())
        }
    }
}

/// Split an absolute path into its root and its non-empty components
///
/// Roots: a run of leading separators (`/`, `\\` for UNC), or a drive
/// component such as `C:` followed by its separator.
pub(crate) fn split_root(path: &str, sep: char) -> (&str, Vec<&str>) {
    let root_len = if path.starts_with(sep) {
        path.len() - path.trim_start_matches(sep).len()
    } else {
        match path.find(sep) {
            Some(idx) if path[..idx].contains(':') => idx + sep.len_utf8(),
            None if path.contains(':') => path.len(),
            _ => 0,
        }
    };

    let (root, rest) = path.split_at(root_len);
    let components = rest.split(sep).filter(|c| !c.is_empty()).collect();
    (root, components)
}

/// Resolve `.` and `..` components of an absolute path string
pub(crate) fn collapse(path: &str, sep: char) -> String {
    let (root, components) = split_root(path, sep);

    let mut stack: Vec<&str> = Vec::with_capacity(components.len());
    for component in components {
        match component {
            "." => {}
            ".." => {
                stack.pop();
            }
            _ => stack.push(component),
        }
    }

    format!("{}{}", root, stack.join(&sep.to_string()))
}

/// Split a path into its parent and final component
///
/// Returns `None` for a bare root.
pub(crate) fn split_parent(path: &str, sep: char) -> Option<(String, String)> {
    let (root, mut components) = split_root(path, sep);
    let name = components.pop()?.to_string();
    let parent = format!("{}{}", root, components.join(&sep.to_string()));
    Some((parent, name))
}

/// Append a component to a directory path
pub(crate) fn join(dir: &str, name: &str, sep: char) -> String {
    if dir.ends_with(sep) || dir.is_empty() {
        format!("{}{}", dir, name)
    } else {
        format!("{}{}{}", dir, sep, name)
    }
}
