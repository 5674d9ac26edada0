//! Portable short-name service
//!
//! Stores every non-ASCII name on disk under a generated 8.3 style alias
//! (`STEM~N.EXT`). Each folder holding aliases keeps a small TOML index
//! (`.winfs-names.toml`) mapping alias to logical name, plus the names that
//! carry the hidden attribute, so any process pointed at the same tree sees
//! the same names.
//!
//! Entries created by other tools keep their on-disk name; their short path
//! is their literal path.

use crate::encoding::CP_UTF8;
use crate::path::{collapse, join, split_parent, split_root};
use crate::service::{FolderListing, NameService};
use crate::{FsError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;
use xxhash_rust::xxh3::xxh3_64;

const SEP: char = std::path::MAIN_SEPARATOR;

/// Index file kept in every folder that holds aliases or hidden names
pub const INDEX_FILE: &str = ".winfs-names.toml";

const INDEX_TMP_FILE: &str = ".winfs-names.toml.tmp";

/// Characters allowed in a short name besides ASCII alphanumerics
const SHORT_NAME_EXTRA: &str = "_-$!#%&'@^`{}~";

/// Alias records of one physical folder
#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct FolderIndex {
    /// On-disk alias -> logical name
    names: BTreeMap<String, String>,

    /// Logical names carrying the hidden attribute
    hidden: BTreeSet<String>,
}

impl FolderIndex {
    /// Read the index of `dir`; a missing folder or file is an empty index
    fn load(dir: &str) -> io::Result<Self> {
        if !Path::new(dir).is_dir() {
            return Ok(Self::default());
        }

        let content = match fs::read_to_string(Path::new(dir).join(INDEX_FILE)) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e),
        };

        toml::from_str(&content).map_err(|e| {
            io::Error::new(
                ErrorKind::InvalidData,
                format!("corrupt {} in {}: {}", INDEX_FILE, dir, e),
            )
        })
    }

    /// Write the index of `dir`, removing the file once it is empty
    fn save(&self, dir: &str) -> io::Result<()> {
        let path = Path::new(dir).join(INDEX_FILE);

        if self.names.is_empty() && self.hidden.is_empty() {
            return match fs::remove_file(&path) {
                Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            };
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e.to_string()))?;
        let tmp = Path::new(dir).join(INDEX_TMP_FILE);
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)
    }

    fn alias_of(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .find(|(_, logical)| logical.as_str() == name)
            .map(|(alias, _)| alias.as_str())
    }

    /// On-disk name of `name` inside this folder
    fn physical_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.alias_of(name).unwrap_or(name)
    }

    /// Drop records whose entry is gone from `dir`
    fn prune(&mut self, dir: &str) {
        self.names
            .retain(|alias, _| fs::symlink_metadata(join(dir, alias, SEP)).is_ok());

        let gone: Vec<String> = self
            .hidden
            .iter()
            .filter(|name| fs::symlink_metadata(join(dir, self.physical_name(name), SEP)).is_err())
            .cloned()
            .collect();
        for name in gone {
            self.hidden.remove(&name);
        }
    }

    fn forget(&mut self, name: &str) {
        self.names.retain(|_, logical| logical != name);
        self.hidden.remove(name);
    }
}

/// Upper-cased, filtered stem (max 6) and extension (max 3) of a long name
fn short_name_parts(name: &str) -> (String, String) {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (name, ""),
    };

    let clean = |s: &str, max: usize| -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric() || SHORT_NAME_EXTRA.contains(*c))
            .map(|c| c.to_ascii_uppercase())
            .take(max)
            .collect()
    };

    let mut short_stem = clean(stem, 6);
    if short_stem.len() < 2 {
        // Too little ASCII left: use a hash like the native generator does
        let hash = xxh3_64(name.as_bytes()) & 0xFFFF;
        short_stem = format!("{}{:04X}", short_stem, hash);
    }

    (short_stem, clean(ext, 3))
}

fn short_name_candidate(stem: &str, ext: &str, n: u32) -> String {
    let tail = format!("~{}", n);
    let keep = 8usize.saturating_sub(tail.len()).min(stem.len());
    let base = format!("{}{}", &stem[..keep], tail);

    if ext.is_empty() {
        base
    } else {
        format!("{}.{}", base, ext)
    }
}

fn is_index_file(name: &str) -> bool {
    name == INDEX_FILE || name == INDEX_TMP_FILE
}

fn io_error(kind: ErrorKind, msg: &str) -> io::Error {
    io::Error::new(kind, msg.to_string())
}

/// Name service emulating 8.3 short names with per-folder alias indexes
#[derive(Debug, Default)]
pub struct ShortNameService {
    /// Serializes index read-modify-write cycles within the process
    lock: Mutex<()>,
}

impl ShortNameService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct for a caller speaking `code_page`
    ///
    /// Only UTF-8 callers are supported.
    pub fn connect(code_page: u32) -> Result<Self> {
        if code_page != CP_UTF8 {
            return Err(FsError::ServiceUnavailable(format!(
                "unsupported code page {}",
                code_page
            )));
        }
        Ok(Self::new())
    }

    /// Physical path of a collapsed logical path
    ///
    /// ASCII components are never aliased, so only non-ASCII ones consult
    /// their folder's index.
    fn locate(logical: &str) -> io::Result<String> {
        let (root, components) = split_root(logical, SEP);
        let mut physical = root.to_string();

        for component in components {
            let name = if component.is_ascii() {
                component.to_string()
            } else {
                FolderIndex::load(&physical)?.physical_name(component).to_string()
            };
            physical = join(&physical, &name, SEP);
        }

        Ok(physical)
    }

    fn locate_for(op: &'static str, logical: &str) -> Result<String> {
        Self::locate(logical).map_err(|e| FsError::service(op, logical, e))
    }

    fn metadata(&self, logical: &str) -> Option<fs::Metadata> {
        let physical = Self::locate(&collapse(logical, SEP)).ok()?;
        fs::metadata(physical).ok()
    }

    /// Parent folder (logical, physical) and leaf name of a new entry
    fn parent_of(op: &'static str, logical: &str) -> Result<(String, String)> {
        let (parent, name) = split_parent(logical, SEP).ok_or_else(|| {
            FsError::service(op, logical, io_error(ErrorKind::InvalidInput, "path is a root"))
        })?;

        let parent_physical = Self::locate_for(op, &parent)?;
        if !fs::metadata(&parent_physical).map(|m| m.is_dir()).unwrap_or(false) {
            return Err(FsError::service(
                op,
                logical,
                io_error(ErrorKind::NotFound, "parent folder not found"),
            ));
        }

        Ok((parent_physical, name))
    }

    /// Pick and record the on-disk name for a new entry `name` in `dir`
    fn allocate(dir: &str, name: &str) -> io::Result<String> {
        if name.is_ascii() {
            return Ok(name.to_string());
        }

        let mut index = FolderIndex::load(dir)?;
        index.prune(dir);
        index.names.retain(|_, logical| logical != name);

        let (stem, ext) = short_name_parts(name);
        let alias = (1u32..)
            .map(|n| short_name_candidate(&stem, &ext, n))
            .find(|candidate| {
                !index.names.contains_key(candidate)
                    && fs::symlink_metadata(join(dir, candidate, SEP)).is_err()
            })
            .unwrap_or_else(|| name.to_string());

        index.names.insert(alias.clone(), name.to_string());
        index.save(dir)?;

        tracing::debug!("Alias {} -> {} in {}", name, alias, dir);
        Ok(alias)
    }

    /// Drop every record of `name` in `dir`
    fn release(dir: &str, name: &str) -> io::Result<()> {
        let mut index = FolderIndex::load(dir)?;
        if index.alias_of(name).is_none() && !index.hidden.contains(name) {
            return Ok(());
        }
        index.forget(name);
        index.save(dir)
    }

    /// Release after a failed disk operation; the original error wins
    fn rollback(dir: &str, name: &str) {
        if let Err(e) = Self::release(dir, name) {
            tracing::warn!("Could not roll back alias of {} in {}: {}", name, dir, e);
        }
    }

    /// Shared body of move_file / move_folder
    fn move_entry(&self, op: &'static str, from: &str, to: &str, want_dir: bool) -> Result<()> {
        let from = collapse(from, SEP);
        let to = collapse(to, SEP);
        let _guard = self.lock.lock();

        let from_physical = Self::locate_for(op, &from)?;
        let is_match = fs::metadata(&from_physical)
            .map(|m| m.is_dir() == want_dir)
            .unwrap_or(false);
        if !is_match {
            return Err(FsError::service(op, from, io_error(ErrorKind::NotFound, "source not found")));
        }

        if want_dir && (to == from || to.starts_with(&format!("{}{}", from, SEP))) {
            return Err(FsError::service(
                op,
                to,
                io_error(ErrorKind::InvalidInput, "cannot move a folder into itself"),
            ));
        }

        let (to_dir, to_name) = Self::parent_of(op, &to)?;
        if fs::symlink_metadata(Self::locate_for(op, &to)?).is_ok() {
            return Err(FsError::service(op, to, io_error(ErrorKind::AlreadyExists, "destination exists")));
        }

        let (from_dir, from_name) = Self::parent_of(op, &from)?;
        let hidden = FolderIndex::load(&from_dir)
            .map(|index| index.hidden.contains(&from_name))
            .map_err(|e| FsError::service(op, from.clone(), e))?;

        let alias = Self::allocate(&to_dir, &to_name).map_err(|e| FsError::service(op, to.clone(), e))?;
        if let Err(e) = fs::rename(&from_physical, join(&to_dir, &alias, SEP)) {
            Self::rollback(&to_dir, &to_name);
            return Err(FsError::service(op, from, e));
        }

        Self::release(&from_dir, &from_name).map_err(|e| FsError::service(op, from.clone(), e))?;
        if hidden {
            let mut index = FolderIndex::load(&to_dir).map_err(|e| FsError::service(op, to.clone(), e))?;
            index.hidden.insert(to_name);
            index.save(&to_dir).map_err(|e| FsError::service(op, to.clone(), e))?;
        }

        tracing::debug!("Moved {} -> {}", from, to);
        Ok(())
    }
}

impl NameService for ShortNameService {
    fn file_exists(&self, path: &str) -> Result<bool> {
        Ok(self.metadata(path).is_some_and(|m| m.is_file()))
    }

    fn folder_exists(&self, path: &str) -> Result<bool> {
        Ok(self.metadata(path).is_some_and(|m| m.is_dir()))
    }

    fn short_path(&self, path: &str) -> Result<String> {
        let physical = Self::locate_for("short_path", &collapse(path, SEP))?;
        if fs::symlink_metadata(&physical).is_err() {
            return Err(FsError::NotFound(path.to_string()));
        }
        Ok(physical)
    }

    fn list_folder(&self, path: &str) -> Result<FolderListing> {
        const OP: &str = "list_folder";
        let physical = Self::locate_for(OP, &collapse(path, SEP))?;

        let metadata = fs::metadata(&physical).map_err(|_| FsError::NotFound(path.to_string()))?;
        if !metadata.is_dir() {
            return Err(FsError::NotAFolder(path.to_string()));
        }

        let index = FolderIndex::load(&physical).map_err(|e| FsError::service(OP, path, e))?;
        let mut listing = FolderListing::default();

        let entries = fs::read_dir(&physical).map_err(|e| FsError::service(OP, path, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| FsError::service(OP, path, e))?;
            let on_disk = entry.file_name().to_string_lossy().into_owned();
            if is_index_file(&on_disk) {
                continue;
            }
            let name = index.names.get(&on_disk).cloned().unwrap_or(on_disk);

            let is_dir = entry
                .path()
                .metadata()
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if is_dir {
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
        Ok(collapse(path, SEP))
    }

    fn create_text_file(&self, path: &str, overwrite: bool) -> Result<()> {
        const OP: &str = "create_text_file";
        let logical = collapse(path, SEP);
        let _guard = self.lock.lock();

        let physical = Self::locate_for(OP, &logical)?;
        if let Ok(metadata) = fs::metadata(&physical) {
            if metadata.is_dir() || !overwrite {
                return Err(FsError::service(OP, logical, io_error(ErrorKind::AlreadyExists, "file exists")));
            }
            fs::File::create(&physical).map_err(|e| FsError::service(OP, path, e))?;
            return Ok(());
        }

        let (dir, name) = Self::parent_of(OP, &logical)?;
        let alias = Self::allocate(&dir, &name).map_err(|e| FsError::service(OP, logical.clone(), e))?;
        if let Err(e) = fs::File::create(join(&dir, &alias, SEP)) {
            Self::rollback(&dir, &name);
            return Err(FsError::service(OP, logical, e));
        }
        Ok(())
    }

    fn create_folder(&self, path: &str) -> Result<()> {
        const OP: &str = "create_folder";
        let logical = collapse(path, SEP);
        let _guard = self.lock.lock();

        if fs::symlink_metadata(Self::locate_for(OP, &logical)?).is_ok() {
            return Err(FsError::service(OP, logical, io_error(ErrorKind::AlreadyExists, "already exists")));
        }

        let (dir, name) = Self::parent_of(OP, &logical)?;
        let alias = Self::allocate(&dir, &name).map_err(|e| FsError::service(OP, logical.clone(), e))?;
        if let Err(e) = fs::create_dir(join(&dir, &alias, SEP)) {
            Self::rollback(&dir, &name);
            return Err(FsError::service(OP, logical, e));
        }
        Ok(())
    }

    fn delete_file(&self, path: &str, force: bool) -> Result<()> {
        const OP: &str = "delete_file";
        let logical = collapse(path, SEP);
        let _guard = self.lock.lock();
        let physical = Self::locate_for(OP, &logical)?;

        let metadata = fs::metadata(&physical)
            .ok()
            .filter(|m| m.is_file())
            .ok_or_else(|| FsError::service(OP, path, io_error(ErrorKind::NotFound, "file not found")))?;

        if force && metadata.permissions().readonly() {
            let mut permissions = metadata.permissions();
            #[allow(clippy::permissions_set_readonly_false)]
            permissions.set_readonly(false);
            fs::set_permissions(&physical, permissions).map_err(|e| FsError::service(OP, path, e))?;
        }

        fs::remove_file(&physical).map_err(|e| FsError::service(OP, path, e))?;

        let (dir, name) = Self::parent_of(OP, &logical)?;
        Self::release(&dir, &name).map_err(|e| FsError::service(OP, path, e))
    }

    fn delete_folder(&self, path: &str) -> Result<()> {
        const OP: &str = "delete_folder";
        let logical = collapse(path, SEP);
        let _guard = self.lock.lock();
        let physical = Self::locate_for(OP, &logical)?;

        if !fs::metadata(&physical).map(|m| m.is_dir()).unwrap_or(false) {
            return Err(FsError::service(OP, path, io_error(ErrorKind::NotFound, "folder not found")));
        }

        fs::remove_dir_all(&physical).map_err(|e| FsError::service(OP, path, e))?;

        let (dir, name) = Self::parent_of(OP, &logical)?;
        Self::release(&dir, &name).map_err(|e| FsError::service(OP, path, e))
    }

    fn copy_file(&self, from: &str, to: &str, overwrite: bool) -> Result<()> {
        const OP: &str = "copy_file";
        let from = collapse(from, SEP);
        let to = collapse(to, SEP);
        let _guard = self.lock.lock();

        let from_physical = Self::locate_for(OP, &from)?;
        if !fs::metadata(&from_physical).map(|m| m.is_file()).unwrap_or(false) {
            return Err(FsError::service(OP, from, io_error(ErrorKind::NotFound, "source not found")));
        }

        let to_physical = Self::locate_for(OP, &to)?;
        if let Ok(metadata) = fs::metadata(&to_physical) {
            if metadata.is_dir() || !overwrite {
                return Err(FsError::service(OP, to, io_error(ErrorKind::AlreadyExists, "destination exists")));
            }
            fs::copy(&from_physical, &to_physical).map_err(|e| FsError::service(OP, to, e))?;
            return Ok(());
        }

        let (dir, name) = Self::parent_of(OP, &to)?;
        let alias = Self::allocate(&dir, &name).map_err(|e| FsError::service(OP, to.clone(), e))?;
        if let Err(e) = fs::copy(&from_physical, join(&dir, &alias, SEP)) {
            Self::rollback(&dir, &name);
            return Err(FsError::service(OP, to, e));
        }
        Ok(())
    }

    fn move_file(&self, from: &str, to: &str) -> Result<()> {
        self.move_entry("move_file", from, to, false)
    }

    fn move_folder(&self, from: &str, to: &str) -> Result<()> {
        self.move_entry("move_folder", from, to, true)
    }

    fn set_hidden(&self, path: &str) -> Result<()> {
        const OP: &str = "set_hidden";
        let logical = collapse(path, SEP);
        let _guard = self.lock.lock();

        let physical = Self::locate_for(OP, &logical)?;
        if !fs::metadata(physical).map(|m| m.is_file()).unwrap_or(false) {
            return Err(FsError::NotFound(path.to_string()));
        }

        let (dir, name) = Self::parent_of(OP, &logical)?;
        let mut index = FolderIndex::load(&dir).map_err(|e| FsError::service(OP, path, e))?;
        if index.hidden.insert(name) {
            index.save(&dir).map_err(|e| FsError::service(OP, path, e))?;
        }
        Ok(())
    }

    fn is_hidden(&self, path: &str) -> Result<bool> {
        const OP: &str = "is_hidden";
        let logical = collapse(path, SEP);

        if fs::symlink_metadata(Self::locate_for(OP, &logical)?).is_err() {
            return Err(FsError::NotFound(path.to_string()));
        }

        let (dir, name) = Self::parent_of(OP, &logical)?;
        let index = FolderIndex::load(&dir).map_err(|e| FsError::service(OP, path, e))?;
        Ok(index.hidden.contains(&name))
    }

    fn forget(&self, path: &str) -> Result<()> {
        const OP: &str = "forget";
        let logical = collapse(path, SEP);
        let _guard = self.lock.lock();

        let Some((parent, name)) = split_parent(&logical, SEP) else {
            return Ok(());
        };
        let dir = Self::locate_for(OP, &parent)?;
        Self::release(&dir, &name).map_err(|e| FsError::service(OP, path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: String,
        service: ShortNameService,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().to_string_lossy().into_owned();
            Self {
                _dir: dir,
                root,
                service: ShortNameService::new(),
            }
        }

        fn path(&self, name: &str) -> String {
            join(&self.root, name, SEP)
        }
    }

    #[test]
    fn test_short_name_generation() {
        assert_eq!(short_name_parts("Résumé final.docx"), ("RSUMFI".to_string(), "DOC".to_string()));
        assert_eq!(short_name_candidate("RSUMFI", "DOC", 1), "RSUMFI~1.DOC");
        assert_eq!(short_name_candidate("RSUMFI", "DOC", 12), "RSUMF~12.DOC");

        let (stem, ext) = short_name_parts("データ.txt");
        assert_eq!(stem.len(), 4);
        assert_eq!(ext, "TXT");
    }

    #[test]
    fn test_create_gets_ascii_alias() {
        let fx = Fixture::new();
        let file = fx.path("データ.txt");

        fx.service.create_text_file(&file, false).unwrap();
        assert!(fx.service.file_exists(&file).unwrap());
        assert!(!fx.service.folder_exists(&file).unwrap());

        let short = fx.service.short_path(&file).unwrap();
        assert_ne!(short, file);
        assert!(short.is_ascii());
        assert!(std::path::Path::new(&short).is_file());

        // Second create without overwrite fails
        assert!(fx.service.create_text_file(&file, false).is_err());
        assert!(fx.service.create_text_file(&file, true).is_ok());
    }

    #[test]
    fn test_names_survive_a_new_instance() {
        let fx = Fixture::new();
        let folder = fx.path("Папка");
        let file = join(&folder, "データ.txt", SEP);
        fx.service.create_folder(&folder).unwrap();
        fx.service.create_text_file(&file, false).unwrap();
        fx.service.set_hidden(&file).unwrap();
        let short = fx.service.short_path(&file).unwrap();

        let other = ShortNameService::new();
        assert!(other.folder_exists(&folder).unwrap());
        assert!(other.file_exists(&file).unwrap());
        assert!(other.is_hidden(&file).unwrap());
        assert_eq!(other.short_path(&file).unwrap(), short);
        assert_eq!(other.list_folder(&folder).unwrap().files, vec!["データ.txt".to_string()]);

        // No second alias for the same name
        assert!(other.create_text_file(&file, false).is_err());
        let on_disk: Vec<_> = fs::read_dir(other.short_path(&folder).unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| !is_index_file(name))
            .collect();
        assert_eq!(on_disk.len(), 1);
    }

    #[test]
    fn test_index_file_lifecycle() {
        let fx = Fixture::new();
        let file = fx.path("ü.txt");
        let index = Path::new(&fx.root).join(INDEX_FILE);

        fx.service.create_text_file(&fx.path("plain.txt"), false).unwrap();
        assert!(!index.exists());

        fx.service.create_text_file(&file, false).unwrap();
        assert!(index.exists());
        let alias = Path::new(&fx.service.short_path(&file).unwrap())
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        let stored = FolderIndex::load(&fx.root).unwrap();
        assert_eq!(stored.names.get(&alias).map(String::as_str), Some("ü.txt"));

        fx.service.delete_file(&file, false).unwrap();
        assert!(!index.exists());

        fs::write(&index, "names = 3").unwrap();
        assert!(!fx.service.file_exists(&file).unwrap());
        assert!(fx.service.create_text_file(&file, false).is_err());
    }

    #[test]
    fn test_forget_drops_stale_alias() {
        let fx = Fixture::new();
        let file = fx.path("データ.txt");
        fx.service.create_text_file(&file, false).unwrap();
        let short = fx.service.short_path(&file).unwrap();

        // Removed behind the service's back, then the alias name is reused
        fs::remove_file(&short).unwrap();
        fx.service.forget(&file).unwrap();
        fs::write(&short, b"foreign").unwrap();

        assert!(!fx.service.file_exists(&file).unwrap());
        let alias = Path::new(&short).file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(fx.service.list_folder(&fx.root).unwrap().files, vec![alias]);
    }

    #[test]
    fn test_colliding_aliases() {
        let fx = Fixture::new();
        let a = fx.path("ÄBCDEFGH.txt");
        let b = fx.path("ÅBCDEFGH.txt");
        fx.service.create_text_file(&a, false).unwrap();
        fx.service.create_text_file(&b, false).unwrap();

        let short_a = fx.service.short_path(&a).unwrap();
        let short_b = fx.service.short_path(&b).unwrap();
        assert_ne!(short_a, short_b);
    }

    #[test]
    fn test_list_folder_reports_logical_names() {
        let fx = Fixture::new();
        fx.service.create_folder(&fx.path("Папка")).unwrap();
        fx.service.create_text_file(&fx.path("日本語.txt"), false).unwrap();
        fs::write(fx.path("plain.txt"), b"x").unwrap();

        let listing = fx.service.list_folder(&fx.root).unwrap();
        assert_eq!(listing.folders, vec!["Папка".to_string()]);
        assert_eq!(listing.files, vec!["plain.txt".to_string(), "日本語.txt".to_string()]);

        assert!(matches!(
            fx.service.list_folder(&fx.path("plain.txt")),
            Err(FsError::NotAFolder(_))
        ));
        assert!(matches!(
            fx.service.list_folder(&fx.path("missing")),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn test_nested_unicode_folders() {
        let fx = Fixture::new();
        let outer = fx.path("Ωmega");
        let inner = join(&outer, "Δelta", SEP);
        let file = join(&inner, "ñ.txt", SEP);

        fx.service.create_folder(&outer).unwrap();
        fx.service.create_folder(&inner).unwrap();
        fx.service.create_text_file(&file, false).unwrap();

        let short = fx.service.short_path(&file).unwrap();
        assert!(short.is_ascii());
        assert!(short.starts_with(&fx.root));
    }

    #[test]
    fn test_move_folder_keeps_children() {
        let fx = Fixture::new();
        let from = fx.path("Ωmega");
        let file = join(&from, "ñ.txt", SEP);
        fx.service.create_folder(&from).unwrap();
        fx.service.create_text_file(&file, false).unwrap();
        fx.service.set_hidden(&file).unwrap();

        let to = fx.path("Σigma");
        fx.service.move_folder(&from, &to).unwrap();

        let moved = join(&to, "ñ.txt", SEP);
        assert!(!fx.service.folder_exists(&from).unwrap());
        assert!(fx.service.file_exists(&moved).unwrap());
        assert!(fx.service.is_hidden(&moved).unwrap());

        assert!(fx.service.move_folder(&to, &join(&to, "inner", SEP)).is_err());
    }

    #[test]
    fn test_move_file_carries_hidden() {
        let fx = Fixture::new();
        let a = fx.path("α.txt");
        fx.service.create_folder(&fx.path("Ziel")).unwrap();
        fx.service.create_text_file(&a, false).unwrap();
        fx.service.set_hidden(&a).unwrap();

        let b = join(&fx.path("Ziel"), "β.txt", SEP);
        fx.service.move_file(&a, &b).unwrap();
        assert!(!fx.service.file_exists(&a).unwrap());
        assert!(fx.service.is_hidden(&b).unwrap());
        assert!(FolderIndex::load(&fx.root).unwrap().hidden.is_empty());
    }

    #[test]
    fn test_move_file_refuses_existing_target() {
        let fx = Fixture::new();
        let a = fx.path("α.txt");
        let b = fx.path("β.txt");
        fx.service.create_text_file(&a, false).unwrap();
        fx.service.create_text_file(&b, false).unwrap();

        assert!(fx.service.move_file(&a, &b).is_err());
        assert!(fx.service.file_exists(&a).unwrap());
    }

    #[test]
    fn test_copy_and_delete() {
        let fx = Fixture::new();
        let a = fx.path("α.txt");
        let b = fx.path("β.txt");
        fx.service.create_text_file(&a, false).unwrap();
        fs::write(fx.service.short_path(&a).unwrap(), b"payload").unwrap();

        fx.service.copy_file(&a, &b, false).unwrap();
        assert_eq!(fs::read(fx.service.short_path(&b).unwrap()).unwrap(), b"payload");
        assert!(fx.service.copy_file(&a, &b, false).is_err());
        assert!(fx.service.copy_file(&a, &b, true).is_ok());

        fx.service.delete_file(&b, true).unwrap();
        assert!(!fx.service.file_exists(&b).unwrap());
        assert!(fx.service.delete_file(&b, true).is_err());

        let folder = fx.path("Ωmega");
        fx.service.create_folder(&folder).unwrap();
        fx.service.create_text_file(&join(&folder, "x", SEP), false).unwrap();
        fx.service.delete_folder(&folder).unwrap();
        assert!(!fx.service.folder_exists(&folder).unwrap());
    }

    #[test]
    fn test_hidden_requires_file() {
        let fx = Fixture::new();
        assert!(matches!(fx.service.set_hidden(&fx.path("nope")), Err(FsError::NotFound(_))));

        let file = fx.path("ü.txt");
        fx.service.create_text_file(&file, false).unwrap();
        assert!(!fx.service.is_hidden(&file).unwrap());
        fx.service.set_hidden(&file).unwrap();
        assert!(fx.service.is_hidden(&file).unwrap());
    }

    #[test]
    fn test_connect_code_page() {
        assert!(ShortNameService::connect(CP_UTF8).is_ok());
        assert!(matches!(
            ShortNameService::connect(1252),
            Err(FsError::ServiceUnavailable(_))
        ));
    }
}
