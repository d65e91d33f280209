//! In-memory file provider.
//!
//! Useful for embedded resources (themes bundled into a binary), for virtual
//! schemes and for tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::provider::{FileProvider, SearchOption};
use super::NormalizedPath;
use crate::error::{Error, Result};

#[derive(Default)]
struct Entries {
    /// Keyed by (possibly lowercased) full path.
    files: BTreeMap<String, (NormalizedPath, Arc<[u8]>)>,
    directories: BTreeMap<String, NormalizedPath>,
}

/// A map-backed provider with configurable case sensitivity.
///
/// Parent directories of every inserted file exist implicitly.
///
/// # Example
///
/// ```ignore
/// use folio::io::MemoryFileProvider;
///
/// let theme = MemoryFileProvider::new()
///     .with_file("/layout/base.html", "<html>{{content}}</html>")
///     .with_file("/assets/site.css", "body {}");
/// fs.add_file_provider("theme", theme);
/// ```
pub struct MemoryFileProvider {
    entries: RwLock<Entries>,
    case_sensitive: bool,
}

impl Default for MemoryFileProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFileProvider {
    /// Create an empty case-sensitive provider.
    pub fn new() -> Self {
        let provider = Self {
            entries: RwLock::new(Entries::default()),
            case_sensitive: true,
        };
        provider.add_directory(&NormalizedPath::root());
        provider
    }

    /// Create an empty case-insensitive provider.
    pub fn case_insensitive() -> Self {
        Self {
            case_sensitive: false,
            ..Self::new()
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_file(self, path: impl Into<NormalizedPath>, content: impl AsRef<[u8]>) -> Self {
        self.insert(path, content);
        self
    }

    /// Builder-style [`add_directory`](Self::add_directory).
    pub fn with_directory(self, path: impl Into<NormalizedPath>) -> Self {
        self.add_directory(&path.into());
        self
    }

    /// Insert or replace a file. Relative paths are rooted at `/`.
    pub fn insert(&self, path: impl Into<NormalizedPath>, content: impl AsRef<[u8]>) {
        let path = NormalizedPath::root().combine(&path.into().without_scheme());
        if let Some(parent) = path.parent() {
            self.add_directory(&parent);
        }
        let key = self.key(&path);
        self.entries
            .write()
            .files
            .insert(key, (path, Arc::from(content.as_ref())));
    }

    /// Add a directory and all of its ancestors.
    pub fn add_directory(&self, path: &NormalizedPath) {
        let path = NormalizedPath::root().combine(&path.without_scheme());
        let mut entries = self.entries.write();
        let mut current = Some(path);
        while let Some(dir) = current {
            let key = self.key(&dir);
            if entries.directories.contains_key(&key) {
                break;
            }
            current = dir.parent();
            entries.directories.insert(key, dir);
        }
    }

    /// Remove a file, returning its content.
    pub fn remove(&self, path: impl Into<NormalizedPath>) -> Option<Arc<[u8]>> {
        let key = self.key(&path.into());
        self.entries.write().files.remove(&key).map(|(_, c)| c)
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.entries.read().files.len()
    }

    /// Whether the provider holds no files.
    pub fn is_empty(&self) -> bool {
        self.entries.read().files.is_empty()
    }

    fn key(&self, path: &NormalizedPath) -> String {
        let full = path.full_path();
        if self.case_sensitive {
            full
        } else {
            full.to_lowercase()
        }
    }

    fn is_under(&self, path: &NormalizedPath, dir: &NormalizedPath, search: SearchOption) -> bool {
        let depth = path.segments().len();
        let base = dir.segments().len();
        match search {
            SearchOption::TopDirectoryOnly if depth != base + 1 => false,
            _ if depth <= base => false,
            _ => path.starts_with(dir, self.case_sensitive),
        }
    }
}

impl FileProvider for MemoryFileProvider {
    fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn file_exists(&self, path: &NormalizedPath) -> bool {
        self.entries.read().files.contains_key(&self.key(path))
    }

    fn directory_exists(&self, path: &NormalizedPath) -> bool {
        self.entries.read().directories.contains_key(&self.key(path))
    }

    fn read_file(&self, path: &NormalizedPath) -> Result<Vec<u8>> {
        self.entries
            .read()
            .files
            .get(&self.key(path))
            .map(|(_, content)| content.to_vec())
            .ok_or_else(|| Error::not_found(path.to_string()))
    }

    fn list_files(
        &self,
        directory: &NormalizedPath,
        search: SearchOption,
    ) -> Result<Vec<NormalizedPath>> {
        let directory = directory.without_scheme();
        Ok(self
            .entries
            .read()
            .files
            .values()
            .filter(|(path, _)| self.is_under(path, &directory, search))
            .map(|(path, _)| path.clone())
            .collect())
    }

    fn list_directories(
        &self,
        directory: &NormalizedPath,
        search: SearchOption,
    ) -> Result<Vec<NormalizedPath>> {
        let directory = directory.without_scheme();
        Ok(self
            .entries
            .read()
            .directories
            .values()
            .filter(|path| self.is_under(path, &directory, search))
            .cloned()
            .collect())
    }

    fn write_file(&self, path: &NormalizedPath, content: &[u8]) -> Result<()> {
        self.insert(path, content);
        Ok(())
    }

    fn delete_file(&self, path: &NormalizedPath) -> Result<()> {
        self.remove(path)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(path.to_string()))
    }

    fn create_directory(&self, path: &NormalizedPath) -> Result<()> {
        self.add_directory(path);
        Ok(())
    }

    fn delete_directory(&self, path: &NormalizedPath, recursive: bool) -> Result<()> {
        let dir = path.without_scheme();
        if !self.directory_exists(&dir) {
            return Err(Error::not_found(path.to_string()));
        }
        let mut entries = self.entries.write();
        let nested = |p: &NormalizedPath| p.segments().len() > dir.segments().len()
            && p.starts_with(&dir, self.case_sensitive);
        let has_children = entries.files.values().any(|(p, _)| nested(p))
            || entries.directories.values().any(|p| nested(p));
        if has_children && !recursive {
            return Err(Error::io(
                dir.to_path_buf(),
                std::io::Error::other("directory is not empty"),
            ));
        }
        entries.files.retain(|_, (p, _)| !nested(p));
        entries.directories.retain(|_, p| !nested(p));
        entries.directories.remove(&self.key(&dir));
        Ok(())
    }
}
