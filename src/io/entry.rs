//! File and directory handles.

use std::fmt;
use std::sync::Arc;

use super::provider::{FileProvider, SearchOption};
use super::NormalizedPath;
use crate::error::{Error, Result};

// =============================================================================
// FileEntry
// =============================================================================

/// A file resolved to its provider. The file need not exist.
#[derive(Clone)]
pub struct FileEntry {
    path: NormalizedPath,
    provider: Arc<dyn FileProvider>,
}

impl FileEntry {
    /// Bind an absolute path to a provider.
    pub fn new(path: NormalizedPath, provider: Arc<dyn FileProvider>) -> Self {
        Self { path, provider }
    }

    /// Absolute, scheme-qualified path.
    pub fn path(&self) -> &NormalizedPath {
        &self.path
    }

    /// Provider serving this file.
    pub fn provider(&self) -> &Arc<dyn FileProvider> {
        &self.provider
    }

    /// Whether the file exists.
    pub fn exists(&self) -> bool {
        self.provider.file_exists(&self.path.without_scheme())
    }

    /// Whether the backing provider compares paths case-sensitively.
    pub fn is_case_sensitive(&self) -> bool {
        self.provider.is_case_sensitive()
    }

    /// Read the file's bytes.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        self.provider.read_file(&self.path.without_scheme())
    }

    /// Read the file as UTF-8, replacing invalid sequences.
    pub fn read_to_string(&self) -> Result<String> {
        let bytes = self.read_bytes()?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }

    /// Create or replace the file.
    pub fn write(&self, content: impl AsRef<[u8]>) -> Result<()> {
        self.provider
            .write_file(&self.path.without_scheme(), content.as_ref())
    }

    /// Delete the file.
    pub fn delete(&self) -> Result<()> {
        self.provider.delete_file(&self.path.without_scheme())
    }

    /// Directory containing this file.
    pub fn directory(&self) -> ProviderDirectory {
        let parent = self.path.parent().unwrap_or_else(|| self.path.clone());
        ProviderDirectory::new(parent, self.provider.clone())
    }
}

impl fmt::Debug for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FileEntry").field(&self.path.to_string()).finish()
    }
}

impl fmt::Display for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.path.fmt(f)
    }
}

// =============================================================================
// Directory Trait
// =============================================================================

/// A directory, either physical (one provider) or virtual (all input roots).
pub trait Directory: Send + Sync {
    /// Path of this directory. Absolute for physical directories, relative
    /// for virtual input directories.
    fn path(&self) -> &NormalizedPath;

    /// Whether the directory exists.
    fn exists(&self) -> bool;

    /// Whether matching under this directory is case-sensitive.
    fn is_case_sensitive(&self) -> bool;

    /// Parent directory, `None` at the top.
    fn parent(&self) -> Option<Box<dyn Directory>>;

    /// Create the directory.
    fn create(&self) -> Result<()>;

    /// Delete the directory.
    fn delete(&self, recursive: bool) -> Result<()>;

    /// Child directories.
    fn get_directories(&self, search: SearchOption) -> Result<Vec<Box<dyn Directory>>>;

    /// Files in this directory.
    fn get_files(&self, search: SearchOption) -> Result<Vec<FileEntry>> {
        Ok(self
            .get_relative_files(search)?
            .into_iter()
            .map(|(_, file)| file)
            .collect())
    }

    /// Files paired with their path relative to this directory.
    fn get_relative_files(&self, search: SearchOption) -> Result<Vec<(NormalizedPath, FileEntry)>>;

    /// A file below this directory. `path` must be relative.
    fn get_file(&self, path: &NormalizedPath) -> Result<FileEntry>;

    /// A directory below this directory. `path` must be relative.
    fn get_directory(&self, path: &NormalizedPath) -> Result<Box<dyn Directory>>;
}

impl fmt::Debug for dyn Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Directory").field(&self.path().to_string()).finish()
    }
}

pub(crate) fn require_relative(path: &NormalizedPath) -> Result<()> {
    if path.is_absolute() {
        return Err(Error::invalid_path(path, "expected a relative path"));
    }
    Ok(())
}

// =============================================================================
// ProviderDirectory
// =============================================================================

/// A physical directory on a single provider.
#[derive(Clone)]
pub struct ProviderDirectory {
    path: NormalizedPath,
    provider: Arc<dyn FileProvider>,
}

impl ProviderDirectory {
    /// Bind an absolute path to a provider.
    pub fn new(path: NormalizedPath, provider: Arc<dyn FileProvider>) -> Self {
        Self { path, provider }
    }

    /// Provider serving this directory.
    pub fn provider(&self) -> &Arc<dyn FileProvider> {
        &self.provider
    }

    fn qualify(&self, path: NormalizedPath) -> NormalizedPath {
        path.with_scheme(self.path.scheme())
    }
}

impl fmt::Debug for ProviderDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProviderDirectory")
            .field(&self.path.to_string())
            .finish()
    }
}

impl Directory for ProviderDirectory {
    fn path(&self) -> &NormalizedPath {
        &self.path
    }

    fn exists(&self) -> bool {
        self.provider.directory_exists(&self.path.without_scheme())
    }

    fn is_case_sensitive(&self) -> bool {
        self.provider.is_case_sensitive()
    }

    fn parent(&self) -> Option<Box<dyn Directory>> {
        let parent = self.path.parent()?;
        Some(Box::new(Self::new(parent, self.provider.clone())))
    }

    fn create(&self) -> Result<()> {
        self.provider.create_directory(&self.path.without_scheme())
    }

    fn delete(&self, recursive: bool) -> Result<()> {
        self.provider
            .delete_directory(&self.path.without_scheme(), recursive)
    }

    fn get_directories(&self, search: SearchOption) -> Result<Vec<Box<dyn Directory>>> {
        Ok(self
            .provider
            .list_directories(&self.path.without_scheme(), search)?
            .into_iter()
            .map(|p| Box::new(Self::new(self.qualify(p), self.provider.clone())) as Box<dyn Directory>)
            .collect())
    }

    fn get_relative_files(&self, search: SearchOption) -> Result<Vec<(NormalizedPath, FileEntry)>> {
        let base = self.path.without_scheme();
        let case_sensitive = self.provider.is_case_sensitive();
        Ok(self
            .provider
            .list_files(&base, search)?
            .into_iter()
            .filter_map(|p| {
                let relative = p.relative_to(&base, case_sensitive)?;
                Some((relative, FileEntry::new(self.qualify(p), self.provider.clone())))
            })
            .collect())
    }

    fn get_file(&self, path: &NormalizedPath) -> Result<FileEntry> {
        require_relative(path)?;
        Ok(FileEntry::new(self.path.combine(path), self.provider.clone()))
    }

    fn get_directory(&self, path: &NormalizedPath) -> Result<Box<dyn Directory>> {
        require_relative(path)?;
        Ok(Box::new(Self::new(self.path.combine(path), self.provider.clone())))
    }
}
