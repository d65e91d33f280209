//! File provider trait and the local disk provider.
//!
//! A provider answers existence, read and listing requests for one path
//! scheme. The [`FileSystem`](super::FileSystem) routes every absolute path to
//! the provider registered for its scheme.

use std::fs;

use walkdir::WalkDir;

use super::NormalizedPath;
use crate::error::{Error, Result};

/// Depth of a directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SearchOption {
    /// Immediate children only.
    #[default]
    TopDirectoryOnly,
    /// All descendants.
    AllDirectories,
}

// =============================================================================
// FileProvider Trait
// =============================================================================

/// A pluggable file backend.
///
/// Paths given to a provider are absolute and scheme-less; paths returned by
/// listings are absolute and scheme-less too.
///
/// Mutating operations are optional: the defaults report
/// [`Error::UnsupportedOperation`].
///
/// # Example
///
/// ```ignore
/// use folio::io::{FileProvider, NormalizedPath, SearchOption};
///
/// struct Embedded(&'static [(&'static str, &'static [u8])]);
///
/// impl FileProvider for Embedded {
///     fn file_exists(&self, path: &NormalizedPath) -> bool {
///         self.0.iter().any(|(p, _)| *p == path.full_path())
///     }
///     // ...
/// }
/// ```
pub trait FileProvider: Send + Sync {
    /// Whether path comparisons on this provider are case-sensitive.
    fn is_case_sensitive(&self) -> bool {
        true
    }

    /// Whether a file exists at `path`.
    fn file_exists(&self, path: &NormalizedPath) -> bool;

    /// Whether a directory exists at `path`.
    fn directory_exists(&self, path: &NormalizedPath) -> bool;

    /// Read the whole file.
    fn read_file(&self, path: &NormalizedPath) -> Result<Vec<u8>>;

    /// Files under `directory`.
    fn list_files(&self, directory: &NormalizedPath, search: SearchOption)
    -> Result<Vec<NormalizedPath>>;

    /// Directories under `directory`.
    fn list_directories(
        &self,
        directory: &NormalizedPath,
        search: SearchOption,
    ) -> Result<Vec<NormalizedPath>>;

    /// Create or replace a file, creating parent directories as needed.
    fn write_file(&self, path: &NormalizedPath, _content: &[u8]) -> Result<()> {
        Err(Error::unsupported(format!("writing {path}")))
    }

    /// Delete a file.
    fn delete_file(&self, path: &NormalizedPath) -> Result<()> {
        Err(Error::unsupported(format!("deleting {path}")))
    }

    /// Create a directory and its parents.
    fn create_directory(&self, path: &NormalizedPath) -> Result<()> {
        Err(Error::unsupported(format!("creating {path}")))
    }

    /// Delete a directory, with its contents when `recursive`.
    fn delete_directory(&self, path: &NormalizedPath, _recursive: bool) -> Result<()> {
        Err(Error::unsupported(format!("deleting {path}")))
    }
}

// =============================================================================
// LocalFileProvider
// =============================================================================

/// Provider backed by the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileProvider;

impl LocalFileProvider {
    /// Create the local provider.
    pub fn new() -> Self {
        Self
    }

    fn walk(
        directory: &NormalizedPath,
        search: SearchOption,
        want_dirs: bool,
    ) -> Result<Vec<NormalizedPath>> {
        let root = directory.to_path_buf();
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let mut walker = WalkDir::new(&root).min_depth(1).sort_by_file_name();
        if search == SearchOption::TopDirectoryOnly {
            walker = walker.max_depth(1);
        }

        let mut paths = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map_or_else(|| root.clone(), |p| p.to_path_buf());
                Error::io(path, e.into())
            })?;
            if entry.file_type().is_dir() == want_dirs {
                paths.push(NormalizedPath::from(entry.path()));
            }
        }
        Ok(paths)
    }
}

impl FileProvider for LocalFileProvider {
    fn is_case_sensitive(&self) -> bool {
        cfg!(not(any(windows, target_os = "macos")))
    }

    fn file_exists(&self, path: &NormalizedPath) -> bool {
        path.to_path_buf().is_file()
    }

    fn directory_exists(&self, path: &NormalizedPath) -> bool {
        path.to_path_buf().is_dir()
    }

    fn read_file(&self, path: &NormalizedPath) -> Result<Vec<u8>> {
        let path = path.to_path_buf();
        fs::read(&path).map_err(|e| Error::io(path, e))
    }

    fn list_files(
        &self,
        directory: &NormalizedPath,
        search: SearchOption,
    ) -> Result<Vec<NormalizedPath>> {
        Self::walk(directory, search, false)
    }

    fn list_directories(
        &self,
        directory: &NormalizedPath,
        search: SearchOption,
    ) -> Result<Vec<NormalizedPath>> {
        Self::walk(directory, search, true)
    }

    fn write_file(&self, path: &NormalizedPath, content: &[u8]) -> Result<()> {
        let path = path.to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(&path, content).map_err(|e| Error::io(path, e))
    }

    fn delete_file(&self, path: &NormalizedPath) -> Result<()> {
        let path = path.to_path_buf();
        fs::remove_file(&path).map_err(|e| Error::io(path, e))
    }

    fn create_directory(&self, path: &NormalizedPath) -> Result<()> {
        let path = path.to_path_buf();
        fs::create_dir_all(&path).map_err(|e| Error::io(path, e))
    }

    fn delete_directory(&self, path: &NormalizedPath, recursive: bool) -> Result<()> {
        let path = path.to_path_buf();
        let result = if recursive {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_dir(&path)
        };
        result.map_err(|e| Error::io(path, e))
    }
}
