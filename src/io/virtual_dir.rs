//! Logical directories spanning every input root.

use indexmap::IndexMap;

use super::entry::{require_relative, Directory, FileEntry};
use super::file_system::FileSystem;
use super::provider::SearchOption;
use super::NormalizedPath;
use crate::error::{Error, Result};

/// A relative directory resolved against all input roots at once.
///
/// ```text
/// input roots:   /site/theme        /site/input
/// virtual dir:   posts/  ──►  /site/theme/posts  +  /site/input/posts
/// ```
///
/// Listings merge every existing physical directory. When the same relative
/// file exists under several roots, the one from the last-registered root
/// wins. Creation and deletion are unsupported.
#[derive(Clone)]
pub struct VirtualInputDirectory {
    file_system: FileSystem,
    path: NormalizedPath,
}

impl VirtualInputDirectory {
    /// Create a virtual directory. `path` must be relative.
    pub fn new(file_system: FileSystem, path: NormalizedPath) -> Result<Self> {
        require_relative(&path)?;
        Ok(Self { file_system, path })
    }

    /// The virtual directory spanning the top of every input root.
    pub fn root(file_system: FileSystem) -> Self {
        Self {
            file_system,
            path: NormalizedPath::empty(),
        }
    }

    /// Physical directories backing this one that currently exist, in root
    /// registration order.
    pub fn existing_directories(&self) -> Result<Vec<Box<dyn Directory>>> {
        let mut existing = Vec::new();
        for root in self.file_system.get_input_directories()? {
            let dir = root.get_directory(&self.path)?;
            if dir.exists() {
                existing.push(dir);
            }
        }
        Ok(existing)
    }

    fn key(&self, path: &NormalizedPath, case_sensitive: bool) -> String {
        let full = path.full_path();
        if case_sensitive {
            full
        } else {
            full.to_lowercase()
        }
    }
}

impl std::fmt::Debug for VirtualInputDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("VirtualInputDirectory")
            .field(&self.path.full_path())
            .finish()
    }
}

impl Directory for VirtualInputDirectory {
    fn path(&self) -> &NormalizedPath {
        &self.path
    }

    fn exists(&self) -> bool {
        self.existing_directories()
            .map(|dirs| !dirs.is_empty())
            .unwrap_or(false)
    }

    /// Case-sensitive if any contributing directory is. With no contributing
    /// directory, case-sensitive.
    fn is_case_sensitive(&self) -> bool {
        match self.existing_directories() {
            Ok(dirs) if !dirs.is_empty() => dirs.iter().any(|d| d.is_case_sensitive()),
            _ => true,
        }
    }

    fn parent(&self) -> Option<Box<dyn Directory>> {
        let parent = self.path.parent()?;
        Some(Box::new(Self {
            file_system: self.file_system.clone(),
            path: parent,
        }))
    }

    fn create(&self) -> Result<()> {
        Err(Error::unsupported(format!(
            "cannot create virtual input directory `{}`",
            self.path.full_path()
        )))
    }

    fn delete(&self, _recursive: bool) -> Result<()> {
        Err(Error::unsupported(format!(
            "cannot delete virtual input directory `{}`",
            self.path.full_path()
        )))
    }

    fn get_directories(&self, search: SearchOption) -> Result<Vec<Box<dyn Directory>>> {
        let case_sensitive = self.is_case_sensitive();
        let mut merged: IndexMap<String, NormalizedPath> = IndexMap::new();
        for dir in self.existing_directories()? {
            for child in dir.get_directories(search)? {
                if let Some(relative) = child.path().relative_to(dir.path(), case_sensitive) {
                    let path = self.path.combine(&relative);
                    merged.insert(self.key(&path, case_sensitive), path);
                }
            }
        }
        Ok(merged
            .into_values()
            .map(|path| {
                Box::new(Self {
                    file_system: self.file_system.clone(),
                    path,
                }) as Box<dyn Directory>
            })
            .collect())
    }

    fn get_relative_files(&self, search: SearchOption) -> Result<Vec<(NormalizedPath, FileEntry)>> {
        let case_sensitive = self.is_case_sensitive();
        let mut merged: IndexMap<String, (NormalizedPath, FileEntry)> = IndexMap::new();
        for dir in self.existing_directories()? {
            for (relative, file) in dir.get_relative_files(search)? {
                // Later roots overwrite earlier ones.
                merged.insert(self.key(&relative, case_sensitive), (relative, file));
            }
        }
        Ok(merged.into_values().collect())
    }

    fn get_file(&self, path: &NormalizedPath) -> Result<FileEntry> {
        require_relative(path)?;
        self.file_system.get_input_file(&self.path.combine(path))
    }

    fn get_directory(&self, path: &NormalizedPath) -> Result<Box<dyn Directory>> {
        require_relative(path)?;
        Ok(Box::new(Self {
            file_system: self.file_system.clone(),
            path: self.path.combine(path),
        }))
    }
}
