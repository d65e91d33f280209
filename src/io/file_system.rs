//! The engine's file system: root, input roots, output path and providers.
//!
//! # Resolution Rules
//!
//! ```text
//! root:    /site
//! inputs:  theme, input            (registration order)
//! output:  output
//!
//! get_input_file("css/site.css")
//!   1. /site/input/css/site.css    exists? -> use it
//!   2. /site/theme/css/site.css    exists? -> use it
//!   3. neither                     -> /site/input/css/site.css
//! ```
//!
//! The last-registered input root wins, both for single lookups and when
//! listings from several roots are merged, so site content overrides theme
//! content.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::entry::{Directory, FileEntry, ProviderDirectory};
use super::glob;
use super::path::DEFAULT_SCHEME;
use super::provider::{FileProvider, LocalFileProvider};
use super::virtual_dir::VirtualInputDirectory;
use super::NormalizedPath;
use crate::error::{Error, Result};

/// Default input roots, in registration order.
pub const DEFAULT_INPUT_PATHS: [&str; 2] = ["theme", "input"];
/// Default output directory.
pub const DEFAULT_OUTPUT_PATH: &str = "output";

#[derive(Clone)]
struct Inner {
    root_path: NormalizedPath,
    input_paths: Vec<NormalizedPath>,
    output_path: NormalizedPath,
    providers: FxHashMap<String, Arc<dyn FileProvider>>,
}

/// Root, input and output paths plus the scheme to provider routing table.
///
/// Cloning is cheap; configuration setters copy on write, so clones handed
/// to modules during a pass keep a stable view.
#[derive(Clone)]
pub struct FileSystem {
    inner: Arc<Inner>,
}

impl Default for FileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem {
    /// File system rooted at the current directory with the default local provider.
    pub fn new() -> Self {
        let root_path = std::env::current_dir()
            .map(NormalizedPath::from)
            .unwrap_or_else(|_| NormalizedPath::root());
        let mut providers: FxHashMap<String, Arc<dyn FileProvider>> = FxHashMap::default();
        providers.insert(DEFAULT_SCHEME.to_string(), Arc::new(LocalFileProvider));
        Self {
            inner: Arc::new(Inner {
                root_path,
                input_paths: DEFAULT_INPUT_PATHS.iter().map(|p| NormalizedPath::new(p)).collect(),
                output_path: NormalizedPath::new(DEFAULT_OUTPUT_PATH),
                providers,
            }),
        }
    }

    fn inner_mut(&mut self) -> &mut Inner {
        Arc::make_mut(&mut self.inner)
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Root all relative paths resolve against.
    pub fn root_path(&self) -> &NormalizedPath {
        &self.inner.root_path
    }

    /// Set the root path. It must be absolute.
    pub fn set_root_path(&mut self, path: impl Into<NormalizedPath>) -> Result<()> {
        let path = path.into();
        if path.is_relative() {
            return Err(Error::invalid_path(path, "root path must be absolute"));
        }
        self.inner_mut().root_path = path;
        Ok(())
    }

    /// Input roots in registration order, as configured.
    pub fn input_paths(&self) -> &[NormalizedPath] {
        &self.inner.input_paths
    }

    /// Register another input root. Later roots take precedence.
    pub fn add_input_path(&mut self, path: impl Into<NormalizedPath>) {
        self.inner_mut().input_paths.push(path.into());
    }

    /// Remove every input root.
    pub fn clear_input_paths(&mut self) {
        self.inner_mut().input_paths.clear();
    }

    /// Output directory, as configured.
    pub fn output_path(&self) -> &NormalizedPath {
        &self.inner.output_path
    }

    /// Set the output directory.
    pub fn set_output_path(&mut self, path: impl Into<NormalizedPath>) {
        self.inner_mut().output_path = path.into();
    }

    /// Register (or replace) the provider for `scheme`.
    pub fn add_file_provider<P: FileProvider + 'static>(&mut self, scheme: &str, provider: P) {
        self.add_shared_file_provider(scheme, Arc::new(provider));
    }

    /// Register (or replace) a shared provider for `scheme`.
    pub fn add_shared_file_provider(&mut self, scheme: &str, provider: Arc<dyn FileProvider>) {
        let scheme = if scheme.is_empty() { DEFAULT_SCHEME } else { scheme };
        self.inner_mut()
            .providers
            .insert(scheme.to_ascii_lowercase(), provider);
    }

    /// Whether a provider is registered for `scheme`.
    pub fn has_file_provider(&self, scheme: &str) -> bool {
        self.inner.providers.contains_key(&scheme.to_ascii_lowercase())
    }

    // =========================================================================
    // Providers
    // =========================================================================

    /// Provider for an absolute path, chosen by its scheme.
    pub fn get_file_provider(&self, path: &NormalizedPath) -> Result<Arc<dyn FileProvider>> {
        if path.is_relative() {
            return Err(Error::invalid_path(path, "provider lookup needs an absolute path"));
        }
        let scheme = path.scheme().unwrap_or(DEFAULT_SCHEME);
        self.inner
            .providers
            .get(&scheme.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Error::ProviderNotFound {
                scheme: scheme.to_string(),
            })
    }

    /// Make a path absolute against the root.
    pub fn absolute(&self, path: &NormalizedPath) -> NormalizedPath {
        self.inner.root_path.combine(path)
    }

    // =========================================================================
    // Files and directories
    // =========================================================================

    /// A file. Relative paths resolve against the root.
    pub fn get_file(&self, path: impl Into<NormalizedPath>) -> Result<FileEntry> {
        let path = self.absolute(&path.into());
        let provider = self.get_file_provider(&path)?;
        Ok(FileEntry::new(path, provider))
    }

    /// A directory. Relative paths resolve against the root.
    pub fn get_directory(&self, path: impl Into<NormalizedPath>) -> Result<ProviderDirectory> {
        let path = self.absolute(&path.into());
        let provider = self.get_file_provider(&path)?;
        Ok(ProviderDirectory::new(path, provider))
    }

    /// The root directory.
    pub fn get_root_directory(&self) -> Result<ProviderDirectory> {
        self.get_directory(self.inner.root_path.clone())
    }

    /// Absolute input roots, in registration order.
    pub fn absolute_input_paths(&self) -> Vec<NormalizedPath> {
        self.inner
            .input_paths
            .iter()
            .map(|p| self.absolute(p))
            .collect()
    }

    /// Resolve a file against the input roots.
    ///
    /// Absolute paths are returned as is. Relative paths check the roots from
    /// the last-registered to the first and return the first existing file;
    /// when none exists, the path under the last-registered root.
    pub fn get_input_file(&self, path: impl Into<NormalizedPath>) -> Result<FileEntry> {
        let path = path.into();
        if path.is_absolute() {
            return self.get_file(path);
        }
        let roots = self.absolute_input_paths();
        for root in roots.iter().rev() {
            let file = self.get_file(root.combine(&path))?;
            if file.exists() {
                return Ok(file);
            }
        }
        match roots.last() {
            Some(root) => self.get_file(root.combine(&path)),
            None => self.get_file(path),
        }
    }

    /// An input directory: virtual for relative paths, physical for absolute ones.
    pub fn get_input_directory(&self, path: impl Into<NormalizedPath>) -> Result<Box<dyn Directory>> {
        let path = path.into();
        if path.is_absolute() {
            return Ok(Box::new(self.get_directory(path)?));
        }
        Ok(Box::new(VirtualInputDirectory::new(self.clone(), path)?))
    }

    /// The virtual directory spanning all input roots.
    pub fn get_input_root(&self) -> VirtualInputDirectory {
        VirtualInputDirectory::root(self.clone())
    }

    /// Physical input root directories, in registration order.
    pub fn get_input_directories(&self) -> Result<Vec<ProviderDirectory>> {
        self.absolute_input_paths()
            .into_iter()
            .map(|p| self.get_directory(p))
            .collect()
    }

    /// The input root a path belongs to.
    ///
    /// For absolute paths, the longest input root that is a segment-wise
    /// prefix. For relative paths, the last-registered root under which the
    /// file or directory exists. `None` when nothing matches.
    pub fn get_containing_input_path(
        &self,
        path: impl Into<NormalizedPath>,
    ) -> Result<Option<NormalizedPath>> {
        let path = path.into();
        let roots = self.absolute_input_paths();

        if path.is_absolute() {
            let case_sensitive = self.get_file_provider(&path)?.is_case_sensitive();
            let mut best: Option<NormalizedPath> = None;
            for root in roots {
                let longer = best
                    .as_ref()
                    .is_none_or(|b| root.segments().len() > b.segments().len());
                if longer && path.starts_with(&root, case_sensitive) {
                    best = Some(root);
                }
            }
            return Ok(best);
        }

        for root in roots.into_iter().rev() {
            let candidate = root.combine(&path);
            let provider = self.get_file_provider(&candidate)?;
            let plain = candidate.without_scheme();
            if provider.file_exists(&plain) || provider.directory_exists(&plain) {
                return Ok(Some(root));
            }
        }
        Ok(None)
    }

    /// Absolute output directory.
    pub fn absolute_output_path(&self) -> NormalizedPath {
        self.absolute(&self.inner.output_path)
    }

    /// An output file. Relative paths resolve against the output directory.
    pub fn get_output_file(&self, path: impl Into<NormalizedPath>) -> Result<FileEntry> {
        self.get_file(self.absolute_output_path().combine(&path.into()))
    }

    /// An output directory. Relative paths resolve against the output directory.
    pub fn get_output_directory(&self, path: impl Into<NormalizedPath>) -> Result<ProviderDirectory> {
        self.get_directory(self.absolute_output_path().combine(&path.into()))
    }

    // =========================================================================
    // Globbing
    // =========================================================================

    /// Files under `directory` matching `patterns`.
    ///
    /// Patterns starting with `!` exclude. Inclusions are unioned in order
    /// without duplicates, then exclusions are removed. Absolute or
    /// scheme-qualified patterns ignore `directory`.
    pub fn get_files<I, S>(&self, directory: &dyn Directory, patterns: I) -> Result<Vec<FileEntry>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        glob::get_files(self, directory, patterns)
    }

    /// Files across all input roots matching `patterns`.
    pub fn get_input_files<I, S>(&self, patterns: I) -> Result<Vec<FileEntry>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.get_files(&self.get_input_root(), patterns)
    }
}

impl std::fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut schemes: Vec<_> = self.inner.providers.keys().collect();
        schemes.sort();
        f.debug_struct("FileSystem")
            .field("root_path", &self.inner.root_path.to_string())
            .field("input_paths", &self.inner.input_paths)
            .field("output_path", &self.inner.output_path.to_string())
            .field("providers", &schemes)
            .finish()
    }
}
