//! Virtual file system.
//!
//! - [`NormalizedPath`]: scheme-aware logical paths
//! - [`FileProvider`]: pluggable backends ([`LocalFileProvider`], [`MemoryFileProvider`])
//! - [`FileEntry`] / [`Directory`]: handles resolved to a provider
//! - [`VirtualInputDirectory`]: one logical directory over every input root
//! - [`FileSystem`]: root, input roots, output path, provider routing and globbing
//!
//! # Example
//!
//! ```ignore
//! use folio::io::{FileSystem, MemoryFileProvider};
//!
//! let mut fs = FileSystem::new();
//! fs.set_root_path("/site")?;
//! fs.add_file_provider("embedded", MemoryFileProvider::new().with_file("/theme.css", "body {}"));
//!
//! let posts = fs.get_input_files(["posts/**/*.md", "!**/drafts/**"])?;
//! let css = fs.get_file("embedded|/theme.css")?.read_to_string()?;
//! ```

mod entry;
mod file_system;
mod glob;
mod memory;
mod path;
mod provider;
mod virtual_dir;

pub use entry::{Directory, FileEntry, ProviderDirectory};
pub use file_system::{FileSystem, DEFAULT_INPUT_PATHS, DEFAULT_OUTPUT_PATH};
pub use memory::MemoryFileProvider;
pub use path::{NormalizedPath, DEFAULT_SCHEME};
pub use provider::{FileProvider, LocalFileProvider, SearchOption};
pub use virtual_dir::VirtualInputDirectory;
