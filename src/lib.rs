//! # folio
//!
//! A static content build engine. Documents flow through named pipelines of
//! modules; the engine runs every pipeline once per pass and publishes each
//! pipeline's output for the pipelines that follow.
//!
//! - **Documents**: immutable content plus layered metadata, tracked by lineage
//! - **Virtual file system**: overlaid input roots, pluggable providers, globbing
//! - **Caching**: per-module caches that survive between passes while used
//! - **Incremental passes**: pipelines can skip documents whose content is unchanged
//!
//! ## Quick Start
//!
//! ```ignore
//! use folio::prelude::*;
//!
//! let mut engine = Engine::new();
//! engine.file_system_mut().set_root_path("/srv/site")?;
//! engine.pipelines_mut().add(
//!     Pipeline::new("Posts")
//!         .with(ReadFiles::new(["posts/*.md"]))
//!         .with(OrderBy::new("Date").descending())
//!         .with(WriteFiles::new().extension("html"))
//!         .process_documents_once(true),
//! )?;
//! engine.execute()?;
//!
//! for post in engine.documents().from_pipeline("Posts") {
//!     println!("{}", post.source_string());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: settings and engine configuration
//! - [`meta`]: metadata values and the layered store
//! - [`io`]: paths, providers and the virtual file system
//! - [`document`]: documents, content and the published collection
//! - [`cache`]: per-module execution caches
//! - [`execution`]: engine, pipelines, module trait and context
//! - [`modules`]: built-in modules
//!
//! ## Features
//!
//! - `parallel` (default): fan documents out over a rayon thread pool

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod execution;
pub mod io;
pub mod meta;
pub mod modules;
pub mod prelude;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::{CacheHandle, CacheKey, ExecutionCache, ExecutionCacheManager};
pub use config::{ConfigBuilder, EngineConfig, Settings};
pub use document::{Document, DocumentBuilder, DocumentCollection, DocumentId};
pub use error::{Error, ErrorKind, ExitCode, Result};
pub use execution::{shared, Engine, ExecutionContext, Module, Pipeline, PipelineCollection};
pub use io::{FileSystem, NormalizedPath};
pub use meta::{MetaValue, MetadataStack};
