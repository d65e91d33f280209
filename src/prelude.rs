//! Prelude module for convenient imports.
//!
//! ```ignore
//! use folio::prelude::*;
//! ```

// Engine
pub use crate::config::{ConfigBuilder, EngineConfig, Settings};
pub use crate::execution::{shared, Engine, ExecutionContext, Module, Pipeline};

// Documents & metadata
pub use crate::document::{Document, DocumentBuilder};
pub use crate::meta::{keys, MetaValue, MetadataStack};

// Caching
pub use crate::cache::CacheKey;

// Errors
pub use crate::error::{Error, Result};

// Modules
pub use crate::modules::{
    Concat, Documents, Execute, GroupBy, OrderBy, Paginate, ReadFiles, WriteFiles,
};
