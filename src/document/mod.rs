//! Document model.
//!
//! - [`Document`]: immutable content plus layered metadata with a lineage id
//! - [`DocumentBuilder`]: creates new lineages and derived documents
//! - [`Content`]: lazily read bytes with a memoized [`Fingerprint`]
//! - [`DocumentCollection`]: published output per pipeline

mod collection;
mod content;
mod model;

pub use collection::DocumentCollection;
pub use content::{Content, ContentProvider, Fingerprint};
pub use model::{Document, DocumentBuilder, DocumentId};
