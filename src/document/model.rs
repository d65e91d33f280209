//! Immutable documents and their builder.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::content::{Content, ContentProvider, Fingerprint};
use crate::error::{Error, Result};
use crate::io::{FileEntry, NormalizedPath};
use crate::meta::{FromMeta, MetaValue, MetadataStack};

// =============================================================================
// DocumentId
// =============================================================================

/// Source of fresh lineage ids. Starts at 1; 0 is never handed out.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a document lineage.
///
/// Assigned when a document is created from scratch and inherited by every
/// document derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Document
// =============================================================================

struct Data {
    id: DocumentId,
    source: Option<NormalizedPath>,
    content: Content,
    metadata: MetadataStack,
}

/// An immutable unit of content plus metadata.
///
/// "Changing" a document means deriving a new one with
/// [`derive`](Self::derive); the original is untouched and the derived
/// document keeps the same [`DocumentId`] and source.
///
/// # Example
///
/// ```ignore
/// let page = Document::builder()
///     .source("/site/input/index.md")
///     .text("# Hello")
///     .meta("Title", "Home")
///     .build()?;
///
/// let rendered = page.derive().text("<h1>Hello</h1>").build()?;
/// assert_eq!(rendered.id(), page.id());
/// ```
#[derive(Clone)]
pub struct Document(Arc<Data>);

impl Document {
    /// Start a new lineage.
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::new()
    }

    /// Start a document derived from this one: same id, same source, same
    /// content and metadata until overridden.
    pub fn derive(&self) -> DocumentBuilder {
        DocumentBuilder {
            id: Some(self.0.id),
            source: self.0.source.clone(),
            content: self.0.content.clone(),
            metadata: self.0.metadata.clone(),
            pending: Vec::new(),
            error: None,
        }
    }

    /// Derive with extra metadata. Infallible since the source is unchanged.
    pub fn with_metadata<K, V>(&self, items: impl IntoIterator<Item = (K, V)>) -> Document
    where
        K: Into<String>,
        V: Into<MetaValue>,
    {
        Self(Arc::new(Data {
            id: self.0.id,
            source: self.0.source.clone(),
            content: self.0.content.clone(),
            metadata: self.0.metadata.push(items),
        }))
    }

    /// Lineage id.
    pub fn id(&self) -> DocumentId {
        self.0.id
    }

    /// Originating logical path, if any.
    pub fn source(&self) -> Option<&NormalizedPath> {
        self.0.source.as_ref()
    }

    /// Source rendered for messages, `"<no source>"` when unset.
    pub fn source_string(&self) -> String {
        self.0
            .source
            .as_ref()
            .map_or_else(|| "<no source>".to_string(), |s| s.to_string())
    }

    /// Content handle.
    pub fn content(&self) -> &Content {
        &self.0.content
    }

    /// Metadata store.
    pub fn metadata(&self) -> &MetadataStack {
        &self.0.metadata
    }

    /// Raw metadata value.
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0.metadata.get(key)
    }

    /// Coerced metadata value.
    pub fn get_as<T: FromMeta>(&self, key: &str) -> Option<T> {
        self.0.metadata.get_as(key)
    }

    /// Metadata value as a string.
    pub fn string(&self, key: &str) -> Option<String> {
        self.0.metadata.string(key)
    }

    /// Read the content as text.
    pub fn read_string(&self) -> Result<String> {
        self.0.content.read_string()
    }

    /// Read the content as bytes.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        self.0.content.read_bytes()
    }

    /// Content fingerprint.
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        self.0.content.fingerprint()
    }

    /// Whether both handles point at the same document value.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.0.id)
            .field("source", &self.0.source.as_ref().map(|s| s.to_string()))
            .field("content", &self.0.content)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0.id, self.source_string())
    }
}

// =============================================================================
// DocumentBuilder
// =============================================================================

/// Builder for new and derived documents.
///
/// Setting a source on a lineage that already has a different one is
/// recorded and reported by [`build`](Self::build) as
/// [`Error::SourceConflict`]; setting the same source again is a no-op.
#[must_use]
pub struct DocumentBuilder {
    id: Option<DocumentId>,
    source: Option<NormalizedPath>,
    content: Content,
    metadata: MetadataStack,
    pending: Vec<(String, MetaValue)>,
    error: Option<Error>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    /// Builder for a new lineage.
    pub fn new() -> Self {
        Self {
            id: None,
            source: None,
            content: Content::empty(),
            metadata: MetadataStack::new(),
            pending: Vec::new(),
            error: None,
        }
    }

    /// Set the lineage source.
    pub fn source(mut self, source: impl Into<NormalizedPath>) -> Self {
        let source = source.into();
        let Some(existing) = &self.source else {
            self.source = Some(source);
            return self;
        };
        if *existing != source && self.error.is_none() {
            self.error = Some(Error::SourceConflict {
                existing: existing.to_string(),
                requested: source.to_string(),
            });
        }
        self
    }

    /// Replace the content.
    pub fn content(mut self, content: Content) -> Self {
        self.content = content;
        self
    }

    /// Replace the content with text.
    pub fn text(self, text: impl AsRef<str>) -> Self {
        self.content(Content::from_text(text))
    }

    /// Replace the content with bytes.
    pub fn bytes(self, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.content(Content::from_bytes(bytes))
    }

    /// Replace the content with a lazily read file.
    pub fn file(self, file: FileEntry) -> Self {
        self.content(Content::from_file(file))
    }

    /// Replace the content with a custom provider.
    pub fn provider(self, provider: Arc<dyn ContentProvider>) -> Self {
        self.content(Content::from_provider(provider))
    }

    /// Add one metadata entry.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.pending.push((key.into(), value.into()));
        self
    }

    /// Add metadata entries.
    pub fn metadata<K, V>(mut self, items: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<MetaValue>,
    {
        self.pending
            .extend(items.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Replace the base metadata the new entries are layered on.
    ///
    /// New documents usually start from the engine settings.
    pub fn base_metadata(mut self, metadata: MetadataStack) -> Self {
        self.metadata = metadata;
        self
    }

    /// Finish the document.
    pub fn build(self) -> Result<Document> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(Document(Arc::new(Data {
            id: self.id.unwrap_or_else(DocumentId::next),
            source: self.source,
            content: self.content,
            metadata: self.metadata.push(self.pending),
        })))
    }
}
