//! Published pipeline output, keyed by pipeline name.

use indexmap::IndexMap;

use super::model::Document;

/// Documents published by each pipeline during the latest pass it completed.
///
/// Pipelines appear in the order they first published.
#[derive(Debug, Clone, Default)]
pub struct DocumentCollection {
    pipelines: IndexMap<String, Vec<Document>>,
}

impl DocumentCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a pipeline's published output.
    pub fn set(&mut self, pipeline: impl Into<String>, documents: Vec<Document>) {
        self.pipelines.insert(pipeline.into(), documents);
    }

    /// Remove a pipeline's published output.
    pub fn remove(&mut self, pipeline: &str) -> Option<Vec<Document>> {
        self.pipelines.shift_remove(pipeline)
    }

    /// Output of one pipeline; empty if it never published.
    pub fn from_pipeline(&self, pipeline: &str) -> &[Document] {
        self.pipelines.get(pipeline).map_or(&[], Vec::as_slice)
    }

    /// Whether a pipeline has published output.
    pub fn contains_pipeline(&self, pipeline: &str) -> bool {
        self.pipelines.contains_key(pipeline)
    }

    /// Output of every pipeline except `pipeline`, in pipeline order.
    pub fn except_pipeline<'a>(&'a self, pipeline: &'a str) -> impl Iterator<Item = &'a Document> + 'a {
        self.pipelines
            .iter()
            .filter(move |(name, _)| name.as_str() != pipeline)
            .flat_map(|(_, docs)| docs)
    }

    /// Output of every pipeline, in pipeline order.
    pub fn all(&self) -> impl Iterator<Item = &Document> {
        self.pipelines.values().flatten()
    }

    /// Names of pipelines that published output.
    pub fn pipeline_names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    /// `(pipeline, documents)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Document])> {
        self.pipelines
            .iter()
            .map(|(name, docs)| (name.as_str(), docs.as_slice()))
    }

    /// Total number of documents.
    pub fn len(&self) -> usize {
        self.pipelines.values().map(Vec::len).sum()
    }

    /// Whether no documents are published.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
