//! Create documents or pull them from other pipelines.

use crate::document::Document;
use crate::error::Result;
use crate::execution::{ExecutionContext, Module};
use crate::meta::MetaValue;

type Items = Vec<(String, MetaValue)>;

enum Source {
    Count(usize),
    Content(Vec<String>),
    Metadata(Vec<Items>),
    ContentAndMetadata(Vec<(String, Items)>),
    Pipelines(Vec<String>),
    All,
}

/// Replaces its inputs with new or previously published documents.
///
/// # Example
///
/// ```ignore
/// // Everything the "Posts" pipeline published earlier in this pass.
/// Pipeline::new("Archive").with(Documents::from_pipeline("Posts"))
/// ```
pub struct Documents {
    source: Source,
}

fn items<K, V>(items: impl IntoIterator<Item = (K, V)>) -> Items
where
    K: Into<String>,
    V: Into<MetaValue>,
{
    items.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

impl Documents {
    /// `n` empty documents.
    pub fn count(n: usize) -> Self {
        Self {
            source: Source::Count(n),
        }
    }

    /// One document per content string.
    pub fn content<I, S>(content: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source: Source::Content(content.into_iter().map(Into::into).collect()),
        }
    }

    /// One empty document per metadata set.
    pub fn metadata<I, M, K, V>(metadata: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<MetaValue>,
    {
        Self {
            source: Source::Metadata(metadata.into_iter().map(items).collect()),
        }
    }

    /// One document per `(content, metadata)` pair.
    pub fn content_and_metadata<I, S, M, K, V>(documents: I) -> Self
    where
        I: IntoIterator<Item = (S, M)>,
        S: Into<String>,
        M: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<MetaValue>,
    {
        Self {
            source: Source::ContentAndMetadata(
                documents
                    .into_iter()
                    .map(|(content, metadata)| (content.into(), items(metadata)))
                    .collect(),
            ),
        }
    }

    /// Output of one pipeline.
    pub fn from_pipeline(name: impl Into<String>) -> Self {
        Self {
            source: Source::Pipelines(vec![name.into()]),
        }
    }

    /// Output of every other pipeline, in registration order.
    pub fn all() -> Self {
        Self {
            source: Source::All,
        }
    }

    /// Also take the output of `names`. Replaces any non-pipeline source.
    #[must_use]
    pub fn from_pipelines<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names.into_iter().map(Into::into);
        match &mut self.source {
            Source::Pipelines(existing) => existing.extend(names),
            _ => self.source = Source::Pipelines(names.collect()),
        }
        self
    }
}

impl Module for Documents {
    fn execute(&self, _inputs: Vec<Document>, ctx: &ExecutionContext) -> Result<Vec<Document>> {
        match &self.source {
            Source::Count(n) => (0..*n).map(|_| ctx.new_document().build()).collect(),
            Source::Content(content) => content
                .iter()
                .map(|text| ctx.new_document().text(text).build())
                .collect(),
            Source::Metadata(metadata) => metadata
                .iter()
                .map(|items| ctx.new_document().metadata(items.iter().cloned()).build())
                .collect(),
            Source::ContentAndMetadata(documents) => documents
                .iter()
                .map(|(text, items)| {
                    ctx.new_document()
                        .text(text)
                        .metadata(items.iter().cloned())
                        .build()
                })
                .collect(),
            Source::Pipelines(names) => Ok(names
                .iter()
                .flat_map(|name| ctx.documents().from_pipeline(name))
                .cloned()
                .collect()),
            Source::All => Ok(ctx
                .documents()
                .except_pipeline(ctx.pipeline_name())
                .cloned()
                .collect()),
        }
    }
}
