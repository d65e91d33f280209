//! Run a closure over every document.

use crate::document::Document;
use crate::error::Result;
use crate::execution::{ExecutionContext, Module};

type Callback = dyn Fn(&Document, &ExecutionContext) -> Result<Vec<Document>> + Send + Sync;

/// Applies a closure to each input document.
///
/// Documents are processed concurrently unless [`serial`](Self::serial) is
/// set. A non-fatal error drops only the document that raised it.
///
/// # Example
///
/// ```ignore
/// Execute::document(|doc, _ctx| {
///     let html = doc.read_string()?.replace("{{year}}", "2024");
///     doc.derive().text(html).build()
/// })
/// ```
pub struct Execute {
    callback: Box<Callback>,
    parallel: bool,
}

impl Execute {
    /// Replace each document with the documents `f` returns.
    pub fn documents<F>(f: F) -> Self
    where
        F: Fn(&Document, &ExecutionContext) -> Result<Vec<Document>> + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(f),
            parallel: true,
        }
    }

    /// Replace each document with the one `f` returns.
    pub fn document<F>(f: F) -> Self
    where
        F: Fn(&Document, &ExecutionContext) -> Result<Document> + Send + Sync + 'static,
    {
        Self::documents(move |doc, ctx| Ok(vec![f(doc, ctx)?]))
    }

    /// Call `f` for its side effects and pass each document through.
    pub fn inspect<F>(f: F) -> Self
    where
        F: Fn(&Document, &ExecutionContext) -> Result<()> + Send + Sync + 'static,
    {
        Self::documents(move |doc, ctx| {
            f(doc, ctx)?;
            Ok(vec![doc.clone()])
        })
    }

    /// Process documents one at a time, in order.
    #[must_use]
    pub fn serial(mut self) -> Self {
        self.parallel = false;
        self
    }
}

impl Module for Execute {
    fn execute(&self, inputs: Vec<Document>, ctx: &ExecutionContext) -> Result<Vec<Document>> {
        let f = |doc: &Document| (self.callback)(doc, ctx);
        if self.parallel {
            ctx.map_documents(inputs, f)
        } else {
            ctx.map_documents_serial(inputs, f)
        }
    }
}
