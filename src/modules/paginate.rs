//! Split documents into pages.

use std::sync::Arc;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::execution::{ExecutionContext, Module};
use crate::meta::keys;

/// Emits one new document per page of at most `size` documents.
///
/// Page documents carry [`PageDocuments`](keys::PAGE_DOCUMENTS),
/// [`CurrentPage`](keys::CURRENT_PAGE) (one-based),
/// [`TotalPages`](keys::TOTAL_PAGES), [`TotalItems`](keys::TOTAL_ITEMS),
/// [`HasNextPage`](keys::HAS_NEXT_PAGE) and
/// [`HasPreviousPage`](keys::HAS_PREVIOUS_PAGE). No documents means no pages.
pub struct Paginate {
    size: usize,
    children: Vec<Arc<dyn Module>>,
}

impl Paginate {
    /// Page the output of `children` (or the inputs when empty).
    pub fn new(size: usize, children: impl IntoIterator<Item = Arc<dyn Module>>) -> Self {
        Self {
            size,
            children: children.into_iter().collect(),
        }
    }
}

impl Module for Paginate {
    fn execute(&self, inputs: Vec<Document>, ctx: &ExecutionContext) -> Result<Vec<Document>> {
        if self.size == 0 {
            return Err(Error::Config("page size must be greater than zero".into()));
        }
        let documents = if self.children.is_empty() {
            inputs
        } else {
            ctx.execute_fresh(&self.children)?
        };

        let total_items = documents.len();
        let total_pages = total_items.div_ceil(self.size);
        documents
            .chunks(self.size)
            .enumerate()
            .map(|(i, page)| {
                let current = i + 1;
                ctx.new_document()
                    .meta(keys::PAGE_DOCUMENTS, page.to_vec())
                    .meta(keys::CURRENT_PAGE, current)
                    .meta(keys::TOTAL_PAGES, total_pages)
                    .meta(keys::TOTAL_ITEMS, total_items)
                    .meta(keys::HAS_NEXT_PAGE, current < total_pages)
                    .meta(keys::HAS_PREVIOUS_PAGE, current > 1)
                    .build()
            })
            .collect()
    }

    fn children(&self) -> &[Arc<dyn Module>] {
        &self.children
    }
}
