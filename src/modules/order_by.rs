//! Sort documents by a metadata value.

use std::cmp::Ordering;

use crate::document::Document;
use crate::error::Result;
use crate::execution::{ExecutionContext, Module};

/// Stable sort on the value stored under a metadata key.
///
/// Documents without the key sort first (last when descending).
pub struct OrderBy {
    key: String,
    descending: bool,
}

impl OrderBy {
    /// Sort ascending by `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            descending: false,
        }
    }

    /// Sort descending instead.
    #[must_use]
    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ordering = match (a.get(&self.key), b.get(&self.key)) {
            (Some(x), Some(y)) => x.compare(y),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

impl Module for OrderBy {
    fn execute(&self, inputs: Vec<Document>, _ctx: &ExecutionContext) -> Result<Vec<Document>> {
        let mut documents = inputs;
        documents.sort_by(|a, b| self.compare(a, b));
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaValue;
    use crate::modules::Documents;
    use crate::testing;

    fn titles(docs: &[Document]) -> Vec<String> {
        docs.iter().map(|d| d.string("Title").unwrap_or_default()).collect()
    }

    #[test]
    fn test_order_by_value() {
        let ctx = testing::context();
        let docs = Documents::metadata([
            vec![("Title", MetaValue::from("c")), ("Order", 3.into())],
            vec![("Title", "a".into()), ("Order", 1.into())],
            vec![("Title", "b".into()), ("Order", 2.into())],
            vec![("Title", "none".into())],
        ])
        .execute(Vec::new(), &ctx)
        .unwrap();

        let sorted = OrderBy::new("order").execute(docs.clone(), &ctx).unwrap();
        assert_eq!(titles(&sorted), vec!["none", "a", "b", "c"]);

        let sorted = OrderBy::new("Order").descending().execute(docs, &ctx).unwrap();
        assert_eq!(titles(&sorted), vec!["c", "b", "a", "none"]);
    }

    #[test]
    fn test_sort_is_stable() {
        let ctx = testing::context();
        let docs = Documents::metadata([
            [("Title", "x"), ("Group", "1")],
            [("Title", "y"), ("Group", "0")],
            [("Title", "z"), ("Group", "1")],
        ])
        .execute(Vec::new(), &ctx)
        .unwrap();
        let sorted = OrderBy::new("Group").execute(docs, &ctx).unwrap();
        assert_eq!(titles(&sorted), vec!["y", "x", "z"]);
    }
}
