//! Group documents by a metadata value.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::document::Document;
use crate::error::Result;
use crate::execution::{ExecutionContext, Module};
use crate::meta::{keys, MetaValue};

/// Emits one new document per distinct value of a metadata key.
///
/// Each group document carries [`GroupKey`](keys::GROUP_KEY) and its members
/// under [`GroupDocuments`](keys::GROUP_DOCUMENTS). A list value puts the
/// document into one group per element. Documents without the key are left
/// out. With children, the grouped documents are the children's output from
/// a fresh seed; otherwise the inputs are grouped.
pub struct GroupBy {
    key: String,
    children: Vec<Arc<dyn Module>>,
}

impl GroupBy {
    /// Group by `key`, over the output of `children` (or the inputs when empty).
    pub fn new(key: impl Into<String>, children: impl IntoIterator<Item = Arc<dyn Module>>) -> Self {
        Self {
            key: key.into(),
            children: children.into_iter().collect(),
        }
    }
}

impl Module for GroupBy {
    fn execute(&self, inputs: Vec<Document>, ctx: &ExecutionContext) -> Result<Vec<Document>> {
        let documents = if self.children.is_empty() {
            inputs
        } else {
            ctx.execute_fresh(&self.children)?
        };

        let mut groups: IndexMap<String, (MetaValue, Vec<Document>)> = IndexMap::new();
        for doc in &documents {
            let Some(value) = doc.get(&self.key) else {
                continue;
            };
            let values = match value {
                MetaValue::List(items) => items.as_slice(),
                single => std::slice::from_ref(single),
            };
            for value in values {
                groups
                    .entry(value.to_string())
                    .or_insert_with(|| (value.clone(), Vec::new()))
                    .1
                    .push(doc.clone());
            }
        }

        groups
            .into_values()
            .map(|(key, members)| {
                ctx.new_document()
                    .meta(keys::GROUP_KEY, key)
                    .meta(keys::GROUP_DOCUMENTS, members)
                    .build()
            })
            .collect()
    }

    fn children(&self) -> &[Arc<dyn Module>] {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::shared;
    use crate::modules::Documents;
    use crate::testing;

    fn posts() -> Documents {
        Documents::metadata([
            vec![("Title", MetaValue::from("a")), ("Tag", "rust".into())],
            vec![("Title", "b".into()), ("Tag", vec!["go", "rust"].into())],
            vec![("Title", "c".into())],
            vec![("Title", "d".into()), ("Tag", "go".into())],
        ])
    }

    fn summary(groups: &[Document]) -> Vec<(String, Vec<String>)> {
        groups
            .iter()
            .map(|g| {
                let members: Vec<Document> = g.get_as(keys::GROUP_DOCUMENTS).unwrap();
                (
                    g.string(keys::GROUP_KEY).unwrap(),
                    members.iter().map(|d| d.string("Title").unwrap()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_group_children_output() {
        let ctx = testing::context();
        let groups = GroupBy::new("tag", [shared(posts())])
            .execute(Vec::new(), &ctx)
            .unwrap();
        assert_eq!(
            summary(&groups),
            vec![
                ("rust".to_string(), vec!["a".to_string(), "b".to_string()]),
                ("go".to_string(), vec!["b".to_string(), "d".to_string()]),
            ]
        );
    }

    #[test]
    fn test_group_inputs() {
        let ctx = testing::context();
        let inputs = posts().execute(Vec::new(), &ctx).unwrap();
        let groups = GroupBy::new("Tag", Vec::new()).execute(inputs, &ctx).unwrap();
        assert_eq!(groups.len(), 2);
    }
}
