//! Append the output of nested modules to the current documents.

use std::sync::Arc;

use crate::document::Document;
use crate::error::Result;
use crate::execution::{ExecutionContext, Module};

/// Passes its inputs through and appends what its children produce when run
/// from a fresh seed document.
///
/// # Example
///
/// ```ignore
/// Pipeline::new("Site")
///     .with(ReadFiles::new(["pages/*.html"]))
///     .with(Concat::new([shared(ReadFiles::new(["posts/*.html"]))]))
/// ```
pub struct Concat {
    children: Vec<Arc<dyn Module>>,
}

impl Concat {
    /// Concatenate the output of `children`.
    pub fn new(children: impl IntoIterator<Item = Arc<dyn Module>>) -> Self {
        Self {
            children: children.into_iter().collect(),
        }
    }
}

impl Module for Concat {
    fn execute(&self, inputs: Vec<Document>, ctx: &ExecutionContext) -> Result<Vec<Document>> {
        let mut outputs = inputs;
        outputs.extend(ctx.execute_fresh(&self.children)?);
        Ok(outputs)
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

    #[test]
    fn test_inputs_then_children() {
        let ctx = testing::context();
        let inputs = Documents::content(["a", "b"])
            .execute(Vec::new(), &ctx)
            .unwrap();
        let concat = Concat::new([shared(Documents::content(["c"]))]);
        let outputs = concat.execute(inputs, &ctx).unwrap();
        let texts: Vec<_> = outputs.iter().map(|d| d.read_string().unwrap()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert_eq!(concat.children().len(), 1);
    }
}
