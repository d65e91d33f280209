//! The module contract.

use std::sync::Arc;

use super::context::ExecutionContext;
use crate::document::Document;
use crate::error::Result;

/// A transformation from one document set to another.
///
/// Modules are shared across passes and threads, so they take `&self`; any
/// state they keep needs interior mutability. An empty output drops every
/// document from the stage.
///
/// # Example
///
/// ```ignore
/// struct Uppercase;
///
/// impl Module for Uppercase {
///     fn execute(&self, inputs: Vec<Document>, ctx: &ExecutionContext) -> Result<Vec<Document>> {
///         ctx.map_documents(inputs, |doc| {
///             let text = doc.read_string()?.to_uppercase();
///             Ok(vec![doc.derive().text(text).build()?])
///         })
///     }
/// }
/// ```
pub trait Module: Send + Sync {
    /// Name used in logs and error messages. Defaults to the type name.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Process `inputs` and return the stage output.
    fn execute(&self, inputs: Vec<Document>, ctx: &ExecutionContext) -> Result<Vec<Document>>;

    /// Nested modules, for container modules.
    fn children(&self) -> &[Arc<dyn Module>] {
        &[]
    }

    /// Release held resources. Called at most once, when the engine is disposed.
    fn dispose(&self) -> Result<()> {
        Ok(())
    }
}

/// `folio::modules::Concat` -> `Concat`, `a::Wrap<b::C>` -> `Wrap`.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Box a module for use in a pipeline.
pub fn shared<M: Module + 'static>(module: M) -> Arc<dyn Module> {
    Arc::new(module)
}
