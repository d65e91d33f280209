//! Pipeline execution: the module contract, execution contexts, pipelines,
//! cross-pass tracking and the engine.

mod context;
mod engine;
mod module;
mod pipeline;
mod tracking;

pub use context::ExecutionContext;
pub(crate) use context::ExecutionState;
pub use engine::Engine;
pub use module::{shared, Module};
pub use pipeline::{Pipeline, PipelineCollection};
