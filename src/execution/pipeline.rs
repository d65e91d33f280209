//! Pipelines and the ordered pipeline collection.

use std::collections::hash_map::Entry;
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

use super::context::{ExecutionContext, ExecutionState};
use super::module::Module;
use super::tracking::{Filtered, TrackedPass, Tracker};
use crate::document::{Document, DocumentId};
use crate::error::{Error, Result};
use crate::io::NormalizedPath;

// =============================================================================
// Pipeline
// =============================================================================

/// A named, ordered sequence of modules.
///
/// # Example
///
/// ```ignore
/// let posts = Pipeline::new("Posts")
///     .with(ReadFiles::new(["posts/*.md"]))
///     .with(WriteFiles::new().extension("html"))
///     .process_documents_once(true);
/// ```
pub struct Pipeline {
    name: String,
    modules: Vec<Arc<dyn Module>>,
    process_documents_once: bool,
    executed: bool,
    tracker: Tracker,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new("")
    }
}

impl Pipeline {
    /// Empty pipeline. An empty name is replaced when the pipeline is added
    /// to a [`PipelineCollection`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: Vec::new(),
            process_documents_once: false,
            executed: false,
            tracker: Tracker::default(),
        }
    }

    /// Append a module (builder style).
    #[must_use]
    pub fn with<M: Module + 'static>(mut self, module: M) -> Self {
        self.modules.push(Arc::new(module));
        self
    }

    /// Append a shared module (builder style).
    #[must_use]
    pub fn with_shared(mut self, module: Arc<dyn Module>) -> Self {
        self.modules.push(module);
        self
    }

    /// Skip unchanged documents on later passes and republish their
    /// previous output instead.
    #[must_use]
    pub fn process_documents_once(mut self, enabled: bool) -> Self {
        self.process_documents_once = enabled;
        self
    }

    /// Append a module. Fails once the pipeline has executed.
    pub fn append<M: Module + 'static>(&mut self, module: M) -> Result<()> {
        self.append_shared(Arc::new(module))
    }

    /// Append a shared module. Fails once the pipeline has executed.
    pub fn append_shared(&mut self, module: Arc<dyn Module>) -> Result<()> {
        if self.executed {
            return Err(Error::unsupported(format!(
                "cannot add modules to pipeline `{}` after it has executed",
                self.name
            )));
        }
        self.modules.push(module);
        Ok(())
    }

    /// Pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Modules in execution order.
    pub fn modules(&self) -> &[Arc<dyn Module>] {
        &self.modules
    }

    /// Whether unchanged documents are skipped on later passes.
    pub fn is_process_documents_once(&self) -> bool {
        self.process_documents_once
    }

    /// Whether the pipeline has executed at least once.
    pub fn has_executed(&self) -> bool {
        self.executed
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the pipeline has no modules.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Run one pass and return the documents to publish.
    ///
    /// Tracking state is only updated when the pass succeeds.
    pub(crate) fn execute(&mut self, state: Arc<ExecutionState>) -> Result<Vec<Document>> {
        self.executed = true;
        let ctx = ExecutionContext::root(state);

        if !self.process_documents_once {
            let mut documents = vec![ctx.new_document().build()?];
            for module in &self.modules {
                documents = ctx.run_module(module, documents)?;
                check_unique_sources(&documents, &self.name)?;
            }
            return Ok(documents);
        }

        for reuse in [true, false] {
            let mut pass = self.tracker.begin(&self.name, reuse);
            if let Some(computed) = self.run_tracked(&ctx, &mut pass)? {
                let (committed, published) = pass.finish(computed);
                self.tracker = committed;
                tracing::debug!(
                    pipeline = %self.name,
                    tracked = self.tracker.len(),
                    barrier = self.tracker.barrier(),
                    "committed tracking state"
                );
                return Ok(published);
            }
            tracing::debug!(pipeline = %self.name, "rerunning pass without reuse");
        }
        Err(Error::Unhandled(format!(
            "pipeline `{}` requested a rerun with reuse disabled",
            self.name
        )))
    }

    /// Run every module through `pass`; `None` when the pass must be rerun.
    fn run_tracked(
        &self,
        ctx: &ExecutionContext,
        pass: &mut TrackedPass,
    ) -> Result<Option<Vec<Document>>> {
        let mut documents = vec![ctx.new_document().build()?];
        for (stage, module) in self.modules.iter().enumerate() {
            let inputs: FxHashSet<DocumentId> = documents.iter().map(Document::id).collect();
            let outputs = ctx.run_module(module, documents)?;
            check_unique_sources(&outputs, &self.name)?;
            documents = match pass.filter(stage, &inputs, outputs)? {
                Filtered::Keep(kept) => kept,
                Filtered::Restart => return Ok(None),
            };
        }
        Ok(Some(documents))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field(
                "modules",
                &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .field("process_documents_once", &self.process_documents_once)
            .finish()
    }
}

/// Fail if two different lineages share a source.
fn check_unique_sources(documents: &[Document], pipeline: &str) -> Result<()> {
    let mut seen: FxHashMap<&NormalizedPath, DocumentId> = FxHashMap::default();
    for doc in documents {
        let Some(source) = doc.source() else {
            continue;
        };
        match seen.entry(source) {
            Entry::Occupied(entry) if *entry.get() != doc.id() => {
                return Err(Error::DuplicateSource {
                    path: source.to_string(),
                    pipeline: pipeline.to_string(),
                });
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(entry) => {
                entry.insert(doc.id());
            }
        }
    }
    Ok(())
}

// =============================================================================
// PipelineCollection
// =============================================================================

/// Pipelines in registration order, with unique names.
#[derive(Debug, Default)]
pub struct PipelineCollection {
    pipelines: IndexMap<String, Pipeline>,
}

impl PipelineCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline. Unnamed pipelines are called `Pipeline N`.
    ///
    /// Returns the stored pipeline; a duplicate name is a configuration error.
    pub fn add(&mut self, mut pipeline: Pipeline) -> Result<&mut Pipeline> {
        if pipeline.name.is_empty() {
            pipeline.name = format!("Pipeline {}", self.pipelines.len() + 1);
        }
        if self.pipelines.contains_key(&pipeline.name) {
            return Err(Error::Config(format!(
                "a pipeline named `{}` already exists",
                pipeline.name
            )));
        }
        let (index, _) = self.pipelines.insert_full(pipeline.name.clone(), pipeline);
        Ok(&mut self.pipelines[index])
    }

    /// Register a pipeline built from `modules`.
    pub fn add_modules<I>(&mut self, name: impl Into<String>, modules: I) -> Result<&mut Pipeline>
    where
        I: IntoIterator<Item = Arc<dyn Module>>,
    {
        let mut pipeline = Pipeline::new(name);
        pipeline.modules.extend(modules);
        self.add(pipeline)
    }

    /// Pipeline by name.
    pub fn get(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.get(name)
    }

    /// Mutable pipeline by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Pipeline> {
        self.pipelines.get_mut(name)
    }

    /// Whether a pipeline is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.pipelines.contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    /// Pipelines in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Pipeline> {
        self.pipelines.values()
    }

    /// Mutable pipelines in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pipeline> {
        self.pipelines.values_mut()
    }

    /// Number of pipelines.
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Whether no pipeline is registered.
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountModule;

    #[test]
    fn test_unique_names() {
        let mut pipelines = PipelineCollection::new();
        pipelines.add(Pipeline::new("Posts")).unwrap();
        pipelines.add(Pipeline::default()).unwrap();
        pipelines.add(Pipeline::new("")).unwrap();
        assert_eq!(
            pipelines.names().collect::<Vec<_>>(),
            vec!["Posts", "Pipeline 2", "Pipeline 3"]
        );

        let err = pipelines.add(Pipeline::new("Posts")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(pipelines.len(), 3);
    }

    #[test]
    fn test_append_rejected_after_execution() {
        let mut pipeline = Pipeline::new("P").with(CountModule::new("A"));
        pipeline.append(CountModule::new("B")).unwrap();
        assert_eq!(pipeline.len(), 2);

        let state = Arc::new(crate::testing::state());
        pipeline.execute(state).unwrap();
        assert!(pipeline.has_executed());

        let err = pipeline.append(CountModule::new("C")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
    }

    #[test]
    fn test_duplicate_sources_detected() {
        let a = Document::builder().source("/x").build().unwrap();
        let same_lineage = a.derive().text("other").build().unwrap();
        let other = Document::builder().source("/x").build().unwrap();

        assert!(check_unique_sources(&[a.clone(), same_lineage], "P").is_ok());
        let err = check_unique_sources(&[a, other], "P").unwrap_err();
        assert!(matches!(err, Error::DuplicateSource { ref path, .. } if path == "/x"));
    }
}
