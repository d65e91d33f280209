//! What a module sees while it runs.

use std::sync::Arc;

use super::module::Module;
use crate::cache::{CacheHandle, ExecutionCacheManager};
use crate::config::Settings;
use crate::document::{Document, DocumentBuilder, DocumentCollection};
use crate::error::Result;
use crate::io::FileSystem;
use crate::meta::{MetaValue, MetadataStack};

/// State shared by every context of one pipeline run.
pub(crate) struct ExecutionState {
    pub(crate) file_system: FileSystem,
    pub(crate) settings: Settings,
    pub(crate) documents: Arc<DocumentCollection>,
    pub(crate) caches: Arc<ExecutionCacheManager>,
    #[cfg(feature = "parallel")]
    pub(crate) pool: Option<Arc<rayon::ThreadPool>>,
    pub(crate) pipeline: String,
    pub(crate) pass: u64,
}

impl ExecutionState {
    /// Standalone state with fresh caches and no published documents.
    pub(crate) fn new(file_system: FileSystem, settings: Settings, pipeline: impl Into<String>) -> Self {
        Self {
            file_system,
            settings,
            documents: Arc::new(DocumentCollection::new()),
            caches: Arc::new(ExecutionCacheManager::new()),
            #[cfg(feature = "parallel")]
            pool: None,
            pipeline: pipeline.into(),
            pass: 1,
        }
    }
}

/// Execution context handed to [`Module::execute`].
///
/// Gives read access to the file system, settings and the output of
/// pipelines that already ran, creates documents, runs nested modules and
/// fans work out over documents.
#[derive(Clone)]
pub struct ExecutionContext {
    state: Arc<ExecutionState>,
    module: String,
    cache: CacheHandle,
    metadata: MetadataStack,
}

impl ExecutionContext {
    /// Context for the pipeline itself, before any module is selected.
    pub(crate) fn root(state: Arc<ExecutionState>) -> Self {
        let metadata = state.settings.metadata().clone();
        Self {
            state,
            module: String::new(),
            cache: CacheHandle::Disabled,
            metadata,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The engine's file system.
    pub fn file_system(&self) -> &FileSystem {
        &self.state.file_system
    }

    /// Global settings.
    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    /// Settings plus any scoped overrides; new documents start from this.
    pub fn metadata(&self) -> &MetadataStack {
        &self.metadata
    }

    /// Output published by pipelines that already ran.
    pub fn documents(&self) -> &DocumentCollection {
        &self.state.documents
    }

    /// Name of the running pipeline.
    pub fn pipeline_name(&self) -> &str {
        &self.state.pipeline
    }

    /// Name of the running module; empty at pipeline level.
    pub fn module_name(&self) -> &str {
        &self.module
    }

    /// One-based pass number.
    pub fn pass(&self) -> u64 {
        self.state.pass
    }

    /// The running module's cache.
    pub fn cache(&self) -> &CacheHandle {
        &self.cache
    }

    /// A copy of this context whose new documents and nested modules see
    /// `items` layered over the current metadata.
    pub fn with_metadata<K, V>(&self, items: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<MetaValue>,
    {
        Self {
            metadata: self.metadata.push(items),
            ..self.clone()
        }
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Builder for a new lineage seeded with the context metadata.
    pub fn new_document(&self) -> DocumentBuilder {
        Document::builder().base_metadata(self.metadata.clone())
    }

    /// Builder for a document derived from `document`.
    pub fn derive(&self, document: &Document) -> DocumentBuilder {
        document.derive()
    }

    // =========================================================================
    // Nested Execution
    // =========================================================================

    /// Run `modules` in order on `inputs` and return the last output.
    pub fn execute(&self, modules: &[Arc<dyn Module>], inputs: Vec<Document>) -> Result<Vec<Document>> {
        let mut documents = inputs;
        for module in modules {
            documents = self.run_module(module, documents)?;
        }
        Ok(documents)
    }

    /// Run `modules` starting from one empty seed document.
    pub fn execute_fresh(&self, modules: &[Arc<dyn Module>]) -> Result<Vec<Document>> {
        let seed = self.new_document().build()?;
        self.execute(modules, vec![seed])
    }

    /// Run one module. Fatal errors propagate; any other error is logged and
    /// the stage yields no documents.
    pub(crate) fn run_module(&self, module: &Arc<dyn Module>, inputs: Vec<Document>) -> Result<Vec<Document>> {
        let ctx = Self {
            state: self.state.clone(),
            module: module.name().to_string(),
            cache: self
                .state
                .caches
                .get(module, self.state.settings.use_cache()),
            metadata: self.metadata.clone(),
        };
        let count = inputs.len();
        match module.execute(inputs, &ctx) {
            Ok(outputs) => {
                tracing::debug!(
                    pipeline = %self.state.pipeline,
                    module = %ctx.module,
                    inputs = count,
                    outputs = outputs.len(),
                    "executed module"
                );
                Ok(outputs)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!(
                    pipeline = %self.state.pipeline,
                    module = %ctx.module,
                    document = e.document().unwrap_or("<all inputs>"),
                    error = %e,
                    "module failed, dropping its output"
                );
                Ok(Vec::new())
            }
        }
    }

    // =========================================================================
    // Fan-out
    // =========================================================================

    /// Apply `f` to every document, concurrently when the `parallel` feature
    /// is enabled.
    ///
    /// Outputs keep input order. A non-fatal error drops only the branch of
    /// the document that raised it; a fatal error fails the whole call.
    pub fn map_documents<F>(&self, inputs: Vec<Document>, f: F) -> Result<Vec<Document>>
    where
        F: Fn(&Document) -> Result<Vec<Document>> + Send + Sync,
    {
        let results = self.fan_out(&inputs, &f);
        self.collect_isolated(&inputs, results)
    }

    #[cfg(feature = "parallel")]
    fn fan_out<F>(&self, inputs: &[Document], f: &F) -> Vec<Result<Vec<Document>>>
    where
        F: Fn(&Document) -> Result<Vec<Document>> + Send + Sync,
    {
        use rayon::prelude::*;

        let run = || inputs.par_iter().map(f).collect::<Vec<_>>();
        match &self.state.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn fan_out<F>(&self, inputs: &[Document], f: &F) -> Vec<Result<Vec<Document>>>
    where
        F: Fn(&Document) -> Result<Vec<Document>> + Send + Sync,
    {
        inputs.iter().map(f).collect()
    }

    /// Like [`map_documents`](Self::map_documents), one document at a time.
    pub fn map_documents_serial<F>(&self, inputs: Vec<Document>, f: F) -> Result<Vec<Document>>
    where
        F: Fn(&Document) -> Result<Vec<Document>>,
    {
        let results: Vec<_> = inputs.iter().map(f).collect();
        self.collect_isolated(&inputs, results)
    }

    fn collect_isolated(
        &self,
        inputs: &[Document],
        results: Vec<Result<Vec<Document>>>,
    ) -> Result<Vec<Document>> {
        let mut outputs = Vec::with_capacity(results.len());
        for (input, result) in inputs.iter().zip(results) {
            if let Some(documents) = self.isolate(&input.source_string(), result)? {
                outputs.extend(documents);
            }
        }
        Ok(outputs)
    }

    /// Isolate the outcome of processing one item named `subject`.
    ///
    /// Fatal errors propagate. Other errors are logged with the pipeline,
    /// module and subject, and yield `None` so siblings carry on.
    pub fn isolate<T>(&self, subject: &str, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                let e = e.with_document(subject);
                tracing::warn!(
                    pipeline = %self.state.pipeline,
                    module = %self.module,
                    document = subject,
                    error = %e,
                    "dropping document after module failure"
                );
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("pipeline", &self.state.pipeline)
            .field("module", &self.module)
            .field("pass", &self.state.pass)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing;

    fn text(doc: &Document) -> String {
        doc.read_string().unwrap()
    }

    #[test]
    fn test_map_documents_keeps_order() {
        let ctx = testing::context();
        let inputs: Vec<_> = (0..64)
            .map(|i| ctx.new_document().text(i.to_string()).build().unwrap())
            .collect();
        let outputs = ctx
            .map_documents(inputs, |doc| {
                let n: u32 = doc.read_string()?.parse().map_err(|e| Error::module("test", e))?;
                Ok(vec![doc.derive().text((n * 2).to_string()).build()?])
            })
            .unwrap();
        let values: Vec<_> = outputs.iter().map(text).collect();
        let expected: Vec<_> = (0..64).map(|i: u32| (i * 2).to_string()).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_map_documents_isolates_failures() {
        let ctx = testing::context();
        let inputs: Vec<_> = ["1", "bad", "3"]
            .iter()
            .map(|t| ctx.new_document().text(*t).build().unwrap())
            .collect();
        let outputs = ctx
            .map_documents_serial(inputs, |doc| {
                let t = doc.read_string()?;
                if t == "bad" {
                    return Err(Error::module("test", "cannot parse"));
                }
                Ok(vec![doc.clone()])
            })
            .unwrap();
        assert_eq!(outputs.iter().map(text).collect::<Vec<_>>(), vec!["1", "3"]);
    }

    #[test]
    fn test_map_documents_propagates_fatal() {
        let ctx = testing::context();
        let inputs = vec![ctx.new_document().build().unwrap()];
        let err = ctx
            .map_documents(inputs, |_| Err(Error::unsupported("nope")))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
    }

    #[test]
    fn test_isolate_names_document() {
        let ctx = testing::context();
        assert_eq!(ctx.isolate("/a", Ok(1)).unwrap(), Some(1));
        assert_eq!(ctx.isolate::<()>("/a", Err(Error::module("m", "x"))).unwrap(), None);
        assert!(ctx.isolate::<()>("/a", Err(Error::unsupported("x"))).is_err());

        let e = Error::module("m", "x").with_document("/a");
        assert_eq!(e.document(), Some("/a"));
        assert_eq!(e.to_string(), "module `m` failed on `/a`: x");
    }

    #[test]
    fn test_scoped_metadata() {
        let ctx = testing::context();
        let scoped = ctx.with_metadata([("Layout", "post")]);
        let doc = scoped.new_document().build().unwrap();
        assert_eq!(doc.string("layout").as_deref(), Some("post"));
        assert!(ctx.new_document().build().unwrap().get("Layout").is_none());
    }

    #[test]
    fn test_execute_fresh_seeds_one_document() {
        let ctx = testing::context();
        let count = Arc::new(testing::CountModule::new("A"));
        let outputs = ctx.execute_fresh(&[count.clone() as Arc<dyn Module>]).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(count.input_count(), 1);
        assert_eq!(count.execute_count(), 1);
    }

    #[test]
    fn test_failing_module_yields_empty_stage() {
        let ctx = testing::context();
        let modules: Vec<Arc<dyn Module>> = vec![
            Arc::new(testing::CountModule::new("A")),
            Arc::new(testing::FailingModule::new()),
        ];
        let outputs = ctx.execute_fresh(&modules).unwrap();
        assert!(outputs.is_empty());
    }
}
