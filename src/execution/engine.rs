//! The engine: owns the file system, settings, pipelines, caches and the
//! published document collection, and runs passes.
//!
//! # Pass Lifecycle
//!
//! ```text
//! execute()
//! ├── clean output directory        (CleanOutputPath)
//! ├── caches.reset_entry_hits()
//! ├── for pipeline in registration order:
//! │   ├── run modules (seeded with one empty document)
//! │   └── publish output under the pipeline name
//! └── caches.clear_unhit_entries()
//! ```
//!
//! A fatal error stops the pass. The failing pipeline publishes nothing and
//! keeps its previous output; pipelines that already finished keep theirs.

use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashSet;

use super::context::ExecutionState;
use super::module::Module;
use super::pipeline::PipelineCollection;
use crate::cache::ExecutionCacheManager;
use crate::config::{EngineConfig, Settings};
use crate::document::DocumentCollection;
use crate::error::{Error, Result};
use crate::io::{Directory, FileSystem};

/// An independent build engine instance.
///
/// # Example
///
/// ```ignore
/// let mut engine = Engine::new();
/// engine.file_system_mut().set_root_path("/srv/site")?;
/// engine.pipelines_mut().add(
///     Pipeline::new("Pages")
///         .with(ReadFiles::new(["**/*.html"]))
///         .with(WriteFiles::new()),
/// )?;
/// engine.execute()?;
/// println!("{} pages", engine.documents().from_pipeline("Pages").len());
/// ```
pub struct Engine {
    file_system: FileSystem,
    settings: Settings,
    pipelines: PipelineCollection,
    documents: Arc<DocumentCollection>,
    caches: Arc<ExecutionCacheManager>,
    #[cfg(feature = "parallel")]
    pool: Option<Arc<rayon::ThreadPool>>,
    pass: u64,
    disposed: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine with the default file system and empty settings.
    pub fn new() -> Self {
        Self {
            file_system: FileSystem::new(),
            settings: Settings::new(),
            pipelines: PipelineCollection::new(),
            documents: Arc::new(DocumentCollection::new()),
            caches: Arc::new(ExecutionCacheManager::new()),
            #[cfg(feature = "parallel")]
            pool: None,
            pass: 0,
            disposed: false,
        }
    }

    /// Engine configured from an [`EngineConfig`].
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        let mut engine = Self::new();
        config.apply(&mut engine.file_system)?;
        engine.settings = config.settings;

        #[cfg(feature = "parallel")]
        {
            if let Some(threads) = config.threads {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("folio-worker-{i}"))
                    .build()
                    .map_err(|e| Error::Config(format!("cannot start worker pool: {e}")))?;
                engine.pool = Some(Arc::new(pool));
            }
        }

        Ok(engine)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Global settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Mutable global settings. Changes apply from the next pass.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// File system.
    pub fn file_system(&self) -> &FileSystem {
        &self.file_system
    }

    /// Mutable file system. Configure it before the first pass.
    pub fn file_system_mut(&mut self) -> &mut FileSystem {
        &mut self.file_system
    }

    /// Registered pipelines.
    pub fn pipelines(&self) -> &PipelineCollection {
        &self.pipelines
    }

    /// Mutable pipelines.
    pub fn pipelines_mut(&mut self) -> &mut PipelineCollection {
        &mut self.pipelines
    }

    /// Documents published so far.
    pub fn documents(&self) -> &DocumentCollection {
        &self.documents
    }

    /// Number of passes started.
    pub fn pass(&self) -> u64 {
        self.pass
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Run every pipeline once, in registration order.
    pub fn execute(&mut self) -> Result<()> {
        self.run_pass(None)
    }

    /// Run only the named pipelines, still in registration order.
    ///
    /// Unknown names fail with [`Error::NotFound`] before anything runs.
    pub fn execute_pipelines<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selected = FxHashSet::default();
        for name in names {
            let name = name.as_ref();
            if !self.pipelines.contains(name) {
                return Err(Error::not_found(format!("pipeline `{name}`")));
            }
            selected.insert(name.to_string());
        }
        self.run_pass(Some(&selected))
    }

    fn run_pass(&mut self, selected: Option<&FxHashSet<String>>) -> Result<()> {
        if self.disposed {
            return Err(Error::unsupported("engine has been disposed"));
        }

        self.pass += 1;
        let pass = self.pass;
        let start = Instant::now();
        tracing::info!(pass, pipelines = self.pipelines.len(), "starting pass");

        if self.settings.clean_output_path() {
            self.clean_output()?;
        }
        self.caches.reset_entry_hits();

        for pipeline in self.pipelines.iter_mut() {
            if selected.is_some_and(|names| !names.contains(pipeline.name())) {
                continue;
            }
            let state = Arc::new(ExecutionState {
                file_system: self.file_system.clone(),
                settings: self.settings.clone(),
                documents: self.documents.clone(),
                caches: self.caches.clone(),
                #[cfg(feature = "parallel")]
                pool: self.pool.clone(),
                pipeline: pipeline.name().to_string(),
                pass,
            });

            let started = Instant::now();
            match pipeline.execute(state) {
                Ok(published) => {
                    tracing::debug!(
                        pass,
                        pipeline = pipeline.name(),
                        documents = published.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "pipeline complete"
                    );
                    Arc::make_mut(&mut self.documents).set(pipeline.name(), published);
                }
                Err(e) => {
                    tracing::error!(pass, pipeline = pipeline.name(), error = %e, "pipeline failed");
                    return Err(e);
                }
            }
        }

        self.caches.clear_unhit_entries();
        tracing::info!(
            pass,
            documents = self.documents.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "pass complete"
        );
        Ok(())
    }

    fn clean_output(&self) -> Result<()> {
        let output = self.file_system.get_output_directory("")?;
        if output.exists() {
            tracing::debug!(path = %output.path(), "cleaning output directory");
            output.delete(true)?;
        }
        output.create()
    }

    // =========================================================================
    // Disposal
    // =========================================================================

    /// Dispose every module once, in pipeline registration order, walking
    /// nested modules depth-first. Failures are logged and do not stop the
    /// remaining disposals. Later calls do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        let mut visited = FxHashSet::default();
        for pipeline in self.pipelines.iter() {
            for module in pipeline.modules() {
                dispose_tree(module, pipeline.name(), &mut visited);
            }
        }
        tracing::debug!(modules = visited.len(), "engine disposed");
    }
}

fn dispose_tree(module: &Arc<dyn Module>, pipeline: &str, visited: &mut FxHashSet<usize>) {
    let id = Arc::as_ptr(module) as *const () as usize;
    if !visited.insert(id) {
        return;
    }
    if let Err(e) = module.dispose() {
        tracing::warn!(pipeline, module = module.name(), error = %e, "module disposal failed");
    }
    for child in module.children() {
        dispose_tree(child, pipeline, visited);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("file_system", &self.file_system)
            .field("pipelines", &self.pipelines)
            .field("pass", &self.pass)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}
