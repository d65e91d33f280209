//! Shared test fixtures.

use std::cell::Cell;
use std::io::Read;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::Settings;
use crate::document::{ContentProvider, Document};
use crate::error::{Error, Result};
use crate::execution::{Engine, ExecutionContext, ExecutionState, Module};
use crate::io::{FileProvider, FileSystem, MemoryFileProvider};

// =============================================================================
// Fixtures
// =============================================================================

/// Memory-backed file system rooted at `/site` with the default input roots.
pub(crate) fn file_system_with(provider: Arc<MemoryFileProvider>) -> FileSystem {
    let mut fs = FileSystem::new();
    fs.set_root_path("/site").unwrap();
    fs.add_shared_file_provider("", provider as Arc<dyn FileProvider>);
    fs
}

/// Engine over an empty memory file system.
pub(crate) fn engine() -> Engine {
    engine_with(Arc::new(MemoryFileProvider::new()))
}

/// Engine over `provider`, rooted at `/site`.
pub(crate) fn engine_with(provider: Arc<MemoryFileProvider>) -> Engine {
    let mut engine = Engine::new();
    *engine.file_system_mut() = file_system_with(provider);
    engine
}

/// Standalone execution state over an empty memory file system.
pub(crate) fn state() -> ExecutionState {
    ExecutionState::new(
        file_system_with(Arc::new(MemoryFileProvider::new())),
        Settings::new(),
        "Test",
    )
}

/// Pipeline-level context over [`state`].
pub(crate) fn context() -> ExecutionContext {
    ExecutionContext::root(Arc::new(state()))
}

/// Pipeline-level context over a given file system.
pub(crate) fn context_with(fs: FileSystem) -> ExecutionContext {
    ExecutionContext::root(Arc::new(ExecutionState::new(fs, Settings::new(), "Test")))
}

// =============================================================================
// CountModule
// =============================================================================

/// Derives `1 + additional_outputs` documents per input, appending an
/// incrementing value to the content and storing it under `key`.
///
/// With `clone_source`, output `n` of an execution gets the source `{key}{n}`.
pub(crate) struct CountModule {
    key: String,
    additional_outputs: usize,
    clone_source: bool,
    value: AtomicI64,
    execute_count: AtomicUsize,
    input_count: AtomicUsize,
    output_count: AtomicUsize,
}

impl CountModule {
    pub(crate) fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            additional_outputs: 0,
            clone_source: false,
            value: AtomicI64::new(0),
            execute_count: AtomicUsize::new(0),
            input_count: AtomicUsize::new(0),
            output_count: AtomicUsize::new(0),
        }
    }

    pub(crate) fn additional_outputs(mut self, n: usize) -> Self {
        self.additional_outputs = n;
        self
    }

    pub(crate) fn clone_source(mut self) -> Self {
        self.clone_source = true;
        self
    }

    pub(crate) fn reset_value(&self) {
        self.value.store(0, Ordering::SeqCst);
    }

    pub(crate) fn execute_count(&self) -> usize {
        self.execute_count.load(Ordering::SeqCst)
    }

    pub(crate) fn input_count(&self) -> usize {
        self.input_count.load(Ordering::SeqCst)
    }

    pub(crate) fn output_count(&self) -> usize {
        self.output_count.load(Ordering::SeqCst)
    }
}

impl Module for CountModule {
    fn execute(&self, inputs: Vec<Document>, ctx: &ExecutionContext) -> Result<Vec<Document>> {
        self.execute_count.fetch_add(1, Ordering::SeqCst);
        let source_index = Cell::new(0);
        ctx.map_documents_serial(inputs, |input| {
            self.input_count.fetch_add(1, Ordering::SeqCst);
            let text = input.read_string()?;
            let mut outputs = Vec::new();
            for _ in 0..=self.additional_outputs {
                let value = self.value.fetch_add(1, Ordering::SeqCst) + 1;
                self.output_count.fetch_add(1, Ordering::SeqCst);
                let mut builder = ctx
                    .derive(input)
                    .text(format!("{text}{value}"))
                    .meta(self.key.clone(), value);
                if self.clone_source {
                    source_index.set(source_index.get() + 1);
                    builder = builder.source(format!("{}{}", self.key, source_index.get()));
                }
                outputs.push(builder.build()?);
            }
            Ok(outputs)
        })
    }
}

/// Content whose reader can never be opened.
pub(crate) struct Unreadable;

impl ContentProvider for Unreadable {
    fn open(&self) -> Result<Box<dyn Read + Send>> {
        Err(Error::io("/unreadable", std::io::Error::other("gone")))
    }
}

/// A sourced document whose content cannot be read.
pub(crate) fn unreadable_document(source: &str) -> Document {
    Document::builder()
        .source(source)
        .provider(Arc::new(Unreadable))
        .build()
        .unwrap()
}

// =============================================================================
// Other Modules
// =============================================================================

/// Records disposal and optionally fails doing it.
pub(crate) struct DisposableModule {
    children: Vec<Arc<dyn Module>>,
    fail: bool,
    disposed: AtomicUsize,
}

impl DisposableModule {
    pub(crate) fn new() -> Self {
        Self {
            children: Vec::new(),
            fail: false,
            disposed: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub(crate) fn with_children(children: Vec<Arc<dyn Module>>) -> Self {
        Self {
            children,
            ..Self::new()
        }
    }

    pub(crate) fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Module for DisposableModule {
    fn execute(&self, inputs: Vec<Document>, ctx: &ExecutionContext) -> Result<Vec<Document>> {
        ctx.execute(&self.children, inputs)
    }

    fn children(&self) -> &[Arc<dyn Module>] {
        &self.children
    }

    fn dispose(&self) -> Result<()> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Unhandled("dispose failed".into()));
        }
        Ok(())
    }
}

/// Always fails; fatally or not.
pub(crate) struct FailingModule {
    fatal: bool,
}

impl FailingModule {
    pub(crate) fn new() -> Self {
        Self { fatal: false }
    }

    pub(crate) fn fatal() -> Self {
        Self { fatal: true }
    }
}

impl Module for FailingModule {
    fn execute(&self, _inputs: Vec<Document>, _ctx: &ExecutionContext) -> Result<Vec<Document>> {
        if self.fatal {
            Err(Error::unsupported("fatal test failure"))
        } else {
            Err(Error::module(self.name(), "test failure"))
        }
    }
}
