//! Error type shared by every layer of the engine.
//!
//! Errors fall into two groups:
//!
//! - **Fatal** errors (duplicate sources, unsupported operations, unknown
//!   providers, bad paths, bad configuration) abort the current pass and reach
//!   the caller of [`Engine::execute`](crate::Engine::execute).
//! - **Isolated** errors (a module failing on one document) are logged and the
//!   offending branch is dropped, letting siblings and later pipelines finish.
//!
//! # Example
//!
//! ```ignore
//! match engine.execute() {
//!     Ok(()) => {}
//!     Err(Error::DuplicateSource { path, pipeline }) => {
//!         eprintln!("{pipeline}: duplicate output source {path}");
//!     }
//!     Err(e) => std::process::exit(e.exit_code() as i32),
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

// =============================================================================
// Error
// =============================================================================

/// Every failure the engine can report.
#[derive(Debug, Error)]
pub enum Error {
    /// A file, directory, pipeline or setting does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing item.
        what: String,
    },

    /// No provider is registered for a path scheme.
    #[error("no file provider registered for scheme `{scheme}`")]
    ProviderNotFound {
        /// The scheme that failed to resolve.
        scheme: String,
    },

    /// A path was absolute where a relative one is required, or the reverse.
    #[error("invalid path `{path}`: {reason}")]
    InvalidPath {
        /// The offending path, as given.
        path: String,
        /// What was expected of it.
        reason: &'static str,
    },

    /// An operation the target cannot perform (e.g. deleting a virtual directory).
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Two unrelated document lineages reached the same stage with the same source.
    #[error("duplicate document source `{path}` in pipeline `{pipeline}`")]
    DuplicateSource {
        /// The colliding source path.
        path: String,
        /// Pipeline in which the collision occurred.
        pipeline: String,
    },

    /// A lineage that already carries a source was given a different one.
    #[error("document source is already `{existing}`, cannot change it to `{requested}`")]
    SourceConflict {
        /// Source already set on the lineage.
        existing: String,
        /// Source that was requested.
        requested: String,
    },

    /// A module failed while processing its inputs.
    #[error("module `{module}` failed{}: {message}", on_document(.document))]
    ModuleExecution {
        /// Name of the failing module.
        module: String,
        /// Source of the document being processed, if any.
        document: Option<String>,
        /// Failure description.
        message: String,
    },

    /// Invalid engine or pipeline configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error while touching `path`.
    #[error("I/O error at `{}`: {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Settings JSON could not be parsed.
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Anything else escaping a pass.
    #[error("unhandled error: {0}")]
    Unhandled(String),
}

fn on_document(document: &Option<String>) -> String {
    document
        .as_deref()
        .map(|d| format!(" on `{d}`"))
        .unwrap_or_default()
}

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing file, directory, provider or named item.
    NotFound,
    /// Absolute path where relative is required, or vice versa.
    InvalidPath,
    /// Mutation of a virtual-only entity.
    UnsupportedOperation,
    /// Source uniqueness violated within a pass.
    DuplicateSource,
    /// Module failure, isolated per document.
    ModuleExecutionFailure,
    /// Anything else.
    UnhandledFault,
}

impl Error {
    /// Create a [`Error::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a [`Error::InvalidPath`].
    pub fn invalid_path(path: impl ToString, reason: &'static str) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason,
        }
    }

    /// Create a [`Error::UnsupportedOperation`].
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::UnsupportedOperation(what.into())
    }

    /// Create a [`Error::ModuleExecution`] without document context.
    pub fn module(module: impl Into<String>, message: impl ToString) -> Self {
        Self::ModuleExecution {
            module: module.into(),
            document: None,
            message: message.to_string(),
        }
    }

    /// Attach the source of the document being processed to a
    /// [`Error::ModuleExecution`] that has none. Other errors are unchanged.
    pub fn with_document(self, source: impl Into<String>) -> Self {
        match self {
            Self::ModuleExecution {
                module,
                document: None,
                message,
            } => Self::ModuleExecution {
                module,
                document: Some(source.into()),
                message,
            },
            other => other,
        }
    }

    /// Source of the offending document, for module failures that carry one.
    pub fn document(&self) -> Option<&str> {
        match self {
            Self::ModuleExecution { document, .. } => document.as_deref(),
            _ => None,
        }
    }

    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::ProviderNotFound { .. } => ErrorKind::NotFound,
            Self::InvalidPath { .. } => ErrorKind::InvalidPath,
            Self::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            Self::DuplicateSource { .. } => ErrorKind::DuplicateSource,
            Self::ModuleExecution { .. } | Self::SourceConflict { .. } => {
                ErrorKind::ModuleExecutionFailure
            }
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            Self::Config(_) | Self::Io { .. } | Self::Json(_) | Self::Unhandled(_) => {
                ErrorKind::UnhandledFault
            }
        }
    }

    /// Whether this error must abort the whole pass instead of being isolated
    /// to a single document branch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DuplicateSource { .. }
                | Self::UnsupportedOperation(_)
                | Self::ProviderNotFound { .. }
                | Self::InvalidPath { .. }
                | Self::Config(_)
                | Self::Unhandled(_)
        )
    }

    /// Process exit code a command-line front end should use for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) | Self::Json(_) => ExitCode::CommandLineError,
            _ => ExitCode::UnhandledError,
        }
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes reported by a command-line front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExitCode {
    /// Build completed.
    Normal = 0,
    /// Arguments or configuration were rejected.
    CommandLineError = 1,
    /// The host runtime is not supported.
    UnsupportedRuntime = 2,
    /// A fatal error escaped the build.
    UnhandledError = 3,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}
