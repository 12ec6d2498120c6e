//! Error types for the engine and its loader.

use std::io;

use thiserror::Error;

/// Error raised by an engine instance or its factory.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A file is missing from the engine's filesystem.
    #[error("No such file or directory: {0}")]
    NotFound(String),

    /// A file name would escape the engine's filesystem.
    #[error("Invalid engine file name: {0}")]
    InvalidName(String),

    /// Filesystem operation failed.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// A command ran and exited unsuccessfully. `stderr_tail` holds the
    /// last lines the command wrote to stderr.
    #[error("Engine command failed with exit code {exit_code}: {stderr_tail}")]
    CommandFailed { exit_code: i32, stderr_tail: String },

    /// The engine could not be initialized from a source.
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    /// The engine instance is gone and cannot run anything else.
    #[error("Engine terminated: {0}")]
    Terminated(String),
}

impl EngineError {
    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a command failed error.
    pub fn command_failed(exit_code: i32, stderr_tail: impl Into<String>) -> Self {
        Self::CommandFailed {
            exit_code,
            stderr_tail: stderr_tail.into(),
        }
    }

    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Create a terminated error.
    pub fn terminated(message: impl Into<String>) -> Self {
        Self::Terminated(message.into())
    }

    /// Whether the engine instance is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Error fetching a staged artifact.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {location}")]
    Status { status: u16, location: String },

    #[error("Failed to read {location}: {source}")]
    Read {
        location: String,
        #[source]
        source: io::Error,
    },

    #[error("Fetched artifact is empty: {0}")]
    Empty(String),
}

/// Why one source could not produce a working engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    /// Source name.
    pub source: String,
    /// One reason per stage that was attempted.
    pub reasons: Vec<String>,
}

impl SourceFailure {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            reasons: Vec::new(),
        }
    }

    pub(crate) fn with_reason(mut self, stage: &str, reason: impl std::fmt::Display) -> Self {
        self.reasons.push(format!("{}: {}", stage, reason));
        self
    }
}

impl std::fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' ({})", self.source, self.reasons.join("; "))
    }
}

/// The engine could not be loaded from any source.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("No engine sources configured")]
    NoSources,

    #[error("All {} engine sources failed: {}", .failures.len(), summarize(.failures))]
    Exhausted { failures: Vec<SourceFailure> },
}

impl LoadError {
    /// Per-source failures, empty for `NoSources`.
    pub fn failures(&self) -> &[SourceFailure] {
        match self {
            Self::NoSources => &[],
            Self::Exhausted { failures } => failures,
        }
    }
}

fn summarize(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
