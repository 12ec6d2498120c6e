//! Extraction error taxonomy.

use thiserror::Error;

use crate::engine::{EngineError, EngineState};

/// Pre-flight rejection; raised before the engine is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Engine is not ready (state: {state})")]
    EngineNotReady { state: EngineState },

    #[error("File is too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Unsupported file type: {name} ({media_type})")]
    UnsupportedType { name: String, media_type: String },
}

/// Subclass of a failed codec command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionErrorKind {
    /// Input could not be parsed as media.
    UnsupportedOrCorrupt,
    /// A file was missing while the command ran.
    IoError,
    /// Access to a file was denied.
    PermissionError,
    /// The engine ran out of memory.
    ResourceExhausted,
    /// No encoder or muxer for the requested output.
    UnsupportedCodec,
    /// Anything else.
    GenericExtractionError,
}

impl ExecutionErrorKind {
    /// Short user-facing description.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::UnsupportedOrCorrupt => "The file is corrupt or not a supported media file",
            Self::IoError => "A file was missing during extraction",
            Self::PermissionError => "Permission denied while accessing a file",
            Self::ResourceExhausted => "Not enough memory to process the file",
            Self::UnsupportedCodec => "The requested codec or format is not supported",
            Self::GenericExtractionError => "Audio extraction failed",
        }
    }
}

/// Error from one extraction.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Write verification failed: wrote {expected} bytes, engine holds {actual}")]
    WriteVerification { expected: u64, actual: u64 },

    #[error("{}: {message}", .kind.describe())]
    Execution {
        kind: ExecutionErrorKind,
        message: String,
    },

    #[error("Extraction produced no output")]
    EmptyOutput,

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

impl ExtractionError {
    /// Create a write verification error.
    pub fn write_verification(expected: u64, actual: u64) -> Self {
        Self::WriteVerification { expected, actual }
    }

    /// Wrap a failed codec command, classifying it by its message.
    pub fn execution(source: &EngineError) -> Self {
        let message = match source {
            EngineError::CommandFailed { stderr_tail, .. } => stderr_tail.clone(),
            other => other.to_string(),
        };
        Self::Execution {
            kind: classify_execution_error(&message),
            message,
        }
    }

    /// Execution subclass, if this is an execution failure.
    pub fn execution_kind(&self) -> Option<ExecutionErrorKind> {
        match self {
            Self::Execution { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type for extraction.
pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Map an engine failure message to an [`ExecutionErrorKind`].
///
/// Checks run in a fixed order; the first match wins.
pub fn classify_execution_error(message: &str) -> ExecutionErrorKind {
    let msg = message.to_ascii_lowercase();
    let any = |needles: &[&str]| needles.iter().any(|n| msg.contains(n));

    if any(&[
        "invalid data found",
        "moov atom not found",
        "could not find codec parameters",
        "corrupt",
        "end of file",
        "header missing",
    ]) {
        ExecutionErrorKind::UnsupportedOrCorrupt
    } else if any(&["no such file or directory", "enoent", "file not found"]) {
        ExecutionErrorKind::IoError
    } else if any(&["permission denied", "eacces", "operation not permitted"]) {
        ExecutionErrorKind::PermissionError
    } else if any(&["out of memory", "cannot allocate memory", "enomem", "memory"]) {
        ExecutionErrorKind::ResourceExhausted
    } else if any(&[
        "unknown encoder",
        "unknown decoder",
        "encoder not found",
        "decoder not found",
        "unknown format",
        "codec not currently supported",
        "unsupported codec",
    ]) {
        ExecutionErrorKind::UnsupportedCodec
    } else {
        ExecutionErrorKind::GenericExtractionError
    }
}

/// A temporary file could not be removed. Logged, never returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning {
    pub file: String,
    pub reason: String,
}

impl std::fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to clean up {}: {}", self.file, self.reason)
    }
}
