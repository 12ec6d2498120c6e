//! Job types and data structures.

use serde::{Deserialize, Serialize};

use crate::extraction::{OutputFormat, Quality};
use crate::storage::BlobId;

/// Status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for a batch run.
    #[default]
    Pending,
    /// Being extracted.
    Processing,
    /// Extracted; `result` is set.
    Completed,
    /// Failed; `error` is set.
    Error,
}

impl JobStatus {
    /// Get display string for UI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Completed => "Completed",
            Self::Error => "Error",
        }
    }

    /// Allowed transitions: pending -> processing -> completed | error, and
    /// error -> pending for an explicit retry.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Error)
                | (Self::Error, Self::Pending)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Reference to the source file of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceHandle {
    /// Original file name.
    pub name: String,
    /// Declared media type; may be empty.
    pub media_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Where the bytes live.
    pub blob: BlobId,
}

/// Reference to the extracted audio of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultHandle {
    pub blob: BlobId,
    /// Canonical media type of the output format.
    pub media_type: String,
    /// Size in bytes.
    pub size: u64,
}

/// A single extraction job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier (UUID v4).
    pub id: String,
    pub source: SourceHandle,
    pub format: OutputFormat,
    pub quality: Quality,
    pub status: JobStatus,
    /// Percent in [0, 100].
    pub progress: f64,
    /// Error message if status is Error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Extracted audio if status is Completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultHandle>,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl Job {
    /// Create a new pending job with a fresh id.
    pub fn new(source: SourceHandle, format: OutputFormat, quality: Quality) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source,
            format,
            quality,
            status: JobStatus::Pending,
            progress: 0.0,
            error: None,
            result: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Output file name: source stem plus the format extension.
    pub fn output_name(&self) -> String {
        let stem = std::path::Path::new(&self.source.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("audio");
        format!("{}.{}", stem, self.format.extension())
    }
}

/// A job to enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub source: SourceHandle,
    pub format: OutputFormat,
    pub quality: Quality,
}

/// Partial update of a job's pipeline-owned fields.
///
/// `None` leaves a field untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub error: Option<Option<String>>,
    pub result: Option<Option<ResultHandle>>,
    pub progress: Option<f64>,
}

impl JobPatch {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(Some(message.into())),
            ..Self::default()
        }
    }

    pub fn result(result: ResultHandle) -> Self {
        Self {
            result: Some(Some(result)),
            ..Self::default()
        }
    }

    /// Clear error, result and progress before a retry.
    pub fn reset() -> Self {
        Self {
            error: Some(None),
            result: Some(None),
            progress: Some(0.0),
        }
    }
}
