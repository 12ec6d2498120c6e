//! Core types for engine acquisition.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lifecycle state of the processing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No engine instance is held.
    #[default]
    NotLoaded,
    /// A load is in progress.
    Loading,
    /// An engine instance passed its self-test and accepts work.
    Ready,
    /// The engine was ready but died; it must be loaded again.
    Failed,
}

impl EngineState {
    /// Get display string for UI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotLoaded => "Not loaded",
            Self::Loading => "Loading",
            Self::Ready => "Ready",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate location for the engine binary.
///
/// `location` is either a local path (file, directory or a program name
/// looked up on `PATH`) or an `http(s)://` / `file://` base URL. `artifacts`
/// lists the files fetched from that base when direct initialization fails;
/// the first artifact is the executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSource {
    /// Short name used in logs and errors.
    pub name: String,
    /// Base location of the engine.
    pub location: String,
    /// Files required for staged initialization.
    #[serde(default)]
    pub artifacts: Vec<String>,
}

impl EngineSource {
    pub fn new(name: impl Into<String>, location: impl Into<String>, artifacts: Vec<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            artifacts,
        }
    }

    /// Whether the location needs a network fetch.
    pub fn is_remote(&self) -> bool {
        is_remote_location(&self.location)
    }

    /// Full location of one artifact under this source.
    pub fn artifact_location(&self, artifact: &str) -> String {
        if self.location.ends_with('/') {
            format!("{}{}", self.location, artifact)
        } else {
            format!("{}/{}", self.location, artifact)
        }
    }
}

/// Whether a location string points at a remote resource.
pub(crate) fn is_remote_location(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// An artifact that has been fetched and written to local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    /// Artifact name as listed in the source.
    pub name: String,
    /// Where it was materialized.
    pub path: PathBuf,
}

/// Retry schedule for artifact fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per artifact, first try included.
    pub attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`,
    /// clamped to `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Progress events emitted while loading the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadProgress {
    /// Starting on a source.
    TryingSource {
        source: String,
        index: usize,
        total: usize,
    },
    /// Direct initialization failed; staging artifacts instead.
    Staging { source: String },
    /// Download progress for one artifact.
    Fetching { artifact: String, percent: u8 },
    /// A fetch failed and will be retried after `delay`.
    Retrying {
        artifact: String,
        attempt: u32,
        delay: Duration,
    },
    /// Running the post-load self-test.
    SelfTest { source: String },
    /// The source failed; moving on.
    SourceFailed { source: String, reason: String },
    /// The engine is ready.
    Ready { source: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=5).map(|n| policy.delay_for(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
    }

    #[test]
    fn backoff_survives_huge_retry_numbers() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn artifact_location_joins_with_single_slash() {
        let a = EngineSource::new("cdn", "https://cdn.example/ffmpeg/", vec![]);
        let b = EngineSource::new("cdn", "https://cdn.example/ffmpeg", vec![]);
        assert_eq!(a.artifact_location("core"), "https://cdn.example/ffmpeg/core");
        assert_eq!(b.artifact_location("core"), "https://cdn.example/ffmpeg/core");
        assert!(a.is_remote());
        assert!(!EngineSource::new("local", "./bin", vec![]).is_remote());
    }
}
