//! Seams between the loader, the pipeline and a concrete engine.

use std::sync::Arc;

use async_trait::async_trait;

use super::errors::{EngineResult, FetchError};
use super::types::{EngineSource, LocalArtifact};

/// Callback receiving the engine's own progress ratio in `[0, 1]`.
pub type RatioCallback<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// A media-processing engine with a private filesystem and command execution.
///
/// One instance is shared by every job; callers must not overlap operations
/// on it.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Write a file into the engine's filesystem, replacing any existing one.
    async fn write_file(&self, name: &str, data: &[u8]) -> EngineResult<()>;

    /// Read a file back from the engine's filesystem.
    async fn read_file(&self, name: &str) -> EngineResult<Vec<u8>>;

    /// Delete a file from the engine's filesystem.
    async fn delete_file(&self, name: &str) -> EngineResult<()>;

    /// Run a codec command; file arguments are engine filesystem names.
    async fn exec(&self, args: &[String], on_progress: RatioCallback<'_>) -> EngineResult<()>;

    /// Minimal no-op invocation used to verify a freshly loaded engine.
    async fn self_test(&self) -> EngineResult<()> {
        let args = ["-hide_banner".to_string(), "-version".to_string()];
        self.exec(&args, &|_ratio: f64| {}).await
    }

    /// Release the instance's resources. The instance is unusable afterwards.
    async fn terminate(&self) {}
}

/// Creates engine instances from a source.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Initialize straight from the source location.
    async fn init_direct(&self, source: &EngineSource) -> EngineResult<Arc<dyn MediaEngine>>;

    /// Initialize from artifacts already materialized on local disk.
    async fn init_staged(
        &self,
        source: &EngineSource,
        artifacts: &[LocalArtifact],
    ) -> EngineResult<Arc<dyn MediaEngine>>;
}

/// Retrieves the bytes of one artifact.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Fetch `location`, reporting download percent when the size is known.
    async fn fetch(
        &self,
        location: &str,
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<Vec<u8>, FetchError>;
}
