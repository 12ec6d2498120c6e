//! Engine acquisition and lifecycle.
//!
//! The media engine is acquired once per process from an ordered list of
//! [`EngineSource`]s and shared by every job through an [`EngineHandle`].
//!
//! # Loading
//!
//! [`EngineLoader::load`] walks the sources in order. Each source is first
//! initialized directly; if that fails, its artifacts are fetched (with
//! exponential-backoff retry), written to the cache directory and used for a
//! staged initialization. The resulting instance must pass a self-test before
//! the handle becomes [`EngineState::Ready`]. When every source fails the
//! caller receives one [`LoadError`] listing each source's reasons.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use audex_core::engine::{EngineHandle, EngineLoader, HttpFetcher, ProcessEngineFactory};
//! use audex_core::config::EngineSettings;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = EngineSettings::default();
//! let loader = EngineLoader::from_settings(
//!     &settings,
//!     ".audex/engine",
//!     Arc::new(ProcessEngineFactory::new(".audex/scratch")),
//!     Arc::new(HttpFetcher::new()),
//! );
//!
//! let handle = EngineHandle::new();
//! loader.load(&handle, &|event| tracing::info!("{:?}", event)).await?;
//! assert!(handle.is_ready());
//! # Ok(())
//! # }
//! ```

mod errors;
mod fetch;
mod handle;
mod loader;
mod process;
mod traits;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{EngineError, EngineResult, FetchError, LoadError, SourceFailure};
pub use fetch::{fetch_with_retry, materialize, HttpFetcher};
pub use handle::EngineHandle;
pub use loader::{EngineLoader, LoadProgressCallback};
pub use process::{ProcessEngine, ProcessEngineFactory};
pub use traits::{ArtifactFetcher, EngineFactory, MediaEngine, RatioCallback};
pub use types::{EngineSource, EngineState, LoadProgress, LocalArtifact, RetryPolicy};
