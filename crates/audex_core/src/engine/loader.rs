//! Engine loader: ordered sources, staged fallback, post-load self-test.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::config::EngineSettings;

use super::errors::{FetchError, LoadError, SourceFailure};
use super::fetch::{fetch_with_retry, materialize, sanitize_component};
use super::handle::EngineHandle;
use super::traits::{ArtifactFetcher, EngineFactory, MediaEngine};
use super::types::{EngineSource, LoadProgress, LocalArtifact, RetryPolicy};

/// Callback receiving loader progress events.
pub type LoadProgressCallback<'a> = &'a (dyn Fn(LoadProgress) + Send + Sync);

/// Acquires the engine from an ordered list of sources.
///
/// For each source the loader tries direct initialization first. If that
/// fails it fetches the source's artifacts (with retry), materializes them
/// under the cache directory and initializes from the local copies. A fresh
/// instance must pass its self-test before it is installed; an instance that
/// fails is terminated and the next source is tried.
pub struct EngineLoader {
    sources: Vec<EngineSource>,
    factory: Arc<dyn EngineFactory>,
    fetcher: Arc<dyn ArtifactFetcher>,
    retry: RetryPolicy,
    cache_dir: PathBuf,
    load_lock: AsyncMutex<()>,
}

impl EngineLoader {
    pub fn new(
        sources: Vec<EngineSource>,
        factory: Arc<dyn EngineFactory>,
        fetcher: Arc<dyn ArtifactFetcher>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sources,
            factory,
            fetcher,
            retry: RetryPolicy::default(),
            cache_dir: cache_dir.into(),
            load_lock: AsyncMutex::new(()),
        }
    }

    /// Build a loader from the `[engine]` settings section.
    pub fn from_settings(
        settings: &EngineSettings,
        cache_dir: impl Into<PathBuf>,
        factory: Arc<dyn EngineFactory>,
        fetcher: Arc<dyn ArtifactFetcher>,
    ) -> Self {
        Self::new(settings.sources.clone(), factory, fetcher, cache_dir)
            .with_retry_policy(settings.retry_policy())
    }

    /// Replace the artifact retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn sources(&self) -> &[EngineSource] {
        &self.sources
    }

    /// Load the engine into `handle`.
    ///
    /// Does nothing if the handle is already ready. Concurrent callers are
    /// serialized; the second one finds the engine ready. On failure the
    /// handle is left `NotLoaded` and the call may be repeated later.
    pub async fn load(
        &self,
        handle: &EngineHandle,
        on_progress: LoadProgressCallback<'_>,
    ) -> Result<(), LoadError> {
        let _guard = self.load_lock.lock().await;

        if handle.is_ready() {
            tracing::debug!("Engine already ready, skipping load");
            return Ok(());
        }

        if self.sources.is_empty() {
            return Err(LoadError::NoSources);
        }

        if let Some(stale) = handle.begin_loading() {
            stale.terminate().await;
        }

        let total = self.sources.len();
        let mut failures = Vec::with_capacity(total);

        for (index, source) in self.sources.iter().enumerate() {
            tracing::info!(
                source = %source.name,
                location = %source.location,
                "Trying engine source {}/{}",
                index + 1,
                total
            );
            on_progress(LoadProgress::TryingSource {
                source: source.name.clone(),
                index,
                total,
            });

            match self.try_source(source, on_progress).await {
                Ok(engine) => {
                    handle.install(engine, &source.name);
                    tracing::info!(source = %source.name, "Engine ready");
                    on_progress(LoadProgress::Ready {
                        source: source.name.clone(),
                    });
                    return Ok(());
                }
                Err(failure) => {
                    tracing::warn!(source = %source.name, "Engine source failed: {}", failure);
                    on_progress(LoadProgress::SourceFailed {
                        source: source.name.clone(),
                        reason: failure.reasons.join("; "),
                    });
                    failures.push(failure);
                }
            }
        }

        handle.reset();
        let err = LoadError::Exhausted { failures };
        tracing::error!("{}", err);
        Err(err)
    }

    /// Produce a verified engine from one source.
    async fn try_source(
        &self,
        source: &EngineSource,
        on_progress: LoadProgressCallback<'_>,
    ) -> Result<Arc<dyn MediaEngine>, SourceFailure> {
        let failure = SourceFailure::new(&source.name);

        let direct_error = match self.factory.init_direct(source).await {
            Ok(engine) => {
                return self
                    .verify(source, engine, on_progress)
                    .await
                    .map_err(|reason| failure.with_reason("self-test", reason));
            }
            Err(e) => e,
        };
        tracing::debug!(source = %source.name, error = %direct_error, "Direct initialization failed");
        let failure = failure.with_reason("direct", &direct_error);

        if source.artifacts.is_empty() {
            return Err(failure.with_reason("staged", "no artifacts to stage"));
        }

        on_progress(LoadProgress::Staging {
            source: source.name.clone(),
        });

        let artifacts = match self.stage(source, on_progress).await {
            Ok(artifacts) => artifacts,
            Err(reason) => return Err(failure.with_reason("staged", reason)),
        };

        let engine = match self.factory.init_staged(source, &artifacts).await {
            Ok(engine) => engine,
            Err(e) => return Err(failure.with_reason("staged", e)),
        };

        self.verify(source, engine, on_progress)
            .await
            .map_err(|reason| failure.with_reason("self-test", reason))
    }

    /// Fetch and materialize every artifact of `source`.
    async fn stage(
        &self,
        source: &EngineSource,
        on_progress: LoadProgressCallback<'_>,
    ) -> Result<Vec<LocalArtifact>, String> {
        let dir = self.cache_dir.join(sanitize_component(&source.name));
        let mut staged = Vec::with_capacity(source.artifacts.len());

        for artifact in &source.artifacts {
            let location = source.artifact_location(artifact);
            let report_fetch = |percent: u8| {
                on_progress(LoadProgress::Fetching {
                    artifact: artifact.clone(),
                    percent,
                });
            };
            let report_retry = |attempt: u32, delay: std::time::Duration, _: &FetchError| {
                on_progress(LoadProgress::Retrying {
                    artifact: artifact.clone(),
                    attempt,
                    delay,
                });
            };

            let data = fetch_with_retry(
                self.fetcher.as_ref(),
                &location,
                &self.retry,
                &report_fetch,
                &report_retry,
            )
            .await
            .map_err(|e| format!("fetching {}: {}", artifact, e))?;

            let local = materialize(&dir, artifact, &data)
                .await
                .map_err(|e| format!("writing {}: {}", artifact, e))?;
            staged.push(local);
        }

        Ok(staged)
    }

    /// Run the self-test; terminate the instance if it fails.
    async fn verify(
        &self,
        source: &EngineSource,
        engine: Arc<dyn MediaEngine>,
        on_progress: LoadProgressCallback<'_>,
    ) -> Result<Arc<dyn MediaEngine>, String> {
        on_progress(LoadProgress::SelfTest {
            source: source.name.clone(),
        });

        match engine.self_test().await {
            Ok(()) => Ok(engine),
            Err(e) => {
                tracing::warn!(source = %source.name, error = %e, "Engine self-test failed, discarding instance");
                engine.terminate().await;
                Err(e.to_string())
            }
        }
    }
}
