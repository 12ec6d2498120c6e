//! Single-file extraction against the shared engine.

use parking_lot::Mutex;
use rand::Rng;
use tokio::time::MissedTickBehavior;

use crate::engine::{EngineError, EngineHandle, MediaEngine};

use super::command::{build_command, CodecParams};
use super::errors::{CleanupWarning, ExtractionError, ExtractionResult, ValidationError};
use super::names::TempNames;
use super::progress::ProgressEstimator;
use super::types::{
    BinaryResource, ExtractionConfig, OutputFormat, ProgressCallback, ProgressKind, Quality,
    SourceFile,
};
use super::validation::validate_source;

/// Runs extractions on the engine held by an [`EngineHandle`].
///
/// Calls must not overlap: the engine filesystem is shared. The batch
/// orchestrator guarantees this by awaiting each job before the next.
#[derive(Debug, Clone)]
pub struct Extractor {
    handle: EngineHandle,
    config: ExtractionConfig,
}

impl Extractor {
    pub fn new(handle: EngineHandle, config: ExtractionConfig) -> Self {
        Self { handle, config }
    }

    pub fn handle(&self) -> &EngineHandle {
        &self.handle
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract the audio track of `source` as `format` at `quality`.
    ///
    /// Validation happens before the engine is touched. Temporary files are
    /// removed whatever the outcome. A fatal engine error marks the handle
    /// failed.
    pub async fn extract(
        &self,
        source: &SourceFile,
        format: OutputFormat,
        quality: Quality,
        on_progress: ProgressCallback<'_>,
    ) -> ExtractionResult<BinaryResource> {
        let state = self.handle.state();
        validate_source(source, state, self.config.max_file_size)?;
        let engine = self
            .handle
            .engine()
            .ok_or(ValidationError::EngineNotReady { state })?;

        let input_ext = source.extension().unwrap_or_default();
        let names = TempNames::generate(&input_ext, format);

        tracing::info!(
            source = %source.name,
            size = source.size(),
            %format,
            %quality,
            "Extracting audio"
        );

        let result = self
            .run(engine.as_ref(), source, &names, format, quality, on_progress)
            .await;

        cleanup(engine.as_ref(), &names).await;

        match &result {
            Ok(resource) => {
                tracing::info!(
                    source = %source.name,
                    output_size = resource.size(),
                    "Extraction complete"
                );
            }
            Err(ExtractionError::Engine(e)) if e.is_fatal() => {
                if let Some(dead) = self.handle.mark_failed(e.to_string()) {
                    dead.terminate().await;
                }
            }
            Err(e) => {
                tracing::warn!(source = %source.name, error = %e, "Extraction failed");
            }
        }

        result
    }

    async fn run(
        &self,
        engine: &dyn MediaEngine,
        source: &SourceFile,
        names: &TempNames,
        format: OutputFormat,
        quality: Quality,
        on_progress: ProgressCallback<'_>,
    ) -> ExtractionResult<BinaryResource> {
        engine
            .write_file(&names.input, &source.data)
            .await
            .map_err(engine_failure)?;
        let written = engine
            .read_file(&names.input)
            .await
            .map_err(engine_failure)?;
        if written.len() != source.data.len() {
            return Err(ExtractionError::write_verification(
                source.size(),
                written.len() as u64,
            ));
        }
        drop(written);

        let args = build_command(
            &names.input,
            &names.output,
            CodecParams::for_output(format, quality),
        );
        tracing::debug!("Engine command: {}", args.join(" "));

        self.exec_with_progress(engine, &args, on_progress)
            .await
            .map_err(engine_failure)?;

        let output = engine
            .read_file(&names.output)
            .await
            .map_err(engine_failure)?;
        if output.is_empty() {
            return Err(ExtractionError::EmptyOutput);
        }

        Ok(BinaryResource::new(output, format.media_type()))
    }

    /// Run the command while blending engine and synthetic progress.
    async fn exec_with_progress(
        &self,
        engine: &dyn MediaEngine,
        args: &[String],
        on_progress: ProgressCallback<'_>,
    ) -> Result<(), EngineError> {
        let estimator = Mutex::new(ProgressEstimator::new(self.config.ceiling));

        let report_engine = |ratio: f64| {
            let emitted = estimator.lock().observe_engine(ratio * 100.0);
            if let Some(value) = emitted {
                on_progress(value, ProgressKind::Engine);
            }
        };

        let mut exec = engine.exec(args, &report_engine);

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately.
        ticker.tick().await;

        let outcome = loop {
            tokio::select! {
                res = &mut exec => break res,
                _ = ticker.tick() => {
                    let increment = self.random_increment();
                    let emitted = estimator.lock().tick(increment);
                    if let Some(value) = emitted {
                        on_progress(value, ProgressKind::Estimated);
                    }
                }
            }
        };
        drop(exec);

        outcome?;
        let emitted = estimator.lock().complete();
        if let Some(value) = emitted {
            on_progress(value, ProgressKind::Complete);
        }
        Ok(())
    }

    fn random_increment(&self) -> f64 {
        let (min, max) = (self.config.min_increment, self.config.max_increment);
        if max > min {
            rand::rng().random_range(min..max)
        } else {
            min
        }
    }
}

/// Keep fatal errors as engine failures; classify everything else.
fn engine_failure(e: EngineError) -> ExtractionError {
    if e.is_fatal() {
        ExtractionError::Engine(e)
    } else {
        ExtractionError::execution(&e)
    }
}

/// Delete both temporary files. Failures become logged warnings.
async fn cleanup(engine: &dyn MediaEngine, names: &TempNames) {
    for file in [&names.input, &names.output] {
        match engine.delete_file(file).await {
            Ok(()) => {}
            Err(EngineError::NotFound(_)) => {
                tracing::debug!("Temporary file {} was never created", file);
            }
            Err(e) => {
                let warning = CleanupWarning {
                    file: file.clone(),
                    reason: e.to_string(),
                };
                tracing::warn!("{}", warning);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeEngine;
    use crate::engine::EngineState;
    use crate::extraction::ExecutionErrorKind;
    use std::sync::Arc;
    use std::time::Duration;

    fn ready(engine: Arc<FakeEngine>) -> (Extractor, EngineHandle) {
        let handle = EngineHandle::new();
        handle.install(engine, "fake");
        let config = ExtractionConfig {
            tick_interval: Duration::from_millis(5),
            ..ExtractionConfig::default()
        };
        (Extractor::new(handle.clone(), config), handle)
    }

    fn mp4(size: usize) -> SourceFile {
        SourceFile::new("clip.mp4", "video/mp4", vec![7u8; size])
    }

    fn collect() -> (Arc<Mutex<Vec<(f64, ProgressKind)>>>, impl Fn(f64, ProgressKind) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |v: f64, k: ProgressKind| sink.lock().push((v, k)))
    }

    #[tokio::test]
    async fn extracts_and_tags_media_type() {
        let engine = FakeEngine::new();
        engine.set_output(vec![1u8; 4096]);
        let (extractor, _) = ready(engine.clone());

        let (seen, sink) = collect();
        let out = extractor
            .extract(&mp4(10 * 1024 * 1024), OutputFormat::Mp3, Quality::High, &sink)
            .await
            .unwrap();

        assert_eq!(out.media_type, "audio/mpeg");
        assert_eq!(out.size(), 4096);
        assert_eq!(seen.lock().last(), Some(&(100.0, ProgressKind::Complete)));
        assert!(engine.file_names().is_empty(), "temp files left behind");

        let exec = engine
            .operations()
            .into_iter()
            .find(|op| op.starts_with("exec:"))
            .unwrap();
        assert!(exec.contains("-b:a 320k"));
    }

    #[tokio::test]
    async fn oversized_file_never_touches_engine() {
        let engine = FakeEngine::new();
        let handle = EngineHandle::new();
        handle.install(engine.clone(), "fake");
        let extractor = Extractor::new(
            handle,
            ExtractionConfig {
                max_file_size: 1024,
                ..ExtractionConfig::default()
            },
        );

        let err = extractor
            .extract(&mp4(1025), OutputFormat::Wav, Quality::Low, &|_v: f64, _k: ProgressKind| {})
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ExtractionError::Validation(ValidationError::FileTooLarge { .. })
        ));
        assert!(engine.operations().is_empty());
    }

    #[tokio::test]
    async fn not_ready_engine_is_a_validation_error() {
        let extractor = Extractor::new(EngineHandle::new(), ExtractionConfig::default());
        let err = extractor
            .extract(&mp4(10), OutputFormat::Mp3, Quality::High, &|_v: f64, _k: ProgressKind| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Validation(ValidationError::EngineNotReady {
                state: EngineState::NotLoaded
            })
        ));
    }

    #[tokio::test]
    async fn empty_output_still_cleans_up_both_files() {
        let engine = FakeEngine::new();
        engine.set_output(Vec::new());
        let (extractor, _) = ready(engine.clone());

        let err = extractor
            .extract(&mp4(100), OutputFormat::Aac, Quality::Medium, &|_v: f64, _k: ProgressKind| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyOutput));

        let deletes: Vec<String> = engine
            .operations()
            .into_iter()
            .filter(|op| op.starts_with("delete:"))
            .collect();
        assert_eq!(deletes.len(), 2);
        assert!(deletes[0].starts_with("delete:input_"));
        assert!(deletes[1].starts_with("delete:output_"));
        assert!(engine.file_names().is_empty());
    }

    #[tokio::test]
    async fn missing_output_is_an_io_error() {
        let engine = FakeEngine::new();
        engine.skip_output();
        let (extractor, handle) = ready(engine.clone());

        let err = extractor
            .extract(&mp4(100), OutputFormat::Mp3, Quality::High, &|_v: f64, _k: ProgressKind| {})
            .await
            .unwrap_err();
        assert_eq!(err.execution_kind(), Some(ExecutionErrorKind::IoError));
        assert!(err.to_string().contains("No such file or directory"));
        assert!(handle.is_ready());
        assert!(engine.file_names().is_empty());
    }

    #[tokio::test]
    async fn short_write_fails_verification() {
        let engine = FakeEngine::new();
        engine.truncate_writes();
        let (extractor, _) = ready(engine.clone());

        let err = extractor
            .extract(&mp4(100), OutputFormat::Mp3, Quality::High, &|_v: f64, _k: ProgressKind| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::WriteVerification {
                expected: 100,
                actual: 50
            }
        ));
        assert_eq!(engine.exec_count(), 0);
    }

    #[tokio::test]
    async fn command_failure_is_classified() {
        let engine = FakeEngine::new();
        engine.fail_exec("clip.mp4: Invalid data found when processing input");
        let (extractor, handle) = ready(engine.clone());

        let err = extractor
            .extract(&mp4(100), OutputFormat::Mp3, Quality::High, &|_v: f64, _k: ProgressKind| {})
            .await
            .unwrap_err();
        assert_eq!(
            err.execution_kind(),
            Some(ExecutionErrorKind::UnsupportedOrCorrupt)
        );
        // A failed command does not cost the engine its readiness.
        assert!(handle.is_ready());
    }

    #[tokio::test]
    async fn fatal_engine_error_marks_handle_failed() {
        let engine = FakeEngine::new();
        engine.fail_exec_fatally("process exited unexpectedly");
        let (extractor, handle) = ready(engine.clone());

        let err = extractor
            .extract(&mp4(100), OutputFormat::Mp3, Quality::High, &|_v: f64, _k: ProgressKind| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Engine(EngineError::Terminated(_))));
        assert_eq!(handle.state(), EngineState::Failed);
        assert!(engine.was_terminated());
    }

    #[tokio::test]
    async fn cleanup_failures_do_not_fail_the_job() {
        let engine = FakeEngine::new();
        engine.fail_deletes();
        let (extractor, _) = ready(engine.clone());

        let out = extractor
            .extract(&mp4(100), OutputFormat::Wav, Quality::High, &|_v: f64, _k: ProgressKind| {})
            .await
            .unwrap();
        assert_eq!(out.media_type, "audio/wav");
    }

    #[tokio::test]
    async fn progress_blends_sources_and_never_decreases() {
        let engine = FakeEngine::new();
        engine.set_progress(vec![0.1, 0.3, 0.2, 0.5, 0.4, 0.9]);
        engine.set_exec_delay(Duration::from_millis(120));
        let (extractor, _) = ready(engine.clone());

        let (seen, sink) = collect();
        extractor
            .extract(&mp4(100), OutputFormat::Mp3, Quality::Low, &sink)
            .await
            .unwrap();

        let seen = seen.lock();
        let values: Vec<f64> = seen.iter().map(|(v, _)| *v).collect();
        assert!(values.windows(2).all(|w| w[1] > w[0]), "{values:?}");
        assert!(seen.iter().any(|(_, k)| *k == ProgressKind::Engine));
        assert!(values[..values.len() - 1].iter().all(|v| *v <= 95.0));
        assert_eq!(seen.last(), Some(&(100.0, ProgressKind::Complete)));
    }

    #[tokio::test]
    async fn silent_engine_gets_synthetic_progress() {
        let engine = FakeEngine::new();
        engine.set_exec_delay(Duration::from_millis(100));
        let (extractor, _) = ready(engine.clone());

        let (seen, sink) = collect();
        extractor
            .extract(&mp4(100), OutputFormat::Mp3, Quality::Low, &sink)
            .await
            .unwrap();

        let seen = seen.lock();
        assert!(seen.iter().any(|(_, k)| *k == ProgressKind::Estimated));
        assert!(!seen.iter().any(|(_, k)| *k == ProgressKind::Engine));
    }
}
