//! Shared state opened once per invocation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use audex_core::config::{ConfigManager, Settings};
use audex_core::engine::{
    EngineHandle, EngineLoader, HttpFetcher, LoadProgress, ProcessEngineFactory,
};
use audex_core::extraction::Extractor;
use audex_core::jobs::JobQueue;
use audex_core::logging::{init_tracing, LogLevel};
use audex_core::orchestrator::BatchOrchestrator;
use audex_core::storage::{BlobStore, JsonHistoryStore};
use directories::ProjectDirs;
use tracing_appender::non_blocking::WorkerGuard;

const CONFIG_FILE: &str = "audex.toml";

pub struct App {
    config: ConfigManager,
    blobs: Arc<BlobStore>,
    queue: Arc<JobQueue>,
    history: Arc<JsonHistoryStore>,
}

impl App {
    /// Load the config, install logging and open the persisted state.
    ///
    /// Jobs and history entries whose blobs disappeared since the last run
    /// are reconciled before any command sees them.
    pub fn open(
        config_path: Option<PathBuf>,
        log_level: Option<LogLevel>,
    ) -> Result<(Self, Option<WorkerGuard>)> {
        let config_path = config_path.unwrap_or_else(default_config_path);
        let mut config = ConfigManager::new(&config_path);
        config
            .load_or_create()
            .with_context(|| format!("Failed to load config {}", config_path.display()))?;
        config
            .ensure_dirs_exist()
            .context("Failed to create configured directories")?;

        let settings = config.settings();
        let level = log_level.unwrap_or(settings.logging.level);
        let log_dir = settings
            .logging
            .file_logging
            .then(|| settings.paths.logs_dir());
        let guard = init_tracing(level, log_dir.as_deref());

        let paths = &settings.paths;
        let blobs = Arc::new(BlobStore::open(paths.blob_dir())?);
        let queue = Arc::new(JobQueue::open(paths.queue_file()));
        let history = Arc::new(JsonHistoryStore::open(paths.history_file()));

        queue.rehydrate(&blobs);
        history.rehydrate(&blobs)?;

        tracing::debug!("Using config {}", config_path.display());
        Ok((
            Self {
                config,
                blobs,
                queue,
                history,
            },
            guard,
        ))
    }

    pub fn settings(&self) -> &Settings {
        self.config.settings()
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn history(&self) -> &JsonHistoryStore {
        &self.history
    }

    /// Load the engine into `handle`, logging each loader step.
    pub async fn load_engine(&self, handle: &EngineHandle) -> Result<()> {
        let paths = &self.settings().paths;
        let loader = EngineLoader::from_settings(
            &self.settings().engine,
            paths.cache_dir(),
            Arc::new(ProcessEngineFactory::new(paths.state_dir().join("scratch"))),
            Arc::new(HttpFetcher::new()),
        );
        loader
            .load(handle, &report_load)
            .await
            .context("Failed to load the processing engine")?;
        Ok(())
    }

    pub fn orchestrator(&self, handle: EngineHandle) -> BatchOrchestrator {
        let extractor = Extractor::new(handle, self.settings().extraction.to_config());
        BatchOrchestrator::new(
            self.queue.clone(),
            extractor,
            self.blobs.clone(),
            self.history.clone(),
        )
    }

    /// Resolve the output directory for this invocation.
    pub fn output_dir(&self, requested: Option<PathBuf>) -> PathBuf {
        requested.unwrap_or_else(|| self.settings().paths.output_dir())
    }
}

fn default_config_path() -> PathBuf {
    let local = Path::new(CONFIG_FILE);
    if local.exists() {
        return local.to_path_buf();
    }
    ProjectDirs::from("", "", "audex")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
        .unwrap_or_else(|| local.to_path_buf())
}

fn report_load(event: LoadProgress) {
    // Source and retry steps are already logged by the loader.
    match event {
        LoadProgress::Fetching { artifact, percent } => {
            eprint!("\rFetching {}: {:>3}%", artifact, percent);
            if percent >= 100 {
                eprintln!();
            }
        }
        LoadProgress::Ready { source } => eprintln!("Engine ready ({})", source),
        _ => {}
    }
}
