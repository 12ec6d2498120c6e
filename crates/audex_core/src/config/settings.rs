//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::{EngineSource, RetryPolicy};
use crate::extraction::{ExtractionConfig, OutputFormat, Quality};
use crate::logging::LogLevel;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Engine acquisition settings.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Extraction pipeline settings.
    #[serde(default)]
    pub extraction: ExtractionSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Identifies a top-level section for section-level updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Paths,
    Engine,
    Extraction,
    Logging,
}

impl ConfigSection {
    /// All sections in file order.
    pub const ALL: [ConfigSection; 4] = [
        ConfigSection::Paths,
        ConfigSection::Engine,
        ConfigSection::Extraction,
        ConfigSection::Logging,
    ];

    /// TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Engine => "engine",
            ConfigSection::Extraction => "extraction",
            ConfigSection::Logging => "logging",
        }
    }

    /// Comment written above the section header.
    pub(crate) fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "# State, cache, log and output directories\n",
            ConfigSection::Engine => "# Processing engine sources, tried in order\n",
            ConfigSection::Extraction => "# Extraction limits and progress estimation\n",
            ConfigSection::Logging => "# Logging configuration\n",
        }
    }
}

/// Directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Folder holding queue.json, history.json and the blob store.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Folder where staged engine artifacts are materialized.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Folder for log files.
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,

    /// Folder where the CLI writes extracted audio.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_state_dir() -> String {
    ".audex".to_string()
}

fn default_cache_dir() -> String {
    ".audex/engine".to_string()
}

fn default_logs_dir() -> String {
    ".audex/logs".to_string()
}

fn default_output_dir() -> String {
    "audex_output".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            cache_dir: default_cache_dir(),
            logs_dir: default_logs_dir(),
            output_dir: default_output_dir(),
        }
    }
}

impl PathSettings {
    pub fn state_dir(&self) -> PathBuf {
        PathBuf::from(&self.state_dir)
    }

    pub fn cache_dir(&self) -> PathBuf {
        PathBuf::from(&self.cache_dir)
    }

    pub fn logs_dir(&self) -> PathBuf {
        PathBuf::from(&self.logs_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }

    /// Path to the persisted job queue.
    pub fn queue_file(&self) -> PathBuf {
        self.state_dir().join("queue.json")
    }

    /// Path to the persisted history.
    pub fn history_file(&self) -> PathBuf {
        self.state_dir().join("history.json")
    }

    /// Directory backing the content-addressed blob store.
    pub fn blob_dir(&self) -> PathBuf {
        self.state_dir().join("blobs")
    }
}

/// Engine acquisition configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Attempts per artifact fetch (first try included).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound on the delay between retries, in milliseconds.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Candidate engine locations, tried in order.
    #[serde(default = "default_sources")]
    pub sources: Vec<EngineSource>,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_retry_max_delay_ms() -> u64 {
    5000
}

fn default_sources() -> Vec<EngineSource> {
    vec![
        EngineSource::new("system", "ffmpeg", Vec::new()),
        EngineSource::new("local", "./bin", vec!["ffmpeg".to_string()]),
    ]
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            sources: default_sources(),
        }
    }
}

impl EngineSettings {
    /// Build the retry policy used for artifact fetches.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

/// Extraction pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSettings {
    /// Largest accepted source file, in megabytes (MiB).
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Interval between synthetic progress ticks, in milliseconds.
    #[serde(default = "default_progress_tick_ms")]
    pub progress_tick_ms: u64,

    /// Progress ceiling held until the engine command completes.
    #[serde(default = "default_progress_ceiling")]
    pub progress_ceiling: f64,

    /// Format used when none is requested.
    #[serde(default)]
    pub default_format: OutputFormat,

    /// Quality used when none is requested.
    #[serde(default)]
    pub default_quality: Quality,
}

fn default_max_file_size_mb() -> u64 {
    100
}

fn default_progress_tick_ms() -> u64 {
    300
}

fn default_progress_ceiling() -> f64 {
    95.0
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size_mb(),
            progress_tick_ms: default_progress_tick_ms(),
            progress_ceiling: default_progress_ceiling(),
            default_format: OutputFormat::default(),
            default_quality: Quality::default(),
        }
    }
}

impl ExtractionSettings {
    /// Build the pipeline configuration from these settings.
    pub fn to_config(&self) -> ExtractionConfig {
        ExtractionConfig {
            max_file_size: self.max_file_size_mb * 1024 * 1024,
            tick_interval: Duration::from_millis(self.progress_tick_ms.max(1)),
            ceiling: self.progress_ceiling.clamp(0.0, 99.0),
            ..ExtractionConfig::default()
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when RUST_LOG is not set.
    #[serde(default)]
    pub level: LogLevel,

    /// Also write a daily rolling log file under `paths.logs_dir`.
    #[serde(default = "default_true")]
    pub file_logging: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            file_logging: true,
        }
    }
}
