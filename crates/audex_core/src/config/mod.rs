//! Configuration management for audex.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation on load with automatic defaults
//!
//! # Example
//!
//! ```no_run
//! use audex_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new("audex.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Output folder: {}", config.settings().paths.output_dir);
//!
//! config.settings_mut().logging.file_logging = false;
//! config.update_section(ConfigSection::Logging).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, EngineSettings, ExtractionSettings, LoggingSettings, PathSettings, Settings,
};
