//! Reading and writing `audex.toml`.
//!
//! Whole-file saves regenerate the document with a comment above each
//! table. [`ConfigManager::update_section`] instead edits the file on disk
//! through `toml_edit` and swaps a single table, so hand edits elsewhere in
//! the file survive. Every write goes to `<file>.toml.tmp` first and is then
//! renamed over the original.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::{DocumentMut, Item};

use super::settings::{ConfigSection, Settings};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid TOML in config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not edit config document: {0}")]
    Edit(#[from] toml_edit::TomlError),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Owns the settings of one config file.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Bind to `config_path` with default settings. Nothing is read yet.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// In-memory only until [`save`](Self::save) or
    /// [`update_section`](Self::update_section).
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Read and validate an existing file.
    pub fn load(&mut self) -> ConfigResult<()> {
        let content = self
            .read()?
            .ok_or_else(|| ConfigError::NotFound(self.config_path.clone()))?;
        let settings: Settings = toml::from_str(&content)?;
        validate(&settings)?;
        self.settings = settings;
        Ok(())
    }

    /// Read the file, or write the defaults when there is none.
    ///
    /// A file missing one of the known tables, or carrying tables this
    /// version does not know, is rewritten in normalized form.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        let Some(content) = self.read()? else {
            self.settings = Settings::default();
            self.save()?;
            tracing::info!("Wrote default config to {}", self.config_path.display());
            return Ok(());
        };

        let settings: Settings = toml::from_str(&content)?;
        validate(&settings)?;
        let stale = needs_normalizing(&content.parse::<DocumentMut>()?);
        self.settings = settings;

        if stale {
            tracing::debug!("Normalizing {}", self.config_path.display());
            self.save()?;
        }
        Ok(())
    }

    /// Create the state, cache, log and output directories.
    pub fn ensure_dirs_exist(&self) -> ConfigResult<()> {
        let paths = &self.settings.paths;
        for dir in [
            paths.state_dir(),
            paths.cache_dir(),
            paths.logs_dir(),
            paths.output_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| ConfigError::io(&dir, e))?;
        }
        Ok(())
    }

    /// Regenerate and write the whole file.
    pub fn save(&self) -> ConfigResult<()> {
        let content = self.render()?;
        self.write(&content)
    }

    /// Replace one table in the on-disk document with the in-memory values.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        validate(&self.settings)?;

        let mut doc = match self.read()? {
            Some(content) if !content.trim().is_empty() => content.parse::<DocumentMut>()?,
            _ => DocumentMut::new(),
        };

        let fragment = match section {
            ConfigSection::Paths => toml::to_string_pretty(&self.settings.paths)?,
            ConfigSection::Engine => toml::to_string_pretty(&self.settings.engine)?,
            ConfigSection::Extraction => toml::to_string_pretty(&self.settings.extraction)?,
            ConfigSection::Logging => toml::to_string_pretty(&self.settings.logging)?,
        };
        let mut table = fragment.parse::<DocumentMut>()?.as_table().clone();

        let name = section.table_name();
        match doc.get(name).and_then(Item::as_table) {
            Some(old) => table.decor_mut().clone_from(old.decor()),
            None => table.decor_mut().set_prefix(format!("\n{}", section.comment())),
        }
        doc[name] = Item::Table(table);

        self.write(&doc.to_string())
    }

    fn render(&self) -> ConfigResult<String> {
        let mut doc = toml::to_string_pretty(&self.settings)?.parse::<DocumentMut>()?;
        for section in ConfigSection::ALL {
            if let Some(table) = doc
                .get_mut(section.table_name())
                .and_then(Item::as_table_mut)
            {
                table.decor_mut().set_prefix(format!("\n{}", section.comment()));
            }
        }
        Ok(format!("# audex configuration\n{}", doc))
    }

    fn read(&self) -> ConfigResult<Option<String>> {
        match fs::read_to_string(&self.config_path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::io(&self.config_path, e)),
        }
    }

    fn write(&self, content: &str) -> ConfigResult<()> {
        let path = &self.config_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
        }

        let temp = path.with_extension("toml.tmp");
        let written = fs::File::create(&temp).and_then(|mut file| {
            file.write_all(content.as_bytes())?;
            file.sync_all()
        });
        written.map_err(|e| ConfigError::io(&temp, e))?;
        fs::rename(&temp, path).map_err(|e| ConfigError::io(path, e))
    }
}

/// Whether the document lacks a known table or carries an unknown one.
fn needs_normalizing(doc: &DocumentMut) -> bool {
    let known = |key: &str| ConfigSection::ALL.iter().any(|s| s.table_name() == key);
    doc.iter().any(|(key, _)| !known(key))
        || ConfigSection::ALL
            .iter()
            .any(|s| !doc.contains_key(s.table_name()))
}

/// Reject settings the loader or pipeline cannot work with.
fn validate(settings: &Settings) -> ConfigResult<()> {
    let mut names = HashSet::new();
    for source in &settings.engine.sources {
        if source.name.trim().is_empty() {
            return Err(ConfigError::invalid("engine.sources.name", "must not be empty"));
        }
        if source.location.trim().is_empty() {
            return Err(ConfigError::invalid(
                "engine.sources.location",
                format!("source '{}' has no location", source.name),
            ));
        }
        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::invalid(
                "engine.sources.name",
                format!("'{}' is listed twice", source.name),
            ));
        }
    }

    let extraction = &settings.extraction;
    if extraction.max_file_size_mb == 0 {
        return Err(ConfigError::invalid("extraction.max_file_size_mb", "must be positive"));
    }
    if !(extraction.progress_ceiling > 0.0 && extraction.progress_ceiling < 100.0) {
        return Err(ConfigError::invalid(
            "extraction.progress_ceiling",
            "must be between 0 and 100 (exclusive)",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSource;
    use tempfile::tempdir;

    fn manager_in(dir: &Path) -> ConfigManager {
        ConfigManager::new(dir.join("audex.toml"))
    }

    #[test]
    fn first_run_writes_every_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("audex.toml");

        ConfigManager::new(&path).load_or_create().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        for header in ["[paths]", "[engine]", "[[engine.sources]]", "[extraction]", "[logging]"] {
            assert!(content.contains(header), "missing {header}");
        }
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn written_defaults_load_back() {
        let dir = tempdir().unwrap();
        manager_in(dir.path()).load_or_create().unwrap();

        let mut again = manager_in(dir.path());
        again.load().unwrap();
        let names: Vec<_> = again
            .settings()
            .engine
            .sources
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, ["system", "local"]);
        assert_eq!(again.settings().extraction.max_file_size_mb, 100);
    }

    #[test]
    fn partial_file_keeps_values_and_gains_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audex.toml");
        fs::write(&path, "[paths]\noutput_dir = \"rips\"\n").unwrap();

        let mut manager = manager_in(dir.path());
        manager.load_or_create().unwrap();

        assert_eq!(manager.settings().paths.output_dir, "rips");
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("[extraction]"));
        assert!(content.contains("rips"));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempdir().unwrap();
        let mut manager = manager_in(dir.path());
        assert!(matches!(manager.load(), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn section_update_keeps_hand_edits_elsewhere() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audex.toml");
        let mut manager = manager_in(dir.path());
        manager.load_or_create().unwrap();

        let edited = fs::read_to_string(&path)
            .unwrap()
            .replace("max_file_size_mb = 100", "max_file_size_mb = 42");
        fs::write(&path, edited).unwrap();

        manager.settings_mut().logging.file_logging = false;
        manager.update_section(ConfigSection::Logging).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("file_logging = false"));
        assert!(content.contains("max_file_size_mb = 42"));
    }

    #[test]
    fn duplicate_source_names_are_rejected() {
        let dir = tempdir().unwrap();
        let mut manager = manager_in(dir.path());
        manager.settings_mut().engine.sources =
            vec![EngineSource::new("a", "ffmpeg", vec![]), EngineSource::new("a", "./bin", vec![])];

        let err = manager.update_section(ConfigSection::Engine).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(!dir.path().join("audex.toml").exists());
    }

    #[test]
    fn out_of_range_ceiling_fails_load() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("audex.toml"),
            "[extraction]\nprogress_ceiling = 100.0\n",
        )
        .unwrap();

        let mut manager = manager_in(dir.path());
        assert!(matches!(
            manager.load_or_create(),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
