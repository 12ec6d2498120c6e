//! Types for extraction requests and results.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Requested output audio format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossy, constant bitrate MPEG audio.
    #[default]
    Mp3,
    /// Lossless PCM, sample rate selected by quality.
    Wav,
    /// Lossy, constant bitrate AAC in an MP4 container.
    Aac,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [Self::Mp3, Self::Wav, Self::Aac];

    /// File extension of the produced file.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Aac => "m4a",
        }
    }

    /// Canonical media type of the produced file.
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Aac => "audio/mp4",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Aac => "aac",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "wav" => Ok(Self::Wav),
            "aac" | "m4a" => Ok(Self::Aac),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

/// Requested output quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    High,
    Medium,
    Low,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown quality: {}", other)),
        }
    }
}

/// A source file handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Original file name, used for the extension fallback.
    pub name: String,
    /// Declared media type; may be empty.
    pub media_type: String,
    /// File contents.
    pub data: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Lowercased extension of `name`, if any.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Extracted audio tagged with its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryResource {
    pub data: Vec<u8>,
    pub media_type: String,
}

impl BinaryResource {
    pub fn new(data: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            data,
            media_type: media_type.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Origin of a progress value reported by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    /// Reported by the engine itself.
    Engine,
    /// Synthetic filler while the engine is silent.
    Estimated,
    /// The command finished.
    Complete,
}

/// Callback receiving `(percent, kind)` progress updates.
pub type ProgressCallback<'a> = &'a (dyn Fn(f64, ProgressKind) + Send + Sync);

/// Pipeline tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    /// Largest accepted source, in bytes. Exactly this size is accepted.
    pub max_file_size: u64,
    /// Interval between synthetic progress ticks.
    pub tick_interval: Duration,
    /// Highest value reported before the command completes.
    pub ceiling: f64,
    /// Lower bound of the random synthetic increment.
    pub min_increment: f64,
    /// Upper bound (exclusive) of the random synthetic increment.
    pub max_increment: f64,
}

/// 100 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            tick_interval: Duration::from_millis(300),
            ceiling: 95.0,
            min_increment: 0.5,
            max_increment: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_have_canonical_media_types() {
        assert_eq!(OutputFormat::Mp3.media_type(), "audio/mpeg");
        assert_eq!(OutputFormat::Wav.media_type(), "audio/wav");
        assert_eq!(OutputFormat::Aac.media_type(), "audio/mp4");
        assert_eq!(OutputFormat::Aac.extension(), "m4a");
    }

    #[test]
    fn parses_cli_strings() {
        assert_eq!("MP3".parse::<OutputFormat>().unwrap(), OutputFormat::Mp3);
        assert_eq!("m4a".parse::<OutputFormat>().unwrap(), OutputFormat::Aac);
        assert!("ogg".parse::<OutputFormat>().is_err());
        assert_eq!("low".parse::<Quality>().unwrap(), Quality::Low);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&OutputFormat::Wav).unwrap(), "\"wav\"");
        assert_eq!(serde_json::to_string(&Quality::Medium).unwrap(), "\"medium\"");
    }

    #[test]
    fn source_extension_is_lowercased() {
        let file = SourceFile::new("Clip.MP4", "", vec![]);
        assert_eq!(file.extension().as_deref(), Some("mp4"));
        assert_eq!(SourceFile::new("noext", "", vec![]).extension(), None);
    }
}
