//! Codec parameter table and command construction.

use super::types::{OutputFormat, Quality};

/// Encoder settings for one (format, quality) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecParams {
    /// Constant bitrate, e.g. `192k`.
    Bitrate {
        codec: &'static str,
        bitrate: &'static str,
    },
    /// Uncompressed PCM at a fixed sample rate in Hz.
    SampleRate { codec: &'static str, rate: u32 },
}

impl CodecParams {
    /// Look up the encoder settings for a format and quality.
    pub fn for_output(format: OutputFormat, quality: Quality) -> Self {
        match format {
            OutputFormat::Mp3 => Self::Bitrate {
                codec: "libmp3lame",
                bitrate: match quality {
                    Quality::High => "320k",
                    Quality::Medium => "192k",
                    Quality::Low => "128k",
                },
            },
            OutputFormat::Wav => Self::SampleRate {
                codec: "pcm_s16le",
                rate: match quality {
                    Quality::High => 48000,
                    Quality::Medium => 44100,
                    Quality::Low => 22050,
                },
            },
            OutputFormat::Aac => Self::Bitrate {
                codec: "aac",
                bitrate: match quality {
                    Quality::High => "256k",
                    Quality::Medium => "128k",
                    Quality::Low => "96k",
                },
            },
        }
    }

    fn args(&self) -> Vec<String> {
        match self {
            Self::Bitrate { codec, bitrate } => vec![
                "-c:a".to_string(),
                codec.to_string(),
                "-b:a".to_string(),
                bitrate.to_string(),
            ],
            Self::SampleRate { codec, rate } => vec![
                "-c:a".to_string(),
                codec.to_string(),
                "-ar".to_string(),
                rate.to_string(),
            ],
        }
    }
}

/// Build the full engine argument list: `-i <input> -vn <codec> -y <output>`.
pub fn build_command(input: &str, output: &str, params: CodecParams) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-i".to_string(),
        input.to_string(),
        "-vn".to_string(),
    ];
    args.extend(params.args());
    args.push("-y".to_string());
    args.push(output.to_string());
    args
}
