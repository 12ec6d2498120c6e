//! Temporary file names inside the engine filesystem.

use rand::distr::Alphanumeric;
use rand::Rng;

use super::types::OutputFormat;

const SUFFIX_LEN: usize = 6;

/// Input and output names for one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempNames {
    pub input: String,
    pub output: String,
}

impl TempNames {
    /// `input_<millis>_<suffix>.<ext>` and `output_<millis>_<suffix>.<format ext>`.
    ///
    /// Input and output share the timestamp and suffix.
    pub fn generate(input_ext: &str, format: OutputFormat) -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix = random_suffix();
        let input_ext = sanitize_extension(input_ext);
        Self {
            input: format!("input_{}_{}.{}", millis, suffix, input_ext),
            output: format!("output_{}_{}.{}", millis, suffix, format.extension()),
        }
    }
}

fn random_suffix() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

/// Keep only ASCII alphanumerics; fall back to `bin`.
fn sanitize_extension(ext: &str) -> String {
    let cleaned: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if cleaned.is_empty() {
        "bin".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_follow_convention() {
        let names = TempNames::generate("MP4", OutputFormat::Aac);
        let parts: Vec<&str> = names.input.split(['_', '.']).collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "input");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_eq!(parts[3], "mp4");

        assert!(names.output.starts_with("output_"));
        assert!(names.output.ends_with(".m4a"));
    }

    #[test]
    fn sequential_names_do_not_collide() {
        let names: HashSet<String> = (0..200)
            .map(|_| TempNames::generate("mp4", OutputFormat::Mp3).input)
            .collect();
        assert_eq!(names.len(), 200);
    }

    #[test]
    fn hostile_extensions_are_cleaned() {
        let names = TempNames::generate("../x", OutputFormat::Wav);
        assert!(names.input.ends_with(".x"));
        assert!(!names.input.contains('/'));
        assert!(TempNames::generate("", OutputFormat::Wav).input.ends_with(".bin"));
    }
}
