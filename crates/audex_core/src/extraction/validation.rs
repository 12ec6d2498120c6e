//! Pre-flight checks run before any engine interaction.

use crate::engine::EngineState;

use super::errors::ValidationError;
use super::types::SourceFile;

/// Declared media types accepted as input.
pub const SUPPORTED_MEDIA_TYPES: &[&str] = &[
    "video/mp4",
    "video/webm",
    "video/quicktime",
    "video/x-msvideo",
    "video/x-matroska",
    "video/ogg",
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/x-wav",
    "audio/wave",
    "audio/ogg",
    "audio/flac",
    "audio/aac",
    "audio/mp4",
    "audio/x-m4a",
    "audio/webm",
];

/// Extensions accepted when the declared type is missing or generic.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp4", "webm", "mov", "avi", "mkv", "m4v", "ogv", "mp3", "wav", "ogg", "flac", "aac", "m4a",
];

/// Declared types that say nothing about the content.
const GENERIC_MEDIA_TYPES: &[&str] = &["", "application/octet-stream"];

/// Validate a source against the engine state and pipeline limits.
pub fn validate_source(
    source: &SourceFile,
    engine_state: EngineState,
    max_file_size: u64,
) -> Result<(), ValidationError> {
    if engine_state != EngineState::Ready {
        return Err(ValidationError::EngineNotReady {
            state: engine_state,
        });
    }

    let size = source.size();
    if size > max_file_size {
        return Err(ValidationError::FileTooLarge {
            size,
            limit: max_file_size,
        });
    }

    if !is_supported_type(source) {
        return Err(ValidationError::UnsupportedType {
            name: source.name.clone(),
            media_type: source.media_type.clone(),
        });
    }

    Ok(())
}

/// Declared type first; the extension only decides for generic types.
pub fn is_supported_type(source: &SourceFile) -> bool {
    let declared = normalize_media_type(&source.media_type);
    if !GENERIC_MEDIA_TYPES.contains(&declared.as_str()) {
        return SUPPORTED_MEDIA_TYPES.contains(&declared.as_str());
    }
    source
        .extension()
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Lowercase and drop parameters such as `; codecs=...`.
fn normalize_media_type(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Guess a media type from a file name, for callers that have none.
pub fn media_type_for_name(name: &str) -> &'static str {
    let ext = std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        Some("ogv") => "video/ogg",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("aac") => "audio/aac",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: u64 = 100 * 1024 * 1024;

    fn file(name: &str, media_type: &str, size: usize) -> SourceFile {
        SourceFile::new(name, media_type, vec![0u8; size])
    }

    #[test]
    fn engine_must_be_ready() {
        let err = validate_source(&file("a.mp4", "video/mp4", 1), EngineState::Loading, LIMIT)
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::EngineNotReady {
                state: EngineState::Loading
            }
        );
    }

    #[test]
    fn size_limit_is_inclusive() {
        let at_limit = SourceFile::new("a.mp4", "video/mp4", vec![0u8; 1024]);
        assert!(validate_source(&at_limit, EngineState::Ready, 1024).is_ok());

        let over = SourceFile::new("a.mp4", "video/mp4", vec![0u8; 1025]);
        assert!(matches!(
            validate_source(&over, EngineState::Ready, 1024),
            Err(ValidationError::FileTooLarge { size: 1025, limit: 1024 })
        ));
    }

    #[test]
    fn declared_type_takes_precedence_over_extension() {
        // Specific but unsupported declared type wins over a good extension.
        assert!(!is_supported_type(&file("movie.mp4", "image/png", 1)));
        // Supported declared type wins over a bad extension.
        assert!(is_supported_type(&file("movie.bin", "video/mp4", 1)));
        assert!(is_supported_type(&file("x", "Audio/MPEG; charset=binary", 1)));
    }

    #[test]
    fn extension_is_fallback_for_generic_types() {
        assert!(is_supported_type(&file("movie.MKV", "", 1)));
        assert!(is_supported_type(&file("song.flac", "application/octet-stream", 1)));
        assert!(!is_supported_type(&file("notes.txt", "", 1)));
        assert!(!is_supported_type(&file("noext", "", 1)));
    }

    #[test]
    fn guesses_media_types() {
        assert_eq!(media_type_for_name("clip.MOV"), "video/quicktime");
        assert_eq!(media_type_for_name("song.m4a"), "audio/mp4");
        assert_eq!(media_type_for_name("unknown"), "application/octet-stream");
    }
}
