//! Audio extraction pipeline.
//!
//! Converts one source file into an audio track on the shared engine:
//!
//! 1. **Validate** the engine state, file size and file type (no engine I/O)
//! 2. **Stage** the source under a collision-free temporary name and verify
//!    the written length
//! 3. **Run** the codec command built from the (format, quality) table while
//!    a [`ProgressEstimator`] blends engine and synthetic progress
//! 4. **Collect** the output, rejecting empty results
//! 5. **Clean up** both temporary files, logging failures as warnings
//!
//! # Codec table
//!
//! ```text
//! format  codec        high     medium   low
//! mp3     libmp3lame   320k     192k     128k
//! wav     pcm_s16le    48000Hz  44100Hz  22050Hz
//! aac     aac          256k     128k     96k
//! ```

mod command;
mod errors;
mod names;
mod pipeline;
mod progress;
mod types;
mod validation;

pub use command::{build_command, CodecParams};
pub use errors::{
    classify_execution_error, CleanupWarning, ExecutionErrorKind, ExtractionError,
    ExtractionResult, ValidationError,
};
pub use names::TempNames;
pub use pipeline::Extractor;
pub use progress::ProgressEstimator;
pub use types::{
    BinaryResource, ExtractionConfig, OutputFormat, ProgressCallback, ProgressKind, Quality,
    SourceFile, DEFAULT_MAX_FILE_SIZE,
};
pub use validation::{
    is_supported_type, media_type_for_name, validate_source, SUPPORTED_EXTENSIONS,
    SUPPORTED_MEDIA_TYPES,
};
