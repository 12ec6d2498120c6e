//! Audex Core - audio extraction from video and audio files
//!
//! This crate holds the engine loader, the extraction pipeline and the
//! batch orchestrator with zero UI dependencies. The `audex` CLI is one
//! front end over it.
//!
//! Components, in dependency order:
//!
//! - [`engine`]: acquires the media engine from fallback sources
//! - [`extraction`]: turns one source file into an audio track
//! - [`jobs`] and [`storage`]: the job registry, blob store and history
//! - [`orchestrator`]: single-flight batch runs over pending jobs

pub mod config;
pub mod engine;
pub mod extraction;
pub mod jobs;
pub mod logging;
pub mod orchestrator;
pub mod storage;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
