//! Reelsmith Core - batch post-production for a single media file
//!
//! This crate contains the stage orchestrator, the two-pass loudness
//! correction engine and the boundary to external media tools. It has no
//! CLI dependencies.

pub mod config;
pub mod logging;
pub mod loudness;
pub mod orchestrator;
pub mod subtitles;
pub mod tool;
pub mod transcribe;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
