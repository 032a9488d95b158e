//! Subtitle error types.

use std::path::PathBuf;

/// Errors that can occur during subtitle operations.
#[derive(Debug, thiserror::Error)]
pub enum SubtitleError {
    /// Failed to write subtitle file.
    #[error("Failed to write file '{}': {}", .path.display(), .source)]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
}
