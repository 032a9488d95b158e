//! Transcription request and result types.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tool::ToolError;

/// Errors from a speech-to-text backend.
#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Transcript not produced: {}", .0.display())]
    OutputMissing(PathBuf),

    #[error("Failed to parse transcript: {0}")]
    Parse(String),

    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl TranscriptionError {
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for transcription.
pub type TranscriptionResult<T> = Result<T, TranscriptionError>;

/// Model and language selection for one transcription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionRequest {
    /// Model name (`tiny`, `base`, `small`, ...).
    pub model: String,
    /// Spoken language code.
    pub language: String,
}

impl Default for TranscriptionRequest {
    fn default() -> Self {
        Self {
            model: "base".to_string(),
            language: "en".to_string(),
        }
    }
}

/// A word with its own timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub word: String,
    /// Seconds from the start of the audio.
    pub start: f64,
    pub end: f64,
}

/// A transcribed phrase. `words` is empty when the backend gave no word timings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Seconds from the start of the audio.
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default)]
    pub words: Vec<TranscriptWord>,
}

impl TranscriptSegment {
    /// Whitespace-separated word count of the segment text.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}
