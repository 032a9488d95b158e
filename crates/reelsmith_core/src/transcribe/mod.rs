//! Speech-to-text boundary.
//!
//! The captions stage depends only on [`Transcriber`]; the model itself is
//! an external program.

mod types;
mod whisper;

use std::path::Path;

pub use types::{
    TranscriptSegment, TranscriptWord, TranscriptionError, TranscriptionRequest,
    TranscriptionResult,
};
pub use whisper::{parse_whisper_json, WhisperCli, WHISPER};

/// A speech-to-text backend.
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file into timed segments.
    fn transcribe(
        &self,
        audio: &Path,
        request: &TranscriptionRequest,
    ) -> TranscriptionResult<Vec<TranscriptSegment>>;

    /// Whether the backend can be invoked at all.
    fn is_available(&self) -> bool;
}
