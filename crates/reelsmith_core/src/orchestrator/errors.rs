//! Error types for the orchestrator.
//!
//! Only [`PipelineError`] escapes `process()`. Every [`StageError`] is
//! caught at the stage boundary and recorded in a failed report.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ConfigError;
use crate::loudness::LoudnessError;
use crate::subtitles::SubtitleError;
use crate::tool::ToolError;
use crate::transcribe::TranscriptionError;

/// Fatal errors that abort a run before any stage executes.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input path does not name an existing regular file.
    #[error("Input not found: {}", .path.display())]
    InputNotFound { path: PathBuf },

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The output directory could not be prepared.
    #[error("Setup failed for {}: {message}", .path.display())]
    Setup { path: PathBuf, message: String },
}

impl PipelineError {
    pub fn input_not_found(path: &Path) -> Self {
        Self::InputNotFound {
            path: path.to_path_buf(),
        }
    }

    pub fn setup(path: &Path, message: impl Into<String>) -> Self {
        Self::Setup {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// Stage-local failure.
#[derive(Error, Debug)]
pub enum StageError {
    /// An external tool exited non-zero or could not be started.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    ToolInvocation {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// An external tool exceeded its time budget.
    #[error("{tool} timed out after {timeout_secs}s")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    /// Tool diagnostics had no usable measurement.
    #[error("Could not parse loudness measurement: {0}")]
    MeasurementParse(String),

    /// The tool reported success but the artifact is missing.
    #[error("Expected output was not produced: {}", .path.display())]
    OutputNotProduced { path: PathBuf },

    /// The stage input is missing or unusable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// Speech-to-text failed for a reason other than the tool itself.
    #[error("Transcription failed: {0}")]
    Transcription(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl StageError {
    pub fn tool_invocation(
        tool: impl Into<String>,
        exit_code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self::ToolInvocation {
            tool: tool.into(),
            exit_code,
            message: message.into(),
        }
    }

    pub fn output_not_produced(path: &Path) -> Self {
        Self::OutputNotProduced {
            path: path.to_path_buf(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<ToolError> for StageError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Failed {
                tool,
                exit_code,
                message,
            } => Self::ToolInvocation {
                tool,
                exit_code,
                message,
            },
            ToolError::Spawn { tool, message } => Self::ToolInvocation {
                tool,
                exit_code: -1,
                message: format!("could not start: {}", message),
            },
            ToolError::Timeout { tool, timeout_secs } => Self::ToolTimeout { tool, timeout_secs },
            ToolError::Runtime(message) => Self::Other(message),
        }
    }
}

impl From<LoudnessError> for StageError {
    fn from(err: LoudnessError) -> Self {
        match err {
            LoudnessError::Tool(e) => e.into(),
            LoudnessError::MeasurementParse(message) => Self::MeasurementParse(message),
            LoudnessError::OutputNotProduced(path) => Self::OutputNotProduced { path },
        }
    }
}

impl From<TranscriptionError> for StageError {
    fn from(err: TranscriptionError) -> Self {
        match err {
            TranscriptionError::Tool(e) => e.into(),
            TranscriptionError::OutputMissing(path) => Self::OutputNotProduced { path },
            TranscriptionError::Io { operation, source } => Self::Io { operation, source },
            other => Self::Transcription(other.to_string()),
        }
    }
}

impl From<SubtitleError> for StageError {
    fn from(err: SubtitleError) -> Self {
        match err {
            SubtitleError::WriteError { path, source } => {
                Self::io(format!("writing {}", path.display()), source)
            }
        }
    }
}

/// Result type for stage operations.
pub type StageResult<T> = Result<T, StageError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn stage_error_displays_context() {
        let err = StageError::tool_invocation("ffmpeg", 2, "Invalid argument");
        let msg = err.to_string();
        assert!(msg.contains("ffmpeg"));
        assert!(msg.contains("exit code 2"));
        assert!(msg.contains("Invalid argument"));
    }

    #[test]
    fn tool_errors_map_to_taxonomy() {
        let timeout: StageError = ToolError::timeout("ffprobe", Duration::from_secs(30)).into();
        assert!(matches!(timeout, StageError::ToolTimeout { timeout_secs: 30, .. }));

        let spawn: StageError = ToolError::spawn("whisper", "No such file").into();
        assert!(matches!(spawn, StageError::ToolInvocation { exit_code: -1, .. }));
    }

    #[test]
    fn loudness_errors_map_to_taxonomy() {
        let parse: StageError = LoudnessError::MeasurementParse("no block".into()).into();
        assert!(matches!(parse, StageError::MeasurementParse(_)));

        let nested: StageError =
            LoudnessError::Tool(ToolError::failed("ffmpeg", 1, "boom")).into();
        assert!(matches!(nested, StageError::ToolInvocation { exit_code: 1, .. }));
    }

    #[test]
    fn pipeline_error_names_path() {
        let err = PipelineError::input_not_found(Path::new("/media/missing.mp4"));
        assert!(err.to_string().contains("/media/missing.mp4"));
    }
}
