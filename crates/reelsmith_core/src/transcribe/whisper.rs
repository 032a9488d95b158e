//! Whisper command-line backend.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::types::{TranscriptSegment, TranscriptionError, TranscriptionRequest, TranscriptionResult};
use super::Transcriber;
use crate::tool::{timeouts, MediaTool, ToolInvocation};

/// Default program name.
pub const WHISPER: &str = "whisper";

#[derive(Deserialize)]
struct WhisperDocument {
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
}

/// Runs the `whisper` CLI through the media tool and reads its JSON output.
///
/// Output is written to a scratch directory that is removed afterwards.
#[derive(Clone)]
pub struct WhisperCli {
    tool: Arc<dyn MediaTool>,
    program: String,
    timeout: Duration,
}

impl WhisperCli {
    pub fn new(tool: Arc<dyn MediaTool>) -> Self {
        Self {
            tool,
            program: WHISPER.to_string(),
            timeout: timeouts::TRANSCRIPTION,
        }
    }

    /// Use a different executable (e.g. a venv path).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn invocation(&self, audio: &Path, request: &TranscriptionRequest, out_dir: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.program, self.timeout)
            .path(audio)
            .args(["--model", request.model.as_str()])
            .args(["--language", request.language.as_str()])
            .args(["--word_timestamps", "True"])
            .args(["--output_format", "json"])
            .arg("--output_dir")
            .path(out_dir)
    }
}

impl Transcriber for WhisperCli {
    fn transcribe(
        &self,
        audio: &Path,
        request: &TranscriptionRequest,
    ) -> TranscriptionResult<Vec<TranscriptSegment>> {
        let scratch = tempfile::Builder::new()
            .prefix("reelsmith_whisper_")
            .tempdir()
            .map_err(|e| TranscriptionError::io("creating transcript directory", e))?;

        let invocation = self.invocation(audio, request, scratch.path());
        tracing::debug!("{}", invocation.command_line());
        self.tool.run_checked(&invocation)?;

        let stem = audio
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let transcript = scratch.path().join(format!("{}.json", stem));
        if !transcript.is_file() {
            return Err(TranscriptionError::OutputMissing(transcript));
        }

        let content = fs::read_to_string(&transcript)
            .map_err(|e| TranscriptionError::io("reading transcript", e))?;
        parse_whisper_json(&content)
    }

    fn is_available(&self) -> bool {
        let probe = ToolInvocation::new(&self.program, timeouts::CAPABILITY).arg("--help");
        matches!(self.tool.run(&probe), Ok(output) if output.success())
    }
}

/// Parse whisper's JSON output into segments.
pub fn parse_whisper_json(content: &str) -> TranscriptionResult<Vec<TranscriptSegment>> {
    let doc: WhisperDocument =
        serde_json::from_str(content).map_err(|e| TranscriptionError::Parse(e.to_string()))?;
    Ok(doc.segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::testing::ScriptedTool;

    #[test]
    fn parses_segments_and_words() {
        let json = r#"{"text":" Hi there.","segments":[
            {"id":0,"seek":0,"start":0.0,"end":1.2,"text":" Hi there.",
             "words":[{"word":" Hi","start":0.0,"end":0.4,"probability":0.9},
                      {"word":" there.","start":0.4,"end":1.2,"probability":0.8}]}]}"#;
        let segments = parse_whisper_json(json).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].words.len(), 2);
        assert_eq!(segments[0].words[1].word, " there.");
        assert_eq!(segments[0].word_count(), 2);
    }

    #[test]
    fn missing_words_default_to_empty() {
        let json = r#"{"segments":[{"start":1.0,"end":2.0,"text":"plain"}]}"#;
        let segments = parse_whisper_json(json).unwrap();
        assert!(segments[0].words.is_empty());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_whisper_json("not json"),
            Err(TranscriptionError::Parse(_))
        ));
    }

    #[test]
    fn transcribes_through_media_tool() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("speech.wav");
        fs::write(&audio, "pcm").unwrap();

        let tool = Arc::new(ScriptedTool::new());
        let whisper = WhisperCli::new(tool.clone());
        let request = TranscriptionRequest {
            model: "tiny".to_string(),
            language: "en".to_string(),
        };
        let segments = whisper.transcribe(&audio, &request).unwrap();

        assert_eq!(segments.len(), 2);
        let call = &tool.calls()[0];
        assert_eq!(call.program, "whisper");
        assert_eq!(call.value_of("--model"), Some("tiny"));
        assert_eq!(call.value_of("--output_format"), Some("json"));
        assert_eq!(call.timeout, timeouts::TRANSCRIPTION);
        assert!(whisper.is_available());
    }

    #[test]
    fn missing_transcript_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("speech.wav");
        fs::write(&audio, "pcm").unwrap();

        let tool = Arc::new(ScriptedTool::new().withhold_output_when("whisper", "--model"));
        let err = WhisperCli::new(tool)
            .transcribe(&audio, &TranscriptionRequest::default())
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::OutputMissing(_)));
    }

    #[test]
    fn unavailable_program_is_detected() {
        let tool = Arc::new(ScriptedTool::new());
        let whisper = WhisperCli::new(tool).with_program("whisper-missing");
        assert!(!whisper.is_available());
    }
}
