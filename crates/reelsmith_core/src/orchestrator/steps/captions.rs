//! Captions stage - transcribe speech and write an SRT file.
//!
//! The speech track is extracted to 16 kHz mono in a scratch directory,
//! handed to the [`Transcriber`], laid out into cues and written as
//! `<stem>_captions.srt`. With `burn_captions` the cues are also rendered
//! into a copy of the video.

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::{escape_filter_path, path_value, require_output, run_logged};
use crate::logging::JobLogger;
use crate::orchestrator::errors::{StageError, StageResult};
use crate::orchestrator::step::{PipelineStage, StageKind};
use crate::orchestrator::types::StageContext;
use crate::subtitles::{segments_to_cues, write_srt_file, CaptionLayout, RoundingMode};
use crate::tool::{timeouts, MediaTool, ToolInvocation, FFMPEG};
use crate::transcribe::{Transcriber, TranscriptionRequest};

/// Caption generation stage.
pub struct CaptionsStage {
    tool: Arc<dyn MediaTool>,
    transcriber: Arc<dyn Transcriber>,
    logger: Arc<JobLogger>,
}

impl CaptionsStage {
    pub fn new(
        tool: Arc<dyn MediaTool>,
        transcriber: Arc<dyn Transcriber>,
        logger: Arc<JobLogger>,
    ) -> Self {
        Self {
            tool,
            transcriber,
            logger,
        }
    }

    fn extract_speech(&self, input: &Path, audio: &Path) -> StageResult<()> {
        let invocation = ToolInvocation::new(FFMPEG, timeouts::AUDIO_EXTRACT)
            .args(["-y", "-hide_banner", "-nostats", "-i"])
            .path(input)
            .args(["-vn", "-ar", "16000", "-ac", "1", "-c:a", "pcm_s16le"])
            .path(audio);

        run_logged(self.tool.as_ref(), &self.logger, &invocation)?;
        require_output(audio)
    }

    fn burn(&self, input: &Path, srt: &Path, output: &Path, font_size: i64) -> StageResult<()> {
        let filter = format!(
            "subtitles='{}':force_style='FontSize={}'",
            escape_filter_path(srt),
            font_size
        );
        let invocation = ToolInvocation::new(FFMPEG, timeouts::ENCODE)
            .args(["-y", "-hide_banner", "-nostats", "-i"])
            .path(input)
            .args(["-vf", filter.as_str(), "-c:a", "copy"])
            .path(output);

        run_logged(self.tool.as_ref(), &self.logger, &invocation)?;
        require_output(output)
    }
}

impl PipelineStage for CaptionsStage {
    fn kind(&self) -> StageKind {
        StageKind::Captions
    }

    fn description(&self) -> &str {
        "Generate captions"
    }

    fn logger(&self) -> &JobLogger {
        &self.logger
    }

    fn execute(&self, ctx: &StageContext) -> StageResult<Map<String, Value>> {
        let agent = self.kind().agent_name();
        let stem = ctx.input_stem();

        let scratch = tempfile::Builder::new()
            .prefix("reelsmith_captions_")
            .tempdir()
            .map_err(|e| StageError::io("creating scratch directory", e))?;
        let speech = scratch.path().join(format!("{}_speech.wav", stem));
        self.extract_speech(ctx.input, &speech)?;
        ctx.report_progress(agent, 20, "Speech extracted");

        let request = TranscriptionRequest {
            model: ctx.config.string("whisper_model", "base"),
            language: ctx.config.string("language", "en"),
        };
        self.logger.info(&format!(
            "Transcribing with model '{}' ({})",
            request.model, request.language
        ));
        let segments = self.transcriber.transcribe(&speech, &request)?;
        ctx.report_progress(agent, 70, "Transcribed");

        let layout = CaptionLayout {
            max_words: ctx.config.integer("max_words_per_line", 10).max(1) as usize,
            max_chars: ctx.config.integer("max_chars_per_line", 42).max(1) as usize,
        };
        let cues = segments_to_cues(&segments, layout);
        if cues.is_empty() {
            self.logger.warn("Transcript is empty; writing an empty caption file");
        }

        let srt_path = ctx.output_dir.join(format!("{}_captions.srt", stem));
        write_srt_file(&cues, &srt_path, RoundingMode::Round)?;
        self.logger
            .info(&format!("Wrote {} caption(s) to {}", cues.len(), srt_path.display()));

        let word_count: usize = segments.iter().map(|s| s.word_count()).sum();
        let duration = segments.last().map(|s| s.end).unwrap_or(0.0);

        let mut payload = Map::new();
        payload.insert("srt_path".to_string(), path_value(&srt_path));
        payload.insert("entry_count".to_string(), Value::from(cues.len()));
        payload.insert("word_count".to_string(), Value::from(word_count));
        payload.insert("duration".to_string(), Value::from(duration));

        if ctx.config.bool("burn_captions", false) {
            ctx.report_progress(agent, 80, "Burning captions");
            let burned = ctx.output_dir.join(format!("{}_burned.mp4", stem));
            self.burn(ctx.input, &srt_path, &burned, ctx.config.integer("font_size", 24))?;
            payload.insert("burned_video_path".to_string(), path_value(&burned));
        }

        Ok(payload)
    }
}
