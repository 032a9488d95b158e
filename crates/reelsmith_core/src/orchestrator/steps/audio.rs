//! Audio stage - speech cleanup filters followed by two-pass loudness correction.
//!
//! ```text
//! input ─▶ highpass/lowpass/presence EQ/compressor ─▶ 48k stereo WAV (scratch)
//!       ─▶ LoudnessNormalizer::correct ─▶ <stem>_audio_normalized.wav
//!       ─▶ re-measure and compare against the target
//! ```
//!
//! The normalized WAV path is reported as `output_path`; the orchestrator
//! hands it to the video stage.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::{path_value, require_output, run_logged};
use crate::config::StageConfig;
use crate::logging::JobLogger;
use crate::loudness::{CorrectionTarget, LoudnessNormalizer, PeakMode};
use crate::orchestrator::errors::{StageError, StageResult};
use crate::orchestrator::step::{PipelineStage, StageKind};
use crate::orchestrator::types::StageContext;
use crate::tool::{timeouts, MediaTool, ToolInvocation, FFMPEG};

/// Sample rate of the prepared intermediate.
const PREPARED_SAMPLE_RATE: &str = "48000";

/// Audio processing stage.
pub struct AudioStage {
    tool: Arc<dyn MediaTool>,
    logger: Arc<JobLogger>,
}

impl AudioStage {
    pub fn new(tool: Arc<dyn MediaTool>, logger: Arc<JobLogger>) -> Self {
        Self { tool, logger }
    }

    fn prepare(&self, input: &Path, prepared: &Path, config: &StageConfig) -> StageResult<()> {
        let chain = filter_chain(config);
        let invocation = ToolInvocation::new(FFMPEG, timeouts::AUDIO_RENDER)
            .args(["-y", "-hide_banner", "-nostats", "-i"])
            .path(input)
            .args(["-vn", "-af", chain.as_str()])
            .args(["-ar", PREPARED_SAMPLE_RATE, "-ac", "2", "-c:a", "pcm_s16le"])
            .path(prepared);

        run_logged(self.tool.as_ref(), &self.logger, &invocation)?;
        require_output(prepared)
    }
}

/// Speech cleanup filter chain from the `[audio]` section.
pub(crate) fn filter_chain(config: &StageConfig) -> String {
    let highpass = config.integer("highpass_hz", 80);
    let lowpass = config.integer("lowpass_hz", 12000);
    let presence_hz = config.integer("presence_boost_hz", 3000);
    let presence_db = config.float("presence_boost_db", 2.0);
    let threshold = config.float("compression_threshold_db", -20.0);
    let ratio = config.float("compression_ratio", 3.0);

    [
        format!("highpass=f={}", highpass),
        format!("lowpass=f={}", lowpass),
        format!("equalizer=f={}:t=q:w=1.5:g={}", presence_hz, presence_db),
        format!(
            "acompressor=threshold={}dB:ratio={}:attack=5:release=50",
            threshold, ratio
        ),
    ]
    .join(",")
}

impl PipelineStage for AudioStage {
    fn kind(&self) -> StageKind {
        StageKind::Audio
    }

    fn description(&self) -> &str {
        "Clean up and normalize audio"
    }

    fn logger(&self) -> &JobLogger {
        &self.logger
    }

    fn execute(&self, ctx: &StageContext) -> StageResult<Map<String, Value>> {
        let agent = self.kind().agent_name();
        let stem = ctx.input_stem();

        let scratch = tempfile::Builder::new()
            .prefix("reelsmith_audio_")
            .tempdir()
            .map_err(|e| StageError::io("creating scratch directory", e))?;
        let prepared = scratch.path().join(format!("{}_audio_prepared.wav", stem));

        self.logger.section("Filter chain");
        self.prepare(ctx.input, &prepared, ctx.config)?;
        ctx.report_progress(agent, 30, "Filters applied");

        let target_lufs = ctx.config.float("target_loudness_lufs", -16.0);
        let peak_mode = PeakMode::from_config(
            &ctx.config.string("peak_mode", "auto"),
            ctx.config.float("true_peak_db", -1.0),
        );
        let target = CorrectionTarget::new(target_lufs, peak_mode, ctx.config.bool("dual_mono", false));
        let tolerance = ctx.config.float("tolerance_lu", 0.5);

        self.logger.section("Loudness correction");
        self.logger.info(&format!(
            "Target: {:.1} LUFS, true peak {:.1} dBTP",
            target.target_lufs, target.target_true_peak_db
        ));
        let output = ctx.output_dir.join(format!("{}_audio_normalized.wav", stem));
        let normalizer =
            LoudnessNormalizer::new(Arc::clone(&self.tool)).with_logger(Arc::clone(&self.logger));
        let pre = normalizer.correct(&prepared, &output, &target)?;
        self.logger.info(&format!(
            "Measured {:.2} LUFS, {:.2} dBTP, LRA {:.2} LU",
            pre.integrated_lufs, pre.true_peak_db, pre.loudness_range_lu
        ));
        ctx.report_progress(agent, 80, "Loudness corrected");

        self.logger.section("Verification");
        let post = normalizer.meter().measure(&output)?;
        let within_tolerance = post.within(target_lufs, tolerance);
        if within_tolerance {
            self.logger.info(&format!(
                "Output at {:.2} LUFS (target {:.1})",
                post.integrated_lufs, target_lufs
            ));
        } else {
            self.logger.warn(&format!(
                "Output at {:.2} LUFS is outside {:.1} LU of target {:.1}",
                post.integrated_lufs, tolerance, target_lufs
            ));
        }

        let mut payload = Map::new();
        payload.insert("output_path".to_string(), path_value(&output));
        payload.insert(
            "loudness_stats".to_string(),
            json!({
                "pre": pre,
                "post": post,
                "target_lufs": target.target_lufs,
                "target_true_peak_db": target.target_true_peak_db,
                "within_tolerance": within_tolerance,
            }),
        );
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::logging::LogConfig;
    use crate::tool::testing::{read_fake_lufs, ScriptedTool};
    use std::fs;

    fn stage(tool: Arc<ScriptedTool>, dir: &Path) -> AudioStage {
        let logger = JobLogger::new("audio", dir.join("logs"), LogConfig::default(), None).unwrap();
        AudioStage::new(tool, Arc::new(logger))
    }

    #[test]
    fn default_filter_chain() {
        let config = PipelineConfig::default().section("audio");
        assert_eq!(
            filter_chain(&config),
            "highpass=f=80,lowpass=f=12000,equalizer=f=3000:t=q:w=1.5:g=2,\
             acompressor=threshold=-20dB:ratio=3:attack=5:release=50"
        );
    }

    #[test]
    fn normalizes_to_target() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("interview.mp4");
        fs::write(&input, "-27.5").unwrap();
        let tool = Arc::new(ScriptedTool::new());
        let config = PipelineConfig::default().section("audio");
        let ctx = StageContext::new(&input, dir.path(), &config);

        let report = stage(tool.clone(), dir.path()).run(&ctx);
        assert!(report.success, "{:?}", report.error);

        let output = report.payload_path("output_path").unwrap();
        assert_eq!(output, dir.path().join("interview_audio_normalized.wav"));
        assert!((read_fake_lufs(&output) + 16.0).abs() <= 0.5);

        let stats = &report.payload["loudness_stats"];
        assert_eq!(stats["pre"]["integrated_lufs"], json!(-27.5));
        assert_eq!(stats["target_true_peak_db"], json!(-2.0));
        assert_eq!(stats["within_tolerance"], json!(true));

        // filters, analysis, correction, verification
        assert_eq!(tool.call_count(), 4);
        let first = &tool.calls()[0];
        assert_eq!(first.value_of("-ar"), Some("48000"));
        assert_eq!(first.value_of("-ac"), Some("2"));
    }

    #[test]
    fn filter_failure_stops_before_correction() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("interview.mp4");
        fs::write(&input, "-20").unwrap();
        let tool = Arc::new(ScriptedTool::new().fail_when("ffmpeg", "highpass"));
        let config = PipelineConfig::default().section("audio");
        let ctx = StageContext::new(&input, dir.path(), &config);

        let report = stage(tool.clone(), dir.path()).run(&ctx);
        assert!(!report.success);
        assert!(report.error.unwrap().starts_with("AudioProcessor failed:"));
        assert_eq!(tool.call_count(), 1);
    }

    #[test]
    fn analysis_timeout_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("interview.mp4");
        fs::write(&input, "-20").unwrap();
        let tool = Arc::new(ScriptedTool::new().time_out_when("ffmpeg", "print_format=json"));
        let config = PipelineConfig::default().section("audio");
        let ctx = StageContext::new(&input, dir.path(), &config);

        let report = stage(tool, dir.path()).run(&ctx);
        assert!(!report.success);
        assert!(report.error.unwrap().contains("timed out after 600s"));
    }

    #[test]
    fn fixed_peak_mode_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("interview.mp4");
        fs::write(&input, "-20").unwrap();
        let tool = Arc::new(ScriptedTool::new());
        let config = PipelineConfig::default()
            .section("audio")
            .with("peak_mode", "fixed")
            .with("true_peak_db", -3.0);
        let ctx = StageContext::new(&input, dir.path(), &config);

        let report = stage(tool.clone(), dir.path()).run(&ctx);
        assert!(report.success);
        assert_eq!(report.payload["loudness_stats"]["target_true_peak_db"], json!(-3.0));
        assert_eq!(tool.calls_mentioning("TP=-3.00").len(), 1);
    }
}
