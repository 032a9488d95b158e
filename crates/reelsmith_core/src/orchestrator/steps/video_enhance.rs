//! Video enhancement stage - color filters and re-encode.
//!
//! Uses the hardware encoder when requested and advertised by
//! `ffmpeg -encoders`, otherwise the software encoder at a fixed CRF. When
//! the processed-audio path is present in the section, that audio replaces
//! the original track.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};

use super::{escape_filter_path, path_value, require_output, run_logged};
use crate::config::StageConfig;
use crate::logging::JobLogger;
use crate::orchestrator::errors::StageResult;
use crate::orchestrator::step::{PipelineStage, StageKind};
use crate::orchestrator::types::StageContext;
use crate::tool::{timeouts, MediaTool, ToolInvocation, FFMPEG};

/// LUT file extensions `lut3d` can read.
const LUT_EXTENSIONS: &[&str] = &["cube", "3dl", "dat", "m3d", "csp"];

/// Section key carrying the processed audio from the audio stage.
pub const EXTERNAL_AUDIO_KEY: &str = "external_audio_path";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Encoder {
    Hardware { name: String, bitrate: String },
    Software { name: String, crf: i64 },
}

impl Encoder {
    fn name(&self) -> &str {
        match self {
            Encoder::Hardware { name, .. } | Encoder::Software { name, .. } => name,
        }
    }

    fn args(&self) -> Vec<String> {
        match self {
            Encoder::Hardware { name, bitrate } => {
                vec!["-c:v".into(), name.clone(), "-b:v".into(), bitrate.clone()]
            }
            Encoder::Software { name, crf } => vec![
                "-c:v".into(),
                name.clone(),
                "-preset".into(),
                "fast".into(),
                "-crf".into(),
                crf.to_string(),
            ],
        }
    }
}

/// Video filters from the `[video]` section, plus whether a LUT was applied.
struct FilterPlan {
    filters: Vec<String>,
    lut_applied: bool,
}

/// Video enhancement stage.
pub struct VideoEnhanceStage {
    tool: Arc<dyn MediaTool>,
    logger: Arc<JobLogger>,
}

impl VideoEnhanceStage {
    pub fn new(tool: Arc<dyn MediaTool>, logger: Arc<JobLogger>) -> Self {
        Self { tool, logger }
    }

    /// Whether `ffmpeg -encoders` lists `name`.
    fn encoder_available(&self, name: &str) -> bool {
        let probe = ToolInvocation::new(FFMPEG, timeouts::CAPABILITY).args(["-hide_banner", "-encoders"]);
        match self.tool.run(&probe) {
            Ok(output) if output.success() => output
                .stdout
                .lines()
                .any(|line| line.split_whitespace().nth(1) == Some(name)),
            Ok(output) => {
                self.logger
                    .debug(&format!("Encoder listing failed: {}", output.stderr_summary()));
                false
            }
            Err(e) => {
                self.logger.debug(&format!("Encoder listing failed: {}", e));
                false
            }
        }
    }

    fn select_encoder(&self, config: &StageConfig) -> Encoder {
        let software = Encoder::Software {
            name: config.string("software_encoder", "libx264"),
            crf: config.integer("crf", 18),
        };
        if !config.bool("hardware_acceleration", true) {
            return software;
        }

        let name = config.string("hardware_encoder", "h264_videotoolbox");
        if self.encoder_available(&name) {
            Encoder::Hardware {
                name,
                bitrate: config.string("hardware_bitrate", "10M"),
            }
        } else {
            self.logger
                .info(&format!("Hardware encoder {} not available, using software", name));
            software
        }
    }

    fn plan_filters(&self, config: &StageConfig) -> FilterPlan {
        let mut filters = Vec::new();
        let mut lut_applied = false;

        if let Some(lut) = config.optional_string("lut_path").map(PathBuf::from) {
            let supported = lut
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .is_some_and(|e| LUT_EXTENSIONS.contains(&e.as_str()));
            if !lut.is_file() {
                self.logger.warn(&format!("LUT not found: {}", lut.display()));
            } else if !supported {
                self.logger
                    .warn(&format!("Unsupported LUT format: {}", lut.display()));
            } else {
                filters.push(format!("lut3d=file='{}'", escape_filter_path(&lut)));
                lut_applied = true;
            }
        }

        let brightness = config.float("brightness", 0.0);
        let contrast = config.float("contrast", 1.0);
        let saturation = config.float("saturation", 1.0);
        if brightness != 0.0 || contrast != 1.0 || saturation != 1.0 {
            filters.push(format!(
                "eq=brightness={}:contrast={}:saturation={}",
                brightness, contrast, saturation
            ));
        }

        if config.bool("denoise", false) {
            filters.push("hqdn3d".to_string());
        }

        if config.bool("upscale", false) {
            self.logger.warn("Upscaling is not implemented; keeping source resolution");
        }

        FilterPlan {
            filters,
            lut_applied,
        }
    }

    fn external_audio(&self, config: &StageConfig) -> Option<PathBuf> {
        let path = PathBuf::from(config.optional_string(EXTERNAL_AUDIO_KEY)?);
        if path.is_file() {
            Some(path)
        } else {
            self.logger.warn(&format!(
                "Processed audio missing, keeping original track: {}",
                path.display()
            ));
            None
        }
    }
}

fn encode_invocation(
    input: &Path,
    external_audio: Option<&Path>,
    plan: &FilterPlan,
    encoder: &Encoder,
    output: &Path,
) -> ToolInvocation {
    let mut invocation = ToolInvocation::new(FFMPEG, timeouts::ENCODE)
        .args(["-y", "-hide_banner", "-nostats", "-i"])
        .path(input);

    if let Some(audio) = external_audio {
        invocation = invocation.arg("-i").path(audio);
    }
    if !plan.filters.is_empty() {
        invocation = invocation.arg("-vf").arg(plan.filters.join(","));
    }
    invocation = match external_audio {
        Some(_) => invocation.args(["-map", "0:v:0", "-map", "1:a:0"]),
        None => invocation.args(["-map", "0:v", "-map", "0:a?"]),
    };

    invocation
        .args(encoder.args())
        .args(["-c:a", "aac", "-b:a", "192k", "-movflags", "+faststart"])
        .path(output)
}

impl PipelineStage for VideoEnhanceStage {
    fn kind(&self) -> StageKind {
        StageKind::VideoEnhance
    }

    fn description(&self) -> &str {
        "Enhance and re-encode video"
    }

    fn logger(&self) -> &JobLogger {
        &self.logger
    }

    fn execute(&self, ctx: &StageContext) -> StageResult<Map<String, Value>> {
        let agent = self.kind().agent_name();
        let encoder = self.select_encoder(ctx.config);
        let plan = self.plan_filters(ctx.config);
        let external_audio = self.external_audio(ctx.config);
        if let Some(ref audio) = external_audio {
            self.logger
                .info(&format!("Using processed audio: {}", audio.display()));
        }
        ctx.report_progress(agent, 10, &format!("Encoding with {}", encoder.name()));

        let output = ctx
            .output_dir
            .join(format!("{}_enhanced.mp4", ctx.input_stem()));
        let invocation =
            encode_invocation(ctx.input, external_audio.as_deref(), &plan, &encoder, &output);

        let started = Instant::now();
        run_logged(self.tool.as_ref(), &self.logger, &invocation)?;
        let encoding_time = started.elapsed().as_secs_f64();
        require_output(&output)?;

        let mut payload = Map::new();
        payload.insert("output_path".to_string(), path_value(&output));
        payload.insert("encoding_time".to_string(), Value::from(encoding_time));
        payload.insert("encoder_used".to_string(), Value::from(encoder.name()));
        payload.insert("lut_applied".to_string(), Value::from(plan.lut_applied));
        payload.insert(
            "external_audio".to_string(),
            external_audio.as_deref().map(path_value).unwrap_or(Value::Null),
        );
        Ok(payload)
    }
}
