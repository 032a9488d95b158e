//! Thumbnail stage - evenly spaced frame grabs from the original input.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::{path_value, run_logged};
use crate::config::StageConfig;
use crate::logging::JobLogger;
use crate::orchestrator::errors::{StageError, StageResult};
use crate::orchestrator::step::{PipelineStage, StageKind};
use crate::orchestrator::types::StageContext;
use crate::tool::{timeouts, MediaTool, ToolInvocation, FFMPEG, FFPROBE};

/// Fraction of the duration skipped at each end.
const EDGE_MARGIN: f64 = 0.05;

/// Most thumbnails one run may request.
const MAX_COUNT: i64 = 1000;

/// Largest accepted thumbnail width or height, in pixels.
const MAX_DIMENSION: i64 = 8192;

/// Read an integer key that must lie in `min..=max`.
fn bounded(config: &StageConfig, key: &str, default: i64, min: i64, max: i64) -> StageResult<i64> {
    let value = config.integer(key, default);
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(StageError::invalid_input(format!(
            "thumbnails.{} must be between {} and {} (got {})",
            key, min, max, value
        )))
    }
}

/// Timestamps (seconds) for `count` thumbnails over `duration`.
///
/// One thumbnail sits at the midpoint. More are spread evenly between a 5%
/// margin at each end. Values are rounded to 0.01 s.
pub fn thumbnail_timestamps(duration: f64, count: usize) -> Vec<f64> {
    let round = |t: f64| (t * 100.0).round() / 100.0;
    match count {
        0 => Vec::new(),
        1 => vec![round(duration / 2.0)],
        _ => {
            let margin = duration * EDGE_MARGIN;
            let interval = (duration - 2.0 * margin) / (count - 1) as f64;
            (0..count)
                .map(|i| round(margin + i as f64 * interval))
                .collect()
        }
    }
}

/// Output image format and its encoder arguments.
#[derive(Debug, Clone, PartialEq)]
struct ImageFormat {
    extension: &'static str,
    args: Vec<String>,
}

impl ImageFormat {
    fn from_config(config: &StageConfig) -> Self {
        let quality = config.integer("quality", 95).clamp(0, 100);
        match config.string("format", "jpg").to_lowercase().as_str() {
            "png" => Self {
                extension: "png",
                args: Vec::new(),
            },
            "webp" => Self {
                extension: "webp",
                args: vec!["-quality".into(), quality.to_string()],
            },
            _ => {
                let qscale = ((31.0 - quality as f64 / 100.0 * 30.0) as i64).max(1);
                Self {
                    extension: "jpg",
                    args: vec!["-qscale:v".into(), qscale.to_string()],
                }
            }
        }
    }
}

/// Thumbnail generation stage.
pub struct ThumbnailsStage {
    tool: Arc<dyn MediaTool>,
    logger: Arc<JobLogger>,
}

impl ThumbnailsStage {
    pub fn new(tool: Arc<dyn MediaTool>, logger: Arc<JobLogger>) -> Self {
        Self { tool, logger }
    }

    fn probe_duration(&self, input: &Path) -> StageResult<f64> {
        let invocation = ToolInvocation::new(FFPROBE, timeouts::PROBE)
            .args(["-v", "error", "-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .path(input);

        let output = run_logged(self.tool.as_ref(), &self.logger, &invocation)?;
        let raw = output.stdout.trim();
        match raw.parse::<f64>() {
            Ok(duration) if duration.is_finite() && duration > 0.0 => Ok(duration),
            _ => Err(StageError::invalid_input(format!(
                "could not read duration of {} (got '{}')",
                input.display(),
                raw
            ))),
        }
    }

    fn grab_frame(
        &self,
        input: &Path,
        timestamp: f64,
        output: &Path,
        (width, height): (i64, i64),
        format: &ImageFormat,
    ) -> StageResult<()> {
        let scale = format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
            w = width,
            h = height
        );
        let invocation = ToolInvocation::new(FFMPEG, timeouts::FRAME_GRAB)
            .args(["-y", "-hide_banner", "-nostats"])
            .args(["-ss", format!("{:.2}", timestamp).as_str(), "-i"])
            .path(input)
            .args(["-frames:v", "1", "-vf", scale.as_str()])
            .args(format.args.iter())
            .path(output);

        run_logged(self.tool.as_ref(), &self.logger, &invocation)?;
        super::require_output(output)
    }
}

impl PipelineStage for ThumbnailsStage {
    fn kind(&self) -> StageKind {
        StageKind::Thumbnails
    }

    fn description(&self) -> &str {
        "Extract thumbnails"
    }

    fn logger(&self) -> &JobLogger {
        &self.logger
    }

    fn execute(&self, ctx: &StageContext) -> StageResult<Map<String, Value>> {
        let agent = self.kind().agent_name();
        let count = bounded(ctx.config, "count", 6, 0, MAX_COUNT)? as usize;
        let size = (
            bounded(ctx.config, "width", 1280, 1, MAX_DIMENSION)?,
            bounded(ctx.config, "height", 720, 1, MAX_DIMENSION)?,
        );
        let format = ImageFormat::from_config(ctx.config);

        let duration = self.probe_duration(ctx.input)?;
        let timestamps = thumbnail_timestamps(duration, count);
        self.logger.info(&format!(
            "Extracting {} thumbnail(s) at {}x{} from {:.2}s of video",
            timestamps.len(),
            size.0,
            size.1,
            duration
        ));

        let thumb_dir = ctx.output_dir.join("thumbnails");
        fs::create_dir_all(&thumb_dir)
            .map_err(|e| StageError::io("creating thumbnail directory", e))?;

        let mut paths: Vec<PathBuf> = Vec::new();
        let mut details = Vec::new();
        for (i, &timestamp) in timestamps.iter().enumerate() {
            let index = i + 1;
            let path = thumb_dir.join(format!("thumb_{:02}.{}", index, format.extension));
            match self.grab_frame(ctx.input, timestamp, &path, size, &format) {
                Ok(()) => {
                    details.push(json!({
                        "path": path.display().to_string(),
                        "timestamp": timestamp,
                        "index": index,
                    }));
                    paths.push(path);
                }
                Err(e) => self
                    .logger
                    .warn(&format!("Failed to extract thumbnail at {:.2}s: {}", timestamp, e)),
            }
            let percent = (index * 100 / timestamps.len().max(1)) as u32;
            ctx.report_progress(agent, percent, &format!("Thumbnail {}/{}", index, timestamps.len()));
        }

        if paths.is_empty() {
            return Err(StageError::other("No thumbnails were generated"));
        }

        let mut payload = Map::new();
        payload.insert(
            "thumbnail_paths".to_string(),
            Value::Array(paths.iter().map(|p| path_value(p)).collect()),
        );
        payload.insert("details".to_string(), Value::Array(details));
        payload.insert("count".to_string(), Value::from(paths.len()));
        payload.insert("timestamps".to_string(), json!(timestamps));
        Ok(payload)
    }
}
