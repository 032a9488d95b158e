//! First pass: loudness analysis.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use super::types::{LoudnessError, LoudnessMeasurement, LoudnessResult};
use crate::tool::{timeouts, MediaTool, ToolInvocation, FFMPEG};

/// Measures integrated loudness, true peak, range and threshold.
#[derive(Clone)]
pub struct LoudnessMeter {
    tool: Arc<dyn MediaTool>,
    timeout: Duration,
}

impl LoudnessMeter {
    /// Create a meter using the given tool.
    pub fn new(tool: Arc<dyn MediaTool>) -> Self {
        Self {
            tool,
            timeout: timeouts::ANALYSIS,
        }
    }

    /// Override the analysis timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Analyse the full audio stream at `path`.
    ///
    /// Output goes to a null sink; only the JSON summary on stderr is used.
    pub fn measure(&self, path: &Path) -> LoudnessResult<LoudnessMeasurement> {
        let invocation = ToolInvocation::new(FFMPEG, self.timeout)
            .args(["-hide_banner", "-nostats", "-i"])
            .path(path)
            .args(["-vn", "-af", "loudnorm=print_format=json", "-f", "null", "-"]);

        let output = self.tool.run_checked(&invocation)?;
        let measurement = parse_loudnorm_report(&output.stderr)?;

        tracing::debug!(
            "Measured {}: I={:.2} LUFS TP={:.2} dBTP LRA={:.2} LU",
            path.display(),
            measurement.integrated_lufs,
            measurement.true_peak_db,
            measurement.loudness_range_lu
        );
        Ok(measurement)
    }
}

/// Isolate the JSON object embedded in diagnostic output.
///
/// The block starts at the first line that is exactly `{` (ignoring
/// surrounding whitespace) and ends at the next line that is exactly `}`.
/// Returns `None` when either delimiter is missing.
pub fn extract_json_block(text: &str) -> Option<String> {
    let mut block: Vec<&str> = Vec::new();
    let mut inside = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if !inside {
            if trimmed == "{" {
                inside = true;
                block.push("{");
            }
            continue;
        }

        block.push(line);
        if trimmed == "}" {
            return Some(block.join("\n"));
        }
    }

    None
}

/// Parse loudnorm's analysis summary out of stderr text.
pub fn parse_loudnorm_report(stderr: &str) -> LoudnessResult<LoudnessMeasurement> {
    let block = extract_json_block(stderr).ok_or_else(|| {
        LoudnessError::MeasurementParse("no JSON summary in loudnorm output".to_string())
    })?;

    let value: Value = serde_json::from_str(&block)
        .map_err(|e| LoudnessError::MeasurementParse(format!("invalid JSON summary: {}", e)))?;
    let fields = value.as_object().ok_or_else(|| {
        LoudnessError::MeasurementParse("loudnorm summary is not an object".to_string())
    })?;

    Ok(LoudnessMeasurement {
        integrated_lufs: numeric_field(fields, "input_i")?,
        true_peak_db: numeric_field(fields, "input_tp")?,
        loudness_range_lu: numeric_field(fields, "input_lra")?,
        threshold_lufs: numeric_field(fields, "input_thresh")?,
        target_offset_lu: numeric_field(fields, "target_offset")?,
    })
}

/// Read a field that loudnorm may encode as a string (`"-23.05"`, `"-inf"`) or number.
fn numeric_field(fields: &Map<String, Value>, key: &str) -> LoudnessResult<f64> {
    let value = fields
        .get(key)
        .ok_or_else(|| LoudnessError::MeasurementParse(format!("missing field '{}'", key)))?;

    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        LoudnessError::MeasurementParse(format!("field '{}' is not numeric: {}", key, value))
    })
}
