//! Core types for the orchestrator.

use std::path::{Path, PathBuf};

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use super::step::StageKind;
use crate::config::StageConfig;
use crate::logging::JobLogger;

/// Progress callback type for reporting pipeline progress.
///
/// Arguments: (stage_name, percent_complete, message)
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// Read-only inputs for one stage invocation.
pub struct StageContext<'a> {
    /// File the stage operates on.
    pub input: &'a Path,
    /// Directory for the stage's artifacts.
    pub output_dir: &'a Path,
    /// This stage's configuration snapshot.
    pub config: &'a StageConfig,
    progress: Option<&'a ProgressCallback>,
    logger: Option<&'a JobLogger>,
}

impl<'a> StageContext<'a> {
    pub fn new(input: &'a Path, output_dir: &'a Path, config: &'a StageConfig) -> Self {
        Self {
            input,
            output_dir,
            config,
            progress: None,
            logger: None,
        }
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, callback: Option<&'a ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Also record progress in the run log (filtered in compact mode).
    pub fn with_logger(mut self, logger: &'a JobLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Report progress to the run log and callback (if set).
    pub fn report_progress(&self, stage_name: &str, percent: u32, message: &str) {
        let percent = percent.min(100);
        if let Some(logger) = self.logger {
            logger.progress(percent);
        }
        if let Some(callback) = self.progress {
            callback(stage_name, percent, message);
        }
    }

    /// Input file stem, used to name artifacts.
    pub fn input_stem(&self) -> String {
        self.input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string())
    }
}

/// Outcome of one stage invocation.
///
/// Serializes flat: `success`, `agent`, `elapsed_time`, `error`, then the
/// stage-specific payload keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub success: bool,
    /// Stage agent name (e.g. `AudioProcessor`).
    pub agent: String,
    /// Wall time of the stage body in seconds.
    pub elapsed_time: f64,
    pub error: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl StageReport {
    pub fn succeeded(agent: impl Into<String>, elapsed_time: f64, payload: Map<String, Value>) -> Self {
        Self {
            success: true,
            agent: agent.into(),
            elapsed_time,
            error: None,
            payload,
        }
    }

    /// Failure reports carry no payload.
    pub fn failed(agent: impl Into<String>, elapsed_time: f64, error: impl Into<String>) -> Self {
        Self {
            success: false,
            agent: agent.into(),
            elapsed_time,
            error: Some(error.into()),
            payload: Map::new(),
        }
    }

    /// String payload value.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Path payload value.
    pub fn payload_path(&self, key: &str) -> Option<PathBuf> {
        self.payload_str(key).map(PathBuf::from)
    }

    /// Array-of-strings payload value as paths. Missing key yields empty.
    pub fn payload_paths(&self, key: &str) -> Vec<PathBuf> {
        self.payload
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Consolidated result of one run. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub final_video_path: Option<PathBuf>,
    pub captions_srt_path: Option<PathBuf>,
    /// Thumbnail files in timestamp order.
    pub thumbnail_paths: Vec<PathBuf>,
    pub processing_log_path: Option<PathBuf>,
    pub total_time_seconds: f64,
    /// One message per failure, in stage order.
    pub error_messages: Vec<String>,
}

impl JobReport {
    /// No failures were recorded.
    pub fn is_success(&self) -> bool {
        self.error_messages.is_empty()
    }
}

/// Durable per-run log document.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingLog {
    /// Local time, ISO-8601.
    pub timestamp: String,
    pub config_path: Option<String>,
    /// Rounded to two decimals.
    pub total_time_seconds: f64,
    /// Stage key to report, in execution order.
    #[serde(serialize_with = "serialize_stage_map")]
    pub agent_results: Vec<(StageKind, StageReport)>,
    /// AND of every recorded stage's success.
    pub success: bool,
}

impl ProcessingLog {
    pub fn new(
        config_path: Option<&Path>,
        total_time_seconds: f64,
        agent_results: Vec<(StageKind, StageReport)>,
    ) -> Self {
        let success = agent_results.iter().all(|(_, r)| r.success);
        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            config_path: config_path.map(|p| p.display().to_string()),
            total_time_seconds: (total_time_seconds * 100.0).round() / 100.0,
            agent_results,
            success,
        }
    }
}

fn serialize_stage_map<S>(results: &[(StageKind, StageReport)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(results.len()))?;
    for (kind, report) in results {
        map.serialize_entry(kind.key(), report)?;
    }
    map.end()
}

/// Pre-flight checks without processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DryRunReport {
    pub config_valid: bool,
    pub input_exists: bool,
    pub input_readable: bool,
    pub ffmpeg_available: bool,
    pub whisper_available: bool,
    pub all_passed: bool,
}
