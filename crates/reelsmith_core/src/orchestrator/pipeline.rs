//! Orchestrator that runs the fixed stage sequence over one input.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use toml::Table;

use super::errors::{PipelineError, PipelineResult};
use super::report::write_processing_log;
use super::step::{PipelineStage, StageKind};
use super::steps::{
    AudioStage, BackupStage, CaptionsStage, ThumbnailsStage, VideoEnhanceStage,
    EXTERNAL_AUDIO_KEY,
};
use super::types::{DryRunReport, JobReport, ProcessingLog, ProgressCallback, StageContext, StageReport};
use crate::config::{ConfigManager, ConfigSection, EnvironmentProfile, PipelineConfig, StageConfig};
use crate::logging::{JobLogger, LogConfig};
use crate::tool::{MediaTool, FFMPEG};
use crate::transcribe::{Transcriber, WhisperCli};

/// Runs Backup, Audio, Captions, VideoEnhance and Thumbnails over one input.
///
/// The base configuration is fixed at construction. Each call to
/// [`Orchestrator::process`] works on its own merged copy, so one
/// orchestrator can serve many runs.
pub struct Orchestrator {
    base: PipelineConfig,
    config_path: Option<PathBuf>,
    profile: EnvironmentProfile,
    tool: Arc<dyn MediaTool>,
    transcriber: Arc<dyn Transcriber>,
    logger: Option<Arc<JobLogger>>,
    progress: Option<ProgressCallback>,
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    base: PipelineConfig,
    config_path: Option<PathBuf>,
    profile: EnvironmentProfile,
    tool: Arc<dyn MediaTool>,
    transcriber: Option<Arc<dyn Transcriber>>,
    logger: Option<Arc<JobLogger>>,
    progress: Option<ProgressCallback>,
}

impl OrchestratorBuilder {
    pub fn new(tool: Arc<dyn MediaTool>) -> Self {
        Self {
            base: PipelineConfig::default(),
            config_path: None,
            profile: EnvironmentProfile::standard(),
            tool,
            transcriber: None,
            logger: None,
            progress: None,
        }
    }

    /// Base configuration shared by every run.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.base = config;
        self
    }

    /// Path recorded in the processing log.
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn profile(mut self, profile: EnvironmentProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Speech-to-text backend. Defaults to the whisper CLI over the same tool.
    pub fn transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Log sink for every run. Without one, each run logs to
    /// `<output_dir>/<logging.output_dir>/<stem>.log`.
    pub fn logger(mut self, logger: Arc<JobLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn build(self) -> Orchestrator {
        let transcriber = self
            .transcriber
            .unwrap_or_else(|| Arc::new(WhisperCli::new(Arc::clone(&self.tool))));
        Orchestrator {
            base: self.base,
            config_path: self.config_path,
            profile: self.profile,
            tool: self.tool,
            transcriber,
            logger: self.logger,
            progress: self.progress,
        }
    }
}

impl Orchestrator {
    pub fn builder(tool: Arc<dyn MediaTool>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(tool)
    }

    /// Build an orchestrator whose base config is loaded from `path`.
    pub fn from_config_file(
        path: &Path,
        tool: Arc<dyn MediaTool>,
        profile: EnvironmentProfile,
    ) -> PipelineResult<Self> {
        let mut manager = ConfigManager::new(path);
        manager.load()?;
        Ok(Self::builder(tool)
            .config(manager.config().clone())
            .config_path(path)
            .profile(profile)
            .build())
    }

    /// The base configuration. Runs never modify it.
    pub fn base_config(&self) -> &PipelineConfig {
        &self.base
    }

    /// Configuration a run with `overrides` would use.
    pub fn effective_config(&self, overrides: &Table) -> PipelineConfig {
        let mut merged = self.profile.apply(&self.base.merged(overrides));
        if merged.remove("video", EXTERNAL_AUDIO_KEY).is_some() {
            tracing::warn!("Ignoring video.{} from configuration", EXTERNAL_AUDIO_KEY);
        }
        merged
    }

    /// Process one input through every stage.
    ///
    /// Fails only when the input is missing or the output directory cannot
    /// be prepared. Stage failures are collected in the returned report.
    ///
    /// Paths are passed to the external tools as text, so an input or
    /// output directory that is not valid UTF-8 is rejected up front.
    pub fn process(
        &self,
        input: &Path,
        output_dir: Option<&Path>,
        overrides: &Table,
    ) -> PipelineResult<JobReport> {
        if !input.is_file() || input.to_str().is_none() {
            return Err(PipelineError::input_not_found(input));
        }
        let started = Instant::now();

        let output_dir = output_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_output_dir(input));
        if output_dir.to_str().is_none() {
            return Err(PipelineError::setup(&output_dir, "path is not valid UTF-8"));
        }
        fs::create_dir_all(&output_dir)
            .map_err(|e| PipelineError::setup(&output_dir, e.to_string()))?;

        let config = self.effective_config(overrides);
        let logging = config.get_section(ConfigSection::Logging);
        let log_dir = output_dir.join(logging.string("output_dir", "logs"));
        let logger = self.run_logger(input, &log_dir, &logging)?;
        let fail_fast = config.get_section(ConfigSection::Pipeline).bool("fail_fast", false);

        logger.phase(&format!("Processing {}", input.display()));
        logger.info(&format!("Output directory: {}", output_dir.display()));

        let mut results: Vec<(StageKind, StageReport)> = Vec::with_capacity(StageKind::ALL.len());
        let mut error_messages = Vec::new();
        let mut stopped_early = false;

        for kind in StageKind::ALL {
            let stage = self.stage(kind, &logger);
            let section = stage_config(kind, &config, &results);
            let ctx = StageContext::new(input, &output_dir, &section)
                .with_progress(self.progress.as_ref())
                .with_logger(&logger);

            let report = stage.run(&ctx);
            let failed = !report.success;
            if failed {
                error_messages.push(
                    report
                        .error
                        .clone()
                        .unwrap_or_else(|| format!("{} failed", kind.agent_name())),
                );
            }
            results.push((kind, report));

            if failed && fail_fast {
                logger.warn(&format!(
                    "Fail-fast enabled; stopping after {}",
                    kind.agent_name()
                ));
                stopped_early = true;
                break;
            }
        }

        let find = |kind: StageKind| {
            results
                .iter()
                .find(|(k, r)| *k == kind && r.success)
                .map(|(_, r)| r)
        };
        let final_video_path = find(StageKind::VideoEnhance).and_then(|r| r.payload_path("output_path"));
        let captions_srt_path = find(StageKind::Captions).and_then(|r| r.payload_path("srt_path"));
        let thumbnail_paths = find(StageKind::Thumbnails)
            .map(|r| r.payload_paths("thumbnail_paths"))
            .unwrap_or_default();

        let total_time_seconds = started.elapsed().as_secs_f64();
        let log = ProcessingLog::new(self.config_path.as_deref(), total_time_seconds, results);
        let processing_log_path = match write_processing_log(&log_dir, &log) {
            Ok(path) => {
                logger.info(&format!("Processing log: {}", path.display()));
                Some(path)
            }
            Err(e) => {
                let message = format!("Failed to write processing log: {}", e);
                logger.error(&message);
                // a fail-fast report carries only the stage failure that stopped it
                if !stopped_early {
                    error_messages.push(message);
                }
                None
            }
        };

        if error_messages.is_empty() {
            logger.success(&format!("Completed in {:.2}s", total_time_seconds));
        } else {
            logger.warn(&format!(
                "Completed in {:.2}s with {} error(s)",
                total_time_seconds,
                error_messages.len()
            ));
        }
        logger.flush();

        Ok(JobReport {
            final_video_path,
            captions_srt_path,
            thumbnail_paths,
            processing_log_path,
            total_time_seconds,
            error_messages,
        })
    }

    /// Check configuration, input and tools without processing anything.
    pub fn dry_run(&self, input: &Path) -> DryRunReport {
        let config = self.effective_config(&Table::new());
        let config_valid = ConfigSection::ALL.iter().all(|section| {
            config
                .as_table()
                .get(section.table_name())
                .map_or(false, |value| value.is_table())
        });
        let input_exists = input.is_file();
        let input_readable = input_exists && File::open(input).is_ok();
        let ffmpeg_available = self.tool.is_available(FFMPEG);
        let whisper_available = self.transcriber.is_available();

        DryRunReport {
            config_valid,
            input_exists,
            input_readable,
            ffmpeg_available,
            whisper_available,
            all_passed: config_valid
                && input_exists
                && input_readable
                && ffmpeg_available
                && whisper_available,
        }
    }

    fn run_logger(
        &self,
        input: &Path,
        log_dir: &Path,
        logging: &StageConfig,
    ) -> PipelineResult<Arc<JobLogger>> {
        if let Some(ref logger) = self.logger {
            return Ok(Arc::clone(logger));
        }
        let job_name = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "job".to_string());
        JobLogger::new(job_name, log_dir, LogConfig::from_section(logging), None)
            .map(Arc::new)
            .map_err(|e| PipelineError::setup(log_dir, e.to_string()))
    }

    fn stage(&self, kind: StageKind, logger: &Arc<JobLogger>) -> Box<dyn PipelineStage> {
        let logger = Arc::clone(logger);
        match kind {
            StageKind::Backup => Box::new(BackupStage::new(logger)),
            StageKind::Audio => Box::new(AudioStage::new(Arc::clone(&self.tool), logger)),
            StageKind::Captions => Box::new(CaptionsStage::new(
                Arc::clone(&self.tool),
                Arc::clone(&self.transcriber),
                logger,
            )),
            StageKind::VideoEnhance => {
                Box::new(VideoEnhanceStage::new(Arc::clone(&self.tool), logger))
            }
            StageKind::Thumbnails => Box::new(ThumbnailsStage::new(Arc::clone(&self.tool), logger)),
        }
    }
}

/// `<input parent>/<input stem>_output`.
pub fn default_output_dir(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "input".to_string());
    input
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(format!("{}_output", stem))
}

/// Section snapshot for `kind`, with the processed audio attached for video.
fn stage_config(
    kind: StageKind,
    config: &PipelineConfig,
    results: &[(StageKind, StageReport)],
) -> StageConfig {
    let section = config.section(kind.key());
    if kind != StageKind::VideoEnhance {
        return section;
    }

    let processed_audio = results
        .iter()
        .find(|(k, r)| *k == StageKind::Audio && r.success)
        .and_then(|(_, r)| r.payload_str("output_path"));
    match processed_audio {
        Some(path) => section.with(EXTERNAL_AUDIO_KEY, path),
        None => section,
    }
}
