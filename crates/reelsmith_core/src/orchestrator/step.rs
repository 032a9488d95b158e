//! Pipeline stage trait definition.
//!
//! All stages implement this trait, providing a consistent interface for
//! validation and execution. A stage never lets an error escape: the
//! provided [`PipelineStage::run`] turns every failure, panics included,
//! into a failed [`StageReport`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use serde_json::{Map, Value};

use super::errors::{StageError, StageResult};
use super::types::{StageContext, StageReport};
use crate::logging::JobLogger;

/// The fixed set of stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Backup,
    Audio,
    Captions,
    VideoEnhance,
    Thumbnails,
}

impl StageKind {
    /// Every stage in execution order.
    pub const ALL: [StageKind; 5] = [
        StageKind::Backup,
        StageKind::Audio,
        StageKind::Captions,
        StageKind::VideoEnhance,
        StageKind::Thumbnails,
    ];

    /// Stable key, also the config section name.
    pub fn key(&self) -> &'static str {
        match self {
            StageKind::Backup => "backup",
            StageKind::Audio => "audio",
            StageKind::Captions => "captions",
            StageKind::VideoEnhance => "video",
            StageKind::Thumbnails => "thumbnails",
        }
    }

    /// Agent name used in reports and failure messages.
    pub fn agent_name(&self) -> &'static str {
        match self {
            StageKind::Backup => "BackupManager",
            StageKind::Audio => "AudioProcessor",
            StageKind::Captions => "CaptionGenerator",
            StageKind::VideoEnhance => "VideoEnhancer",
            StageKind::Thumbnails => "ThumbnailGenerator",
        }
    }
}

/// Trait for pipeline stages.
///
/// The orchestrator calls [`PipelineStage::run`], which:
///
/// 1. Runs `validate_input` (a failure is reported, not raised)
/// 2. Times `execute`, catching any panic
/// 3. Wraps the payload or error into a [`StageReport`]
///
/// # Example
///
/// ```ignore
/// struct CopyStage { logger: Arc<JobLogger> }
///
/// impl PipelineStage for CopyStage {
///     fn kind(&self) -> StageKind { StageKind::Backup }
///     fn description(&self) -> &str { "Copy input" }
///     fn logger(&self) -> &JobLogger { &self.logger }
///
///     fn execute(&self, ctx: &StageContext) -> StageResult<Map<String, Value>> {
///         let target = ctx.output_dir.join("copy.mp4");
///         std::fs::copy(ctx.input, &target).map_err(|e| StageError::io("copy", e))?;
///         let mut payload = Map::new();
///         payload.insert("output_path".into(), target.display().to_string().into());
///         Ok(payload)
///     }
/// }
/// ```
pub trait PipelineStage: Send + Sync {
    /// Which stage this is.
    fn kind(&self) -> StageKind;

    /// Human-readable description of what this stage does.
    fn description(&self) -> &str;

    /// Log sink for this run.
    fn logger(&self) -> &JobLogger;

    /// Validate inputs before execution.
    ///
    /// Default: the input must be an existing regular file.
    fn validate_input(&self, ctx: &StageContext) -> StageResult<()> {
        if !ctx.input.is_file() {
            return Err(StageError::invalid_input(format!(
                "input file not found: {}",
                ctx.input.display()
            )));
        }
        Ok(())
    }

    /// Perform the stage's work and return its report payload.
    fn execute(&self, ctx: &StageContext) -> StageResult<Map<String, Value>>;

    /// Validate, execute and time the stage, capturing any failure.
    fn run(&self, ctx: &StageContext) -> StageReport {
        let agent = self.kind().agent_name();
        let logger = self.logger();
        logger.phase(self.description());
        logger.clear_tail();
        ctx.report_progress(agent, 0, "Starting");

        if let Err(e) = self.validate_input(ctx) {
            let message = format!("{} failed: {}", agent, e);
            logger.error(&message);
            return StageReport::failed(agent, 0.0, message);
        }

        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(ctx)));
        let elapsed = started.elapsed().as_secs_f64();

        let error = match outcome {
            Ok(Ok(payload)) => {
                logger.success(&format!("{} completed in {:.2}s", agent, elapsed));
                ctx.report_progress(agent, 100, "Complete");
                return StageReport::succeeded(agent, elapsed, payload);
            }
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("panicked: {}", panic_message(&*panic)),
        };

        let message = format!("{} failed: {}", agent, error);
        logger.error(&message);
        logger.show_tail(agent);
        StageReport::failed(agent, elapsed, message)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
