//! Stage orchestration for one input file.
//!
//! Every run executes the same fixed sequence. Each stage fails on its own:
//! its error is captured into a [`StageReport`] and the run continues
//! unless `pipeline.fail_fast` is set.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator::process(input, output_dir, overrides)
//!     ├── merge overrides, apply environment profile
//!     ├── Stage: Backup
//!     ├── Stage: Audio ──────────┐ output_path
//!     ├── Stage: Captions        │
//!     ├── Stage: VideoEnhance ◀──┘ video.external_audio_path
//!     ├── Stage: Thumbnails
//!     └── JobReport + processing_log_<timestamp>.json
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use reelsmith_core::config::EnvironmentProfile;
//! use reelsmith_core::orchestrator::Orchestrator;
//! use reelsmith_core::tool::ProcessTool;
//!
//! let tool = Arc::new(ProcessTool::new().unwrap());
//! let orchestrator = Orchestrator::builder(tool)
//!     .profile(EnvironmentProfile::detect())
//!     .build();
//!
//! let report = orchestrator
//!     .process(Path::new("episode.mp4"), None, &toml::Table::new())
//!     .unwrap();
//! println!("{:?}", report.error_messages);
//! ```

mod errors;
mod pipeline;
mod report;
mod step;
pub mod steps;
mod types;

pub use errors::{PipelineError, PipelineResult, StageError, StageResult};
pub use pipeline::{default_output_dir, Orchestrator, OrchestratorBuilder};
pub use report::write_processing_log;
pub use step::{PipelineStage, StageKind};
pub use steps::{
    restore, AudioStage, BackupStage, CaptionsStage, ThumbnailsStage, VideoEnhanceStage,
};
pub use types::{
    DryRunReport, JobReport, ProcessingLog, ProgressCallback, StageContext, StageReport,
};
