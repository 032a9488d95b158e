//! Stage implementations.
//!
//! Each stage handles one phase of post-production and reaches the
//! external tools only through [`MediaTool`].

mod audio;
mod backup;
mod captions;
mod thumbnails;
mod video_enhance;

pub use audio::AudioStage;
pub use backup::{restore, BackupStage};
pub use captions::CaptionsStage;
pub use thumbnails::{thumbnail_timestamps, ThumbnailsStage};
pub use video_enhance::{VideoEnhanceStage, EXTERNAL_AUDIO_KEY};

use std::path::Path;

use serde_json::Value;

use crate::logging::JobLogger;
use crate::orchestrator::errors::{StageError, StageResult};
use crate::tool::{MediaTool, ToolInvocation, ToolOutput};

/// Run a tool call, logging the command and feeding its output to the tail buffer.
pub(crate) fn run_logged(
    tool: &dyn MediaTool,
    logger: &JobLogger,
    invocation: &ToolInvocation,
) -> StageResult<ToolOutput> {
    logger.command(&invocation.command_line());
    logger.log_invocation_pretty(invocation);

    let output = tool.run(invocation)?;
    logger.tool_output(&output);

    if !output.success() {
        return Err(StageError::tool_invocation(
            &invocation.program,
            output.status_code.unwrap_or(-1),
            output.stderr_summary(),
        ));
    }
    Ok(output)
}

/// Fail with `OutputNotProduced` unless `path` is a file.
pub(crate) fn require_output(path: &Path) -> StageResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(StageError::output_not_produced(path))
    }
}

pub(crate) fn path_value(path: &Path) -> Value {
    Value::from(path.display().to_string())
}

/// Escape a path for use inside an ffmpeg filter argument.
pub(crate) fn escape_filter_path(path: &Path) -> String {
    path.display()
        .to_string()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}
