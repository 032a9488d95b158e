//! External media tool boundary.
//!
//! Every call to ffmpeg, ffprobe or the transcription CLI goes through the
//! [`MediaTool`] trait. Production code uses [`ProcessTool`], which spawns a
//! real process with an enforced timeout; tests substitute a scripted tool
//! that records invocations.
//!
//! # Example
//!
//! ```no_run
//! use reelsmith_core::tool::{timeouts, MediaTool, ProcessTool, ToolInvocation};
//!
//! let tool = ProcessTool::new().unwrap();
//! let probe = ToolInvocation::new("ffprobe", timeouts::PROBE)
//!     .args(["-v", "error", "-show_entries", "format=duration"])
//!     .arg("input.mp4");
//! let output = tool.run_checked(&probe).unwrap();
//! println!("{}", output.stdout);
//! ```

mod process;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use process::ProcessTool;
pub use types::{ToolError, ToolInvocation, ToolOutput, ToolResult};

/// Program name for the media filter/codec engine.
pub const FFMPEG: &str = "ffmpeg";
/// Program name for the media metadata prober.
pub const FFPROBE: &str = "ffprobe";

/// Per-operation timeouts.
///
/// Metadata probes are short; full re-encodes are allowed tens of minutes.
pub mod timeouts {
    use std::time::Duration;

    /// Duration/format probes.
    pub const PROBE: Duration = Duration::from_secs(30);
    /// Listing available encoders or checking the tool version.
    pub const CAPABILITY: Duration = Duration::from_secs(10);
    /// Full-length loudness analysis pass.
    pub const ANALYSIS: Duration = Duration::from_secs(600);
    /// Audio filter chain and loudness correction renders.
    pub const AUDIO_RENDER: Duration = Duration::from_secs(300);
    /// Extracting the transcription audio track.
    pub const AUDIO_EXTRACT: Duration = Duration::from_secs(120);
    /// Speech-to-text over the whole input.
    pub const TRANSCRIPTION: Duration = Duration::from_secs(1800);
    /// Single thumbnail frame grab.
    pub const FRAME_GRAB: Duration = Duration::from_secs(30);
    /// Full video re-encode.
    pub const ENCODE: Duration = Duration::from_secs(1800);
}

/// Trait for invoking the external media tool.
///
/// Implementations must be blocking and must honour
/// [`ToolInvocation::timeout`]. A timed-out process is killed and reported
/// as [`ToolError::Timeout`].
pub trait MediaTool: Send + Sync {
    /// Run the invocation and capture its output.
    ///
    /// A non-zero exit status is not an error at this level; use
    /// [`MediaTool::run_checked`] when the exit code matters.
    fn run(&self, invocation: &ToolInvocation) -> ToolResult<ToolOutput>;

    /// Run the invocation and fail on a non-zero exit status.
    fn run_checked(&self, invocation: &ToolInvocation) -> ToolResult<ToolOutput> {
        let output = self.run(invocation)?;
        if !output.success() {
            return Err(ToolError::failed(
                &invocation.program,
                output.status_code.unwrap_or(-1),
                output.stderr_summary(),
            ));
        }
        Ok(output)
    }

    /// Check whether a program can be executed at all.
    fn is_available(&self, program: &str) -> bool {
        let probe = ToolInvocation::new(program, timeouts::CAPABILITY).arg("-version");
        matches!(self.run(&probe), Ok(output) if output.success())
    }
}
