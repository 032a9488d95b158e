//! Real process runner with timeouts.

use std::process::Stdio;

use tokio::process::Command;
use tokio::runtime::{Builder, Runtime};

use super::types::{ToolError, ToolInvocation, ToolOutput, ToolResult};
use super::MediaTool;

/// Runs tool invocations as child processes.
///
/// Uses a private current-thread runtime so callers stay synchronous.
/// The child is killed when its timeout elapses. Must not be called from
/// inside another async runtime.
pub struct ProcessTool {
    runtime: Runtime,
}

impl ProcessTool {
    /// Create a new process runner.
    pub fn new() -> ToolResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ToolError::Runtime(e.to_string()))?;
        Ok(Self { runtime })
    }
}

impl MediaTool for ProcessTool {
    fn run(&self, invocation: &ToolInvocation) -> ToolResult<ToolOutput> {
        tracing::debug!("Running {}", invocation.command_line());

        self.runtime.block_on(async {
            let child = Command::new(&invocation.program)
                .args(&invocation.args)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output();

            match tokio::time::timeout(invocation.timeout, child).await {
                Ok(Ok(output)) => Ok(ToolOutput {
                    status_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                }),
                Ok(Err(e)) => Err(ToolError::spawn(&invocation.program, e.to_string())),
                Err(_) => {
                    tracing::warn!(
                        "{} exceeded {}s, killed",
                        invocation.program,
                        invocation.timeout.as_secs()
                    );
                    Err(ToolError::timeout(&invocation.program, invocation.timeout))
                }
            }
        })
    }
}
