//! Invocation and output types for the media tool boundary.

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

/// Number of trailing stderr lines carried into error messages.
const STDERR_SUMMARY_LINES: usize = 5;

/// Errors raised while invoking an external tool.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The process could not be started.
    #[error("Failed to spawn {tool}: {message}")]
    Spawn { tool: String, message: String },

    /// The process exited with a non-zero status.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    Failed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// The process exceeded its allotted time and was killed.
    #[error("{tool} timed out after {timeout_secs}s")]
    Timeout { tool: String, timeout_secs: u64 },

    /// The process runtime could not be created.
    #[error("Tool runtime unavailable: {0}")]
    Runtime(String),
}

impl ToolError {
    /// Create a spawn error.
    pub fn spawn(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Spawn {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a non-zero exit error.
    pub fn failed(tool: impl Into<String>, exit_code: i32, message: impl Into<String>) -> Self {
        Self::Failed {
            tool: tool.into(),
            exit_code,
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(tool: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            tool: tool.into(),
            timeout_secs: timeout.as_secs(),
        }
    }
}

/// Result type for tool invocations.
pub type ToolResult<T> = Result<T, ToolError>;

/// A single external tool call: program, arguments and time budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Program to execute (looked up on `PATH`).
    pub program: String,
    /// Arguments in order. Stored as text; [`Orchestrator::process`]
    /// rejects non-UTF-8 paths before any invocation is built.
    ///
    /// [`Orchestrator::process`]: crate::orchestrator::Orchestrator::process
    pub args: Vec<String>,
    /// Maximum wall time before the process is killed.
    pub timeout: Duration,
}

impl ToolInvocation {
    /// Create an invocation with no arguments.
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string_lossy().into_owned());
        }
        self
    }

    /// Append a path argument.
    pub fn path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    /// Value following the first occurrence of `flag`, if any.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Whether any argument contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a.contains(needle))
    }

    /// Render the invocation as a shell-like command line for logs.
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                parts.push(format!("'{}'", arg));
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}

/// Captured output of a finished tool process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub status_code: Option<i32>,
    /// Captured stdout (lossy UTF-8).
    pub stdout: String,
    /// Captured stderr (lossy UTF-8).
    pub stderr: String,
}

impl ToolOutput {
    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    /// Last few non-empty stderr lines, joined for an error message.
    pub fn stderr_summary(&self) -> String {
        let lines: Vec<&str> = self
            .stderr
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let start = lines.len().saturating_sub(STDERR_SUMMARY_LINES);
        lines[start..].join(" | ")
    }
}
