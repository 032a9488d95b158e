//! Logging types and configuration.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::StageConfig;

/// Log level for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level debugging (very verbose).
    Trace,
    /// Debug information.
    Debug,
    /// General information.
    #[default]
    Info,
    /// Warnings.
    Warn,
    /// Errors.
    Error,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Upper bound for `error_tail`.
pub const MAX_ERROR_TAIL: usize = 1000;

/// Configuration for logging behavior.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to output.
    pub level: LogLevel,
    /// Use compact mode (filter progress and tool output, show tail on error).
    pub compact: bool,
    /// Progress update step percentage (only log progress at these intervals).
    pub progress_step: u32,
    /// Number of tool output lines kept for the error tail.
    pub error_tail: usize,
    /// Show timestamps in log output.
    pub show_timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            compact: true,
            progress_step: 20,
            error_tail: 20,
            show_timestamps: true,
        }
    }
}

impl LogConfig {
    /// Create a debug configuration (verbose, no compact).
    pub fn debug() -> Self {
        Self {
            level: LogLevel::Debug,
            compact: false,
            progress_step: 10,
            error_tail: 50,
            show_timestamps: true,
        }
    }

    /// Build from the `[logging]` config section.
    ///
    /// Unknown levels fall back to `info`; numeric keys are clamped.
    pub fn from_section(section: &StageConfig) -> Self {
        let defaults = Self::default();
        Self {
            level: section
                .string("level", "info")
                .parse()
                .unwrap_or(defaults.level),
            compact: section.bool("compact", defaults.compact),
            progress_step: section
                .integer("progress_step", i64::from(defaults.progress_step))
                .clamp(1, 100) as u32,
            error_tail: section
                .integer("error_tail", defaults.error_tail as i64)
                .clamp(0, MAX_ERROR_TAIL as i64) as usize,
            show_timestamps: section.bool("show_timestamps", defaults.show_timestamps),
        }
    }
}

/// Callback receiving every formatted log line.
pub type LogCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Message prefix types for consistent formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePrefix {
    /// Shell command: `$ command`
    Command,
    /// Phase marker: `=== Phase ===`
    Phase,
    /// Section marker: `--- Section ---`
    Section,
    /// Success: `[SUCCESS]`
    Success,
    /// Warning: `[WARNING]`
    Warning,
    /// Error: `[ERROR]`
    Error,
}

impl MessagePrefix {
    /// Format a message with this prefix.
    pub fn format(&self, message: &str) -> String {
        match self {
            MessagePrefix::Command => format!("$ {}", message),
            MessagePrefix::Phase => format!("=== {} ===", message),
            MessagePrefix::Section => format!("--- {} ---", message),
            MessagePrefix::Success => format!("[SUCCESS] {}", message),
            MessagePrefix::Warning => format!("[WARNING] {}", message),
            MessagePrefix::Error => format!("[ERROR] {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_levels() {
        assert_eq!("DEBUG".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn config_from_logging_section() {
        let section = StageConfig::new(
            "logging",
            toml::from_str("level = \"debug\"\ncompact = false\nerror_tail = 5\n").unwrap(),
        );
        let config = LogConfig::from_section(&section);
        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.compact);
        assert_eq!(config.error_tail, 5);
        assert_eq!(config.progress_step, 20);
    }

    #[test]
    fn numeric_keys_are_clamped() {
        let section = StageConfig::new(
            "logging",
            toml::from_str("error_tail = 4000000000000000000\nprogress_step = -3\n").unwrap(),
        );
        let config = LogConfig::from_section(&section);
        assert_eq!(config.error_tail, MAX_ERROR_TAIL);
        assert_eq!(config.progress_step, 1);

        let section = StageConfig::new("logging", toml::from_str("error_tail = -5\n").unwrap());
        assert_eq!(LogConfig::from_section(&section).error_tail, 0);
    }

    #[test]
    fn prefixes_format() {
        assert_eq!(MessagePrefix::Phase.format("Audio"), "=== Audio ===");
        assert_eq!(MessagePrefix::Command.format("ffmpeg -i a"), "$ ffmpeg -i a");
        assert_eq!(MessagePrefix::Warning.format("x"), "[WARNING] x");
    }
}
