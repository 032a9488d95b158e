//! Pipeline configuration.
//!
//! This module provides:
//! - TOML file with one table per section, layered over built-in defaults
//! - Atomic file writes and section-level updates
//! - Deep-merged per-run overrides that never touch the base config
//! - Immutable per-stage snapshots ([`StageConfig`])
//! - The CI environment-safety profile
//!
//! # Example
//!
//! ```no_run
//! use reelsmith_core::config::{ConfigManager, ConfigSection};
//!
//! let mut manager = ConfigManager::new("reelsmith.toml");
//! manager.load_or_create().unwrap();
//!
//! let audio = manager.config().get_section(ConfigSection::Audio);
//! println!("Target: {} LUFS", audio.float("target_loudness_lufs", -16.0));
//!
//! manager.config_mut().set("pipeline", "fail_fast", true);
//! manager.update_section(ConfigSection::Pipeline).unwrap();
//! ```

mod environment;
mod manager;
mod pipeline;
mod settings;

pub use environment::{EnvironmentProfile, CI_ENV_VAR};
pub use manager::{load_overrides, parse_config, ConfigError, ConfigManager, ConfigResult};
pub use pipeline::{deep_merge, PipelineConfig, StageConfig};
pub use settings::{default_sections, ConfigSection};
