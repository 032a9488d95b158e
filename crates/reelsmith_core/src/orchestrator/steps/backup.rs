//! Backup stage - copies the input aside before anything touches it.
//!
//! Backups are timestamped copies under `<output_dir>/<backup_dir>`. Files in
//! that directory older than `retention_days` are removed after each backup.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Local;
use serde_json::{Map, Value};

use super::path_value;
use crate::logging::JobLogger;
use crate::orchestrator::errors::{StageError, StageResult};
use crate::orchestrator::step::{PipelineStage, StageKind};
use crate::orchestrator::types::StageContext;

const SECONDS_PER_DAY: u64 = 86_400;

/// Backup stage.
pub struct BackupStage {
    logger: Arc<JobLogger>,
}

impl BackupStage {
    pub fn new(logger: Arc<JobLogger>) -> Self {
        Self { logger }
    }

    fn backup_name(input: &Path) -> String {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "backup".to_string());
        let ext = input
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        format!("{}_{}{}", stem, Local::now().format("%Y%m%d_%H%M%S"), ext)
    }

    /// Remove files older than the retention window, sparing `keep`.
    fn cleanup_old_backups(&self, dir: &Path, retention_days: u64, keep: &Path) -> usize {
        let window = Duration::from_secs(retention_days.saturating_mul(SECONDS_PER_DAY));
        let Some(cutoff) = SystemTime::now().checked_sub(window) else {
            return 0;
        };
        let Ok(entries) = fs::read_dir(dir) else {
            return 0;
        };

        let mut cleaned = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path == keep {
                continue;
            }
            let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            if modified < cutoff {
                match fs::remove_file(&path) {
                    Ok(()) => {
                        cleaned += 1;
                        self.logger.debug(&format!("Removed old backup: {}", path.display()));
                    }
                    Err(e) => self
                        .logger
                        .warn(&format!("Could not remove {}: {}", path.display(), e)),
                }
            }
        }
        cleaned
    }
}

impl PipelineStage for BackupStage {
    fn kind(&self) -> StageKind {
        StageKind::Backup
    }

    fn description(&self) -> &str {
        "Back up input"
    }

    fn logger(&self) -> &JobLogger {
        &self.logger
    }

    fn execute(&self, ctx: &StageContext) -> StageResult<Map<String, Value>> {
        let mut payload = Map::new();

        if !ctx.config.bool("enabled", true) {
            self.logger.info("Backup is disabled");
            payload.insert("backup_path".to_string(), Value::Null);
            payload.insert("backup_enabled".to_string(), Value::from(false));
            payload.insert("cleaned_count".to_string(), Value::from(0));
            payload.insert("total_backups".to_string(), Value::from(0));
            return Ok(payload);
        }

        let backup_dir = ctx.output_dir.join(ctx.config.string("backup_dir", ".backups"));
        fs::create_dir_all(&backup_dir)
            .map_err(|e| StageError::io("creating backup directory", e))?;

        let backup_path = backup_dir.join(Self::backup_name(ctx.input));
        self.logger
            .info(&format!("Creating backup: {}", backup_path.display()));
        fs::copy(ctx.input, &backup_path).map_err(|e| StageError::io("copying input", e))?;
        super::require_output(&backup_path)?;
        ctx.report_progress(self.kind().agent_name(), 60, "Backup written");

        let retention_days = ctx.config.integer("retention_days", 7).max(0) as u64;
        let cleaned = self.cleanup_old_backups(&backup_dir, retention_days, &backup_path);
        if cleaned > 0 {
            self.logger.info(&format!("Cleaned {} old backup(s)", cleaned));
        }

        let total = fs::read_dir(&backup_dir)
            .map_err(|e| StageError::io("listing backups", e))?
            .flatten()
            .filter(|e| e.path().is_file())
            .count();

        payload.insert("backup_path".to_string(), path_value(&backup_path));
        payload.insert("backup_enabled".to_string(), Value::from(true));
        payload.insert("cleaned_count".to_string(), Value::from(cleaned));
        payload.insert("total_backups".to_string(), Value::from(total));
        Ok(payload)
    }
}

/// Copy a backup back to `destination`, creating parent directories.
pub fn restore(backup: &Path, destination: &Path) -> StageResult<PathBuf> {
    if !backup.is_file() {
        return Err(StageError::invalid_input(format!(
            "backup not found: {}",
            backup.display()
        )));
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| StageError::io("creating restore directory", e))?;
    }
    fs::copy(backup, destination).map_err(|e| StageError::io("restoring backup", e))?;
    Ok(destination.to_path_buf())
}
