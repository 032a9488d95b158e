//! Processing log persistence.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use super::types::ProcessingLog;

const LOG_PREFIX: &str = "processing_log";

/// Write `log` as pretty JSON into `log_dir` and return its path.
///
/// The name carries a millisecond timestamp; a numeric suffix is added if
/// that name is already taken, so earlier logs are never overwritten.
pub fn write_processing_log(log_dir: &Path, log: &ProcessingLog) -> io::Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let json = serde_json::to_string_pretty(log).map_err(io::Error::other)?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f").to_string();
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{}_{}.json", LOG_PREFIX, stamp)
        } else {
            format!("{}_{}_{}.json", LOG_PREFIX, stamp, attempt)
        };
        let path = log_dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(json.as_bytes())?;
                file.write_all(b"\n")?;
                file.sync_all()?;
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::step::StageKind;
    use crate::orchestrator::types::StageReport;
    use serde_json::{Map, Value};

    fn sample() -> ProcessingLog {
        ProcessingLog::new(
            Some(Path::new("/etc/reelsmith.toml")),
            3.14159,
            vec![(
                StageKind::Backup,
                StageReport::succeeded("BackupManager", 0.01, Map::new()),
            )],
        )
    }

    #[test]
    fn writes_parseable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_processing_log(dir.path(), &sample()).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("processing_log_") && name.ends_with(".json"));

        let value: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["total_time_seconds"], Value::from(3.14));
        assert_eq!(value["config_path"], Value::from("/etc/reelsmith.toml"));
        assert_eq!(value["agent_results"]["backup"]["agent"], Value::from("BackupManager"));
        assert_eq!(value["success"], Value::from(true));
    }

    #[test]
    fn never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..3)
            .map(|_| write_processing_log(dir.path(), &sample()).unwrap())
            .collect();
        assert_ne!(paths[0], paths[1]);
        assert_ne!(paths[1], paths[2]);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn blocked_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("logs");
        fs::write(&blocked, "not a directory").unwrap();
        assert!(write_processing_log(&blocked, &sample()).is_err());
    }
}
