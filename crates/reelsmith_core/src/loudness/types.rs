//! Loudness measurement and target types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tool::ToolError;

/// Errors from the loudness engine.
#[derive(Error, Debug)]
pub enum LoudnessError {
    /// The external tool failed or timed out.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The analysis output had no usable JSON summary.
    #[error("Could not parse loudness measurement: {0}")]
    MeasurementParse(String),

    /// The tool exited cleanly but the corrected file is missing.
    #[error("Corrected audio was not produced: {}", .0.display())]
    OutputNotProduced(PathBuf),
}

/// Result type for loudness operations.
pub type LoudnessResult<T> = Result<T, LoudnessError>;

/// Statistics from one loudness analysis pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessMeasurement {
    /// Integrated loudness (LUFS).
    pub integrated_lufs: f64,
    /// True peak (dBTP).
    pub true_peak_db: f64,
    /// Loudness range (LU).
    pub loudness_range_lu: f64,
    /// Gating threshold (LUFS).
    pub threshold_lufs: f64,
    /// Offset loudnorm suggests for the second pass (LU).
    pub target_offset_lu: f64,
}

impl LoudnessMeasurement {
    /// Whether every value the correction pass consumes is finite.
    ///
    /// Silent input measures as `-inf`, which loudnorm cannot correct.
    pub fn is_correctable(&self) -> bool {
        self.integrated_lufs.is_finite()
            && self.true_peak_db.is_finite()
            && self.loudness_range_lu.is_finite()
            && self.threshold_lufs.is_finite()
            && self.target_offset_lu.is_finite()
    }

    /// Whether the integrated loudness is within `tolerance_lu` of `target_lufs`.
    pub fn within(&self, target_lufs: f64, tolerance_lu: f64) -> bool {
        (self.integrated_lufs - target_lufs).abs() <= tolerance_lu
    }
}

/// How the true-peak ceiling is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PeakMode {
    /// Derive the ceiling from the loudness target.
    Auto,
    /// Use a fixed ceiling in dBTP.
    Fixed(f64),
}

impl PeakMode {
    /// Build from the `peak_mode` / `true_peak_db` config pair.
    ///
    /// Anything other than `"fixed"` selects automatic mode.
    pub fn from_config(mode: &str, fixed_db: f64) -> Self {
        if mode.eq_ignore_ascii_case("fixed") {
            PeakMode::Fixed(fixed_db)
        } else {
            PeakMode::Auto
        }
    }

    /// Resolve the ceiling for a loudness target.
    pub fn resolve(&self, target_lufs: f64) -> f64 {
        match self {
            PeakMode::Auto => super::auto_true_peak(target_lufs),
            PeakMode::Fixed(db) => *db,
        }
    }
}

/// Target for the correction pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionTarget {
    /// Integrated loudness target (LUFS).
    pub target_lufs: f64,
    /// True-peak ceiling (dBTP).
    pub target_true_peak_db: f64,
    /// Request channel-independent correction (not supported, falls back to coupled).
    pub dual_mono: bool,
}

impl CorrectionTarget {
    /// Build a target, resolving the peak ceiling from `peak_mode`.
    pub fn new(target_lufs: f64, peak_mode: PeakMode, dual_mono: bool) -> Self {
        Self {
            target_lufs,
            target_true_peak_db: peak_mode.resolve(target_lufs),
            dual_mono,
        }
    }
}
