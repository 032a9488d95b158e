//! Two-pass EBU R128 loudness correction.
//!
//! The first pass ([`LoudnessMeter`]) runs ffmpeg's `loudnorm` filter in
//! analysis mode and parses the JSON summary it prints on stderr. The second
//! pass ([`LoudnessNormalizer`]) feeds those measurements back into
//! `loudnorm` with `linear=true`, so a single gain is applied instead of
//! re-analysing the stream.
//!
//! ```text
//! input ──measure──▶ LoudnessMeasurement ──┐
//!   │                                      ▼
//!   └──────────── loudnorm(linear, measured_*) ──▶ output
//! ```
//!
//! The normalizer does not verify its own result; callers re-measure the
//! output when they need confirmation.

mod meter;
mod normalizer;
mod types;

pub use meter::{extract_json_block, parse_loudnorm_report, LoudnessMeter};
pub use normalizer::{auto_true_peak, LoudnessNormalizer, OutputCodec};
pub use types::{CorrectionTarget, LoudnessError, LoudnessMeasurement, LoudnessResult, PeakMode};
