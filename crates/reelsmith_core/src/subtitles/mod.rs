//! Caption cue layout and SRT output.
//!
//! # Usage
//!
//! ```ignore
//! use reelsmith_core::subtitles::{segments_to_cues, write_srt_file, CaptionLayout, RoundingMode};
//!
//! let cues = segments_to_cues(&segments, CaptionLayout::default());
//! write_srt_file(&cues, "talk_captions.srt".as_ref(), RoundingMode::Round)?;
//! ```

mod error;
mod layout;
mod srt;
mod types;

pub use error::SubtitleError;
pub use layout::{segment_to_cues, segments_to_cues};
pub use srt::{format_srt_time, write_srt, write_srt_file};
pub use types::{CaptionLayout, Cue, RoundingMode};
