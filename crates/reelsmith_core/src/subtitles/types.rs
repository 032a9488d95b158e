//! Caption cue types.
//!
//! Cue timing is stored as `f64` milliseconds. Rounding to whole
//! milliseconds happens only at write time.

/// One SRT entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    /// Start time in milliseconds.
    pub start_ms: f64,
    /// End time in milliseconds.
    pub end_ms: f64,
    /// Display text (single line).
    pub text: String,
}

impl Cue {
    pub fn new(start_ms: f64, end_ms: f64, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    /// Build from second-based timestamps as produced by transcription.
    pub fn from_seconds(start_secs: f64, end_secs: f64, text: impl Into<String>) -> Self {
        Self::new(start_secs * 1000.0, end_secs * 1000.0, text)
    }

    /// Duration in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }
}

/// Line-breaking limits for caption cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptionLayout {
    /// Close a cue once it holds this many words.
    pub max_words: usize,
    /// Close a cue once its text reaches this many characters.
    pub max_chars: usize,
}

impl Default for CaptionLayout {
    fn default() -> Self {
        Self {
            max_words: 10,
            max_chars: 42,
        }
    }
}

/// Rounding applied when converting float milliseconds to SRT timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundingMode {
    /// Round down (floor) - may cut off start.
    Floor,
    /// Round to nearest.
    #[default]
    Round,
    /// Round up (ceil) - subtitle may show early.
    Ceil,
}

impl RoundingMode {
    /// Apply rounding to a millisecond value.
    pub fn apply(&self, ms: f64) -> f64 {
        match self {
            Self::Floor => ms.floor(),
            Self::Round => ms.round(),
            Self::Ceil => ms.ceil(),
        }
    }
}
