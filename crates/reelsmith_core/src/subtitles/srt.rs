//! SRT subtitle writer.
//!
//! SRT uses millisecond timing (HH:MM:SS,mmm). Float milliseconds are
//! rounded according to the given [`RoundingMode`] at write time.

use std::fs;
use std::path::Path;

use super::types::{Cue, RoundingMode};
use super::SubtitleError;

/// Write cues to SRT format string.
///
/// Entries are numbered from 1 and separated by a blank line.
pub fn write_srt(cues: &[Cue], rounding: RoundingMode) -> String {
    let mut output = String::new();

    for (i, cue) in cues.iter().enumerate() {
        if i > 0 {
            output.push('\n');
        }

        output.push_str(&format!("{}\n", i + 1));

        let start = format_srt_time(cue.start_ms, rounding);
        let end = format_srt_time(cue.end_ms, rounding);
        output.push_str(&format!("{} --> {}\n", start, end));

        output.push_str(&cue.text);
        output.push('\n');
    }

    output
}

/// Write cues to an SRT file, replacing any existing file.
pub fn write_srt_file(cues: &[Cue], path: &Path, rounding: RoundingMode) -> Result<(), SubtitleError> {
    fs::write(path, write_srt(cues, rounding)).map_err(|source| SubtitleError::WriteError {
        path: path.to_path_buf(),
        source,
    })
}

/// Format milliseconds as SRT timestamp (HH:MM:SS,mmm).
pub fn format_srt_time(ms: f64, rounding: RoundingMode) -> String {
    let ms = rounding.apply(ms);
    let ms = ms.max(0.0) as u64;

    let millis = ms % 1000;
    let total_secs = ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;

    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0.0, RoundingMode::Round), "00:00:00,000");
        assert_eq!(format_srt_time(1500.0, RoundingMode::Round), "00:00:01,500");
        assert_eq!(format_srt_time(60000.0, RoundingMode::Round), "00:01:00,000");
        assert_eq!(
            format_srt_time(3_723_004.0, RoundingMode::Round),
            "01:02:03,004"
        );
        assert_eq!(format_srt_time(-20.0, RoundingMode::Round), "00:00:00,000");

        assert_eq!(format_srt_time(1234.5, RoundingMode::Floor), "00:00:01,234");
        assert_eq!(format_srt_time(1234.5, RoundingMode::Round), "00:00:01,235");
        assert_eq!(format_srt_time(1234.2, RoundingMode::Ceil), "00:00:01,235");
    }

    #[test]
    fn test_write_basic_srt() {
        let cues = vec![
            Cue::new(1000.0, 4000.0, "Hello, world!"),
            Cue::new(5000.0, 8000.0, "Second line."),
        ];

        let output = write_srt(&cues, RoundingMode::Round);
        let expected = "1\n00:00:01,000 --> 00:00:04,000\nHello, world!\n\n2\n00:00:05,000 --> 00:00:08,000\nSecond line.\n";
        assert_eq!(output, expected);
    }

    #[test]
    fn empty_cue_list_writes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.srt");
        write_srt_file(&[], &path, RoundingMode::Round).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
