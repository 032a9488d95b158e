//! Breaking transcript segments into caption cues.

use super::types::{CaptionLayout, Cue};
use crate::transcribe::TranscriptSegment;

/// Split one segment into cues.
///
/// Words are accumulated until the cue reaches `max_words` words or its
/// text reaches `max_chars` characters. Each cue spans from its first
/// word's start to its last word's end. A segment without word timings
/// becomes a single cue with the segment's own timing.
pub fn segment_to_cues(segment: &TranscriptSegment, layout: CaptionLayout) -> Vec<Cue> {
    if segment.words.is_empty() {
        let text = segment.text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        return vec![Cue::from_seconds(segment.start, segment.end, text)];
    }

    let max_words = layout.max_words.max(1);
    let max_chars = layout.max_chars.max(1);

    let mut cues = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut start = 0.0;
    let mut end = 0.0;

    for word in &segment.words {
        let text = word.word.trim();
        if text.is_empty() {
            continue;
        }
        if current.is_empty() {
            start = word.start;
        }
        current.push(text);
        end = word.end;

        let line = current.join(" ");
        if current.len() >= max_words || line.chars().count() >= max_chars {
            cues.push(Cue::from_seconds(start, end, line));
            current.clear();
        }
    }

    if !current.is_empty() {
        cues.push(Cue::from_seconds(start, end, current.join(" ")));
    }

    cues
}

/// Split every segment, preserving order.
pub fn segments_to_cues(segments: &[TranscriptSegment], layout: CaptionLayout) -> Vec<Cue> {
    segments
        .iter()
        .flat_map(|s| segment_to_cues(s, layout))
        .collect()
}
