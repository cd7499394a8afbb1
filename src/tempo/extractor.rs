//! # Filename Tempo Extraction
//!
//! Producers usually put the BPM in the file name (`track_128_final.wav`),
//! so the source tempo is read from there.
//!
//! ## Matching policy:
//! - Scan left to right for the first position followed by at least two ASCII digits
//! - Take digits greedily, capped at three
//! - A longer run is cut after three digits: `mix2024.wav` → `202`
//! - A single digit on its own is skipped: `a1_b23.wav` → `23`
//!
//! The first match wins even when it is a track number or part of a year.
//! Callers that need exact tempos should send an explicit source tempo instead.

use once_cell::sync::Lazy;
use regex::Regex;

/// ASCII only; `\d` would also match other Unicode digit classes.
static TEMPO_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]{2,3}").expect("tempo pattern is valid")
});

/// Infer a tempo in BPM from a file name.
///
/// Returns `None` when the name holds no run of two or three digits.
/// A zero-valued run such as `"00"` is returned as `Some(0)`; the planner
/// decides whether that is usable.
pub fn extract_tempo(filename: &str) -> Option<u32> {
    TEMPO_RUN
        .find(filename)
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_between_separators() {
        assert_eq!(extract_tempo("track_128_final.wav"), Some(128));
        assert_eq!(extract_tempo("90bpm loop.mp3"), Some(90));
    }

    #[test]
    fn test_no_digits_is_absent() {
        assert_eq!(extract_tempo("song.mp3"), None);
        assert_eq!(extract_tempo("audio.mp3"), None);
        assert_eq!(extract_tempo(""), None);
    }

    #[test]
    fn test_single_digits_are_skipped() {
        assert_eq!(extract_tempo("take 1 of 5.wav"), None);
        assert_eq!(extract_tempo("a1_b23.wav"), Some(23));
    }

    #[test]
    fn test_long_run_is_cut_at_three_digits() {
        assert_eq!(extract_tempo("mix2024.wav"), Some(202));
        assert_eq!(extract_tempo("12345.mp3"), Some(123));
    }

    #[test]
    fn test_first_match_wins() {
        // Track number shadows the real tempo; documented behaviour.
        assert_eq!(extract_tempo("07 - groove 120.mp3"), Some(7));
        assert_eq!(extract_tempo("session 12 - 140bpm.wav"), Some(12));
    }

    #[test]
    fn test_non_ascii_digits_ignored() {
        // Arabic-Indic digits are not tempo markers.
        assert_eq!(extract_tempo("\u{0661}\u{0662}\u{0660} beat.wav"), None);
    }

    #[test]
    fn test_zero_run_is_reported() {
        assert_eq!(extract_tempo("loop_00.wav"), Some(0));
    }
}
