//! # Tempo Core
//!
//! Pure, synchronous tempo math used by the upload handlers. Nothing in here
//! touches the filesystem, spawns processes, or holds shared state, so every
//! function can be called concurrently from any actix worker.
//!
//! ## Components:
//! - **extractor**: infers a source tempo (BPM) from an uploaded file's name
//! - **decomposer**: splits a speed ratio into a chain of `atempo`-sized stages
//! - **planner**: validates request input and ties the two together
//!
//! ## Data flow:
//! ```text
//! filename ──► extract_tempo ──► source bpm ─┐
//!                                            ├─► ratio ──► decompose ──► StageChain
//! targetBpm ──────────────────► target bpm ──┘
//! ```

pub mod decomposer;
pub mod extractor;
pub mod planner;

pub use decomposer::{decompose, StageChain};
pub use extractor::extract_tempo;
pub use planner::{plan, RetempoPlan};

use std::fmt;

/// Reasons a tempo request cannot be turned into a stage chain.
///
/// Every variant is terminal for the request: the input is deterministic, so
/// retrying would give the same answer.
#[derive(Debug, Clone, PartialEq)]
pub enum TempoError {
    /// No usable 2-3 digit run in the filename (or the run was zero)
    UnresolvableTempo { filename: String },

    /// Target tempo missing, non-numeric, zero, negative or non-finite
    InvalidTarget { input: String },

    /// Caller-supplied source tempo override could not be used
    InvalidSource { input: String },

    /// Speed ratio outside the range the decomposer accepts
    InvalidRatio { ratio: f64 },
}

impl TempoError {
    /// Machine-readable error type used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            TempoError::UnresolvableTempo { .. } => "unresolvable_tempo",
            TempoError::InvalidTarget { .. } => "invalid_target",
            TempoError::InvalidSource { .. } => "invalid_source",
            TempoError::InvalidRatio { .. } => "invalid_ratio",
        }
    }
}

impl fmt::Display for TempoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TempoError::UnresolvableTempo { filename } => write!(
                f,
                "could not infer a tempo from filename '{}' (expected a 2-3 digit BPM in the name)",
                filename
            ),
            TempoError::InvalidTarget { input } => write!(
                f,
                "target tempo '{}' is not a positive number",
                input
            ),
            TempoError::InvalidSource { input } => write!(
                f,
                "source tempo '{}' is not a positive number",
                input
            ),
            TempoError::InvalidRatio { ratio } => write!(
                f,
                "speed ratio {} is outside the supported range [{}, {}]",
                ratio,
                decomposer::MIN_RATIO,
                decomposer::MAX_RATIO
            ),
        }
    }
}

impl std::error::Error for TempoError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_error_kinds_are_distinct() {
        let errors = [
            TempoError::UnresolvableTempo { filename: "a.mp3".into() },
            TempoError::InvalidTarget { input: "x".into() },
            TempoError::InvalidSource { input: "y".into() },
            TempoError::InvalidRatio { ratio: 0.0 },
        ];
        let kinds: HashSet<_> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_error_messages_name_the_input() {
        let err = TempoError::UnresolvableTempo { filename: "audio.mp3".into() };
        assert!(err.to_string().contains("audio.mp3"));

        let err = TempoError::InvalidTarget { input: "fast".into() };
        assert!(err.to_string().contains("fast"));
    }
}
