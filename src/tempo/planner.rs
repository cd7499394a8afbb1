//! # Retempo Planning
//!
//! Turns raw request input (original filename, optional source override,
//! target tempo text) into a validated `RetempoPlan`. All input checks happen
//! here, before any decomposition, so a rejected request never produces a
//! partial chain.

use super::{decompose, extract_tempo, StageChain, TempoError};
use serde::Serialize;

/// Where the source tempo of a plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TempoSource {
    /// Read out of the uploaded file's name
    Filename,
    /// Supplied explicitly by the caller
    Override,
}

/// Everything needed to re-tempo one upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetempoPlan {
    pub source_bpm: f64,
    pub source: TempoSource,
    pub target_bpm: f64,
    pub ratio: f64,
    pub stages: StageChain,
}

impl RetempoPlan {
    /// ffmpeg `-filter:a` argument for this plan.
    pub fn filter_chain(&self) -> String {
        self.stages.to_filter_chain()
    }
}

/// Validate request input and build a plan.
///
/// ## Parameters:
/// - **filename**: original name of the upload, used when no override is given
/// - **source_override**: optional explicit source tempo; empty text counts as absent
/// - **target**: target tempo text as received from the form or query string
///
/// ## Errors:
/// - `InvalidTarget` if the target is missing or not a positive finite number
/// - `InvalidSource` if an override was given but is not a positive finite number
/// - `UnresolvableTempo` if no override was given and the filename has no usable tempo
/// - `InvalidRatio` if `target / source` is outside the decomposer's range
pub fn plan(
    filename: &str,
    source_override: Option<&str>,
    target: Option<&str>,
) -> Result<RetempoPlan, TempoError> {
    let target_text = target.unwrap_or("");
    let target_bpm = parse_tempo(target_text).ok_or_else(|| TempoError::InvalidTarget {
        input: target_text.to_string(),
    })?;

    let (source_bpm, source) = match source_override.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => {
            let bpm = parse_tempo(text).ok_or_else(|| TempoError::InvalidSource {
                input: text.to_string(),
            })?;
            (bpm, TempoSource::Override)
        }
        None => {
            let bpm = extract_tempo(filename)
                .filter(|&bpm| bpm > 0)
                .ok_or_else(|| TempoError::UnresolvableTempo {
                    filename: filename.to_string(),
                })?;
            (f64::from(bpm), TempoSource::Filename)
        }
    };

    let ratio = target_bpm / source_bpm;
    let stages = decompose(ratio)?;

    tracing::debug!(
        filename = %filename,
        source_bpm,
        target_bpm,
        ratio,
        stages = stages.len(),
        "Planned tempo change"
    );

    Ok(RetempoPlan {
        source_bpm,
        source,
        target_bpm,
        ratio,
        stages,
    })
}

/// Strict numeric parse: no trailing units, must be finite and above zero.
fn parse_tempo(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|bpm| bpm.is_finite() && *bpm > 0.0)
}
