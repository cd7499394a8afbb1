//! # Stage Decomposition
//!
//! ffmpeg's `atempo` filter only accepts a factor in `[0.5, 2.0]`. Larger
//! changes are made by chaining several filters, so a speed ratio is peeled
//! into full-octave stages followed by one remainder stage.
//!
//! ## Algorithm (multiplicative peeling):
//! 1. While the remaining ratio is above 2.0, emit `2.0` and halve it
//! 2. While the remaining ratio is below 0.5, emit `0.5` and double it
//! 3. Emit the remainder rounded to two decimals
//!
//! ## Precision:
//! Only the final stage is rounded, so the chain product can drift from the
//! requested ratio by up to `0.005` times the product of the leading stages.
//! Relative to the final stage that is at most 1% (0.5% once the remainder
//! is at or above 1.0). The drift is accepted and never corrected.

use super::TempoError;
use serde::Serialize;

/// Smallest factor a single `atempo` stage accepts.
pub const MIN_STAGE: f64 = 0.5;

/// Largest factor a single `atempo` stage accepts.
pub const MAX_STAGE: f64 = 2.0;

/// Ratios outside `[MIN_RATIO, MAX_RATIO]` are rejected up front. Inside the
/// bounds the peeling loop runs at most 20 times.
pub const MIN_RATIO: f64 = 1e-6;
pub const MAX_RATIO: f64 = 1e6;

/// Ordered list of `atempo` factors, applied first to last.
///
/// Never empty; every element lies in `[MIN_STAGE, MAX_STAGE]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StageChain {
    stages: Vec<f64>,
}

impl StageChain {
    pub fn stages(&self) -> &[f64] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Net speed change once every stage has been applied.
    pub fn product(&self) -> f64 {
        self.stages.iter().product()
    }

    /// Render the chain as an ffmpeg audio filter graph, e.g.
    /// `atempo=2.00,atempo=1.25`.
    pub fn to_filter_chain(&self) -> String {
        self.stages
            .iter()
            .map(|stage| format!("atempo={:.2}", stage))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Split `ratio` into a chain of `atempo` stages whose product is `ratio`
/// (up to the final-stage rounding described in the module docs).
///
/// ## Errors:
/// `TempoError::InvalidRatio` when `ratio` is NaN, infinite, non-positive or
/// outside `[MIN_RATIO, MAX_RATIO]`.
///
/// ## Example:
/// ```text
/// decompose(5.0)    => [2.00, 2.00, 1.25]
/// decompose(1.0/3.0) => [0.50, 0.67]
/// ```
pub fn decompose(ratio: f64) -> Result<StageChain, TempoError> {
    if !ratio.is_finite() || !(MIN_RATIO..=MAX_RATIO).contains(&ratio) {
        return Err(TempoError::InvalidRatio { ratio });
    }

    let mut stages = Vec::new();
    let mut remaining = ratio;

    while remaining > MAX_STAGE {
        stages.push(MAX_STAGE);
        remaining /= MAX_STAGE;
    }
    while remaining < MIN_STAGE {
        stages.push(MIN_STAGE);
        remaining /= MIN_STAGE;
    }

    stages.push(round_to_hundredths(remaining));

    Ok(StageChain { stages })
}

/// Two decimals is the precision the filter string carries.
fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_in_range_ratio_is_single_stage() {
        let mut ratio = MIN_STAGE;
        while ratio <= MAX_STAGE {
            let chain = decompose(ratio).unwrap();
            assert_eq!(chain.len(), 1, "ratio {}", ratio);
            assert_abs_diff_eq!(chain.stages()[0], ratio, epsilon = 0.005 + 1e-9);
            ratio += 0.037;
        }
        assert_eq!(decompose(2.0).unwrap().stages(), &[2.0]);
        assert_eq!(decompose(0.5).unwrap().stages(), &[0.5]);
    }

    #[test]
    fn test_unit_ratio_is_noop_stage() {
        let chain = decompose(1.0).unwrap();
        assert_eq!(chain.stages(), &[1.0]);
        assert_eq!(chain.to_filter_chain(), "atempo=1.00");
    }

    #[test]
    fn test_large_ratio_leads_with_doubling() {
        let chain = decompose(5.0).unwrap();
        assert_eq!(chain.stages(), &[2.0, 2.0, 1.25]);

        let chain = decompose(37.0).unwrap();
        let (last, leading) = chain.stages().split_last().unwrap();
        assert!(leading.iter().all(|&s| s == MAX_STAGE));
        let k = leading.len() as i32;
        assert_abs_diff_eq!(2f64.powi(k) * last, 37.0, epsilon = 2f64.powi(k) * 0.005);
    }

    #[test]
    fn test_small_ratio_leads_with_halving() {
        let chain = decompose(30.0 / 90.0).unwrap();
        assert_eq!(chain.stages(), &[0.5, 0.67]);

        let chain = decompose(0.01).unwrap();
        let (last, leading) = chain.stages().split_last().unwrap();
        assert!(leading.iter().all(|&s| s == MIN_STAGE));
        let k = leading.len() as i32;
        assert_abs_diff_eq!(0.5f64.powi(k) * last, 0.01, epsilon = 0.5f64.powi(k) * 0.005);
    }

    #[test]
    fn test_every_stage_within_bounds() {
        for ratio in [1e-6, 0.0013, 0.26, 0.4999, 2.0001, 3.9, 640.0, 1e6] {
            let chain = decompose(ratio).unwrap();
            assert!(chain.len() >= 1);
            for &stage in chain.stages() {
                assert!((MIN_STAGE..=MAX_STAGE).contains(&stage), "ratio {} stage {}", ratio, stage);
            }
        }
    }

    #[test]
    fn test_product_tracks_ratio() {
        for ratio in [0.07, 0.333, 0.75, 1.5, 2.5, 4.2, 9.99, 123.4] {
            let chain = decompose(ratio).unwrap();
            let leading: f64 = chain.stages()[..chain.len() - 1].iter().product();
            assert_abs_diff_eq!(chain.product(), ratio, epsilon = leading * 0.005 + 1e-9);
        }
    }

    #[test]
    fn test_rejects_bad_ratios() {
        for ratio in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e-7, 1e7] {
            assert!(
                matches!(decompose(ratio), Err(TempoError::InvalidRatio { .. })),
                "ratio {} should be rejected",
                ratio
            );
        }
    }

    #[test]
    fn test_filter_chain_format() {
        let chain = decompose(5.0).unwrap();
        assert_eq!(chain.to_filter_chain(), "atempo=2.00,atempo=2.00,atempo=1.25");
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let chain = decompose(5.0).unwrap();
        assert_eq!(serde_json::to_string(&chain).unwrap(), "[2.0,2.0,1.25]");
    }
}
