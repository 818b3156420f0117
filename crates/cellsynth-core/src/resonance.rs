//! Harmonic affinity between two frequencies.
//!
//! The score peaks when the ratio of the higher to the lower frequency lands
//! on an integer (unison, octave, twelfth, ...) and falls off smoothly towards
//! the half-integer points in between.

use serde::{Deserialize, Serialize};

use crate::cell::is_tone;

/// Output range of the resonance score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResonanceRange {
    /// Scores in `[0, 1]`; dissonant neighbors contribute nothing.
    #[default]
    Unipolar,
    /// Scores in `[-1, 1]`; dissonant neighbors drain energy.
    Bipolar,
}

impl ResonanceRange {
    /// Inclusive `(min, max)` bounds of the score.
    #[must_use]
    pub const fn bounds(self) -> (f32, f32) {
        match self {
            Self::Unipolar => (0.0, 1.0),
            Self::Bipolar => (-1.0, 1.0),
        }
    }
}

/// Tuning knobs for [`resonance`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResonanceConfig {
    /// Exponent applied to the triangular distance-to-integer curve; larger is narrower.
    pub sharpness: f32,
    /// Higher partials are attenuated by `round(ratio)^-harmonic_falloff`.
    pub harmonic_falloff: f32,
    pub range: ResonanceRange,
}

impl Default for ResonanceConfig {
    fn default() -> Self {
        Self {
            sharpness: 4.0,
            harmonic_falloff: 0.0,
            range: ResonanceRange::Unipolar,
        }
    }
}

impl ResonanceConfig {
    #[must_use]
    pub const fn bounds(&self) -> (f32, f32) {
        self.range.bounds()
    }
}

/// Harmonic affinity of two frequencies, or `None` when either is not a tone.
///
/// Symmetric in its arguments and bounded by [`ResonanceConfig::bounds`].
#[must_use]
pub fn resonance(a: f32, b: f32, config: &ResonanceConfig) -> Option<f32> {
    if !is_tone(a) || !is_tone(b) {
        return None;
    }
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    let ratio = high / low;
    if !ratio.is_finite() {
        return None;
    }

    let nearest = ratio.round().max(1.0);
    let distance = (ratio - nearest).abs().min(0.5);
    let mut peak = (1.0 - 2.0 * distance).clamp(0.0, 1.0).powf(config.sharpness);
    if config.harmonic_falloff > 0.0 {
        peak /= nearest.powf(config.harmonic_falloff);
    }

    let score = match config.range {
        ResonanceRange::Unipolar => peak,
        ResonanceRange::Bipolar => 2.0 * peak - 1.0,
    };
    let (min, max) = config.bounds();
    Some(score.clamp(min, max))
}
