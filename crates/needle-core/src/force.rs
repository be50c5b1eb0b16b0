//! Amplitude → drive force mapping.
//!
//! The meter scale is in 6 dB steps: each major ruler mark is roughly double
//! the amplitude of the one before it. The mapping compresses the peak
//! logarithmically so that one unit of force spans the whole scale.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

/// Amplitude ratio of one 6 dB step (10^0.3 ≈ 1.995).
pub fn six_db() -> f32 {
    10f32.powf(0.3)
}

/// Number of 6 dB steps between the bottom of the visual-linear scale and
/// full scale.
pub const VISUAL_STEPS: f32 = 7.0;

/// Number of 6 dB steps spanned by the plain logarithmic scale.
pub const LOG_STEPS: f32 = 8.0;

/// Which curve turns a peak amplitude into a needle force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForceCurve {
    /// 7-step dB scale with an arctangent correction so the needle reads
    /// evenly against straight ruler marks.
    #[default]
    VisualLinear,
    /// Plain 8-step dB scale, no correction.
    Logarithmic,
}

impl ForceCurve {
    pub fn apply(self, peak: f32) -> f32 {
        match self {
            ForceCurve::VisualLinear => map_force(peak),
            ForceCurve::Logarithmic => map_force_logarithmic(peak),
        }
    }
}

/// Position on a dB scale of `steps` 6 dB steps, 0 at the floor and 1 at
/// full scale. Silence and anything below the floor clamp to 0.
fn db_position(peak: f32, steps: f32) -> f32 {
    let raw = (peak.ln() / six_db().ln() + steps) / steps;
    // f32::max drops NaN, so a NaN peak lands on 0 as well.
    raw.max(0.0)
}

/// Force for the visual-linear scale. `map_force(0) == 0`, `map_force(1) == 1`.
pub fn map_force(peak: f32) -> f32 {
    let raw = db_position(peak, VISUAL_STEPS);
    // Correct for straight ruler marks.
    ((raw * 2.0 - 1.0).atan() * (4.0 / PI) + 1.0) / 2.0
}

/// Force for the plain logarithmic scale.
pub fn map_force_logarithmic(peak: f32) -> f32 {
    db_position(peak, LOG_STEPS)
}
