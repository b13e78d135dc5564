//! Scaling estimator: negative feedback on recent crash points.
//!
//! The estimator nudges the crash distribution toward the target
//! return-to-player ratio by looking at the mean of the most recent
//! crash points. It is advisory tuning only - a known approximation,
//! not a strict RTP guarantee.

/// Target long-run return-to-player ratio the feedback aims at.
pub const TARGET_RTP: f64 = 0.97;

/// How many recent rounds feed the estimator.
pub const SCALING_WINDOW: usize = 10;

/// Players have been winning too much recently above this mean.
const HIGH_MEAN: f64 = 3.0;

/// Crash points have been starving players below this mean.
const LOW_MEAN: f64 = 1.5;

const COOL: f64 = 1.2;
const HEAT: f64 = 0.9;
const NEUTRAL: f64 = 1.0;

/// Compute the scaling factor from the most recent crash points
/// (newest first, at most [`SCALING_WINDOW`] entries).
///
/// No history yields the neutral factor. A hot run (mean above 3.0)
/// biases toward lower crash points; a cold run (mean below 1.5)
/// biases toward higher ones.
pub fn calculate_scaling_factor(recent_crash_points: &[f64]) -> f64 {
    if recent_crash_points.is_empty() {
        return NEUTRAL;
    }

    let mean: f64 =
        recent_crash_points.iter().sum::<f64>() / recent_crash_points.len() as f64;

    if mean > HIGH_MEAN {
        COOL
    } else if mean < LOW_MEAN {
        HEAT
    } else {
        NEUTRAL
    }
}
