//! Fade curves for releasing an audible sound
//!
//! A sound that is still playing when it gets replaced is faded out before it
//! is unloaded. Backends that mix their own samples (the desktop output) use
//! [`FadeRamp`] to apply the curve per frame.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Fade curve type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// Linear ramp
    Linear,

    /// Square root ramp: drops slowly at first, then quickly
    SquareRoot,

    /// S-Curve: slow start, fast middle, slow end
    SCurve,

    /// Equal power: constant perceived loudness change
    #[default]
    EqualPower,
}

impl FadeCurve {
    /// Gain at a normalized position in the fade
    ///
    /// # Arguments
    /// * `position` - Normalized position in the fade (0.0 to 1.0)
    /// * `fade_out` - If true, calculates fade-out gain; if false, fade-in gain
    #[inline]
    pub fn calculate_gain(&self, position: f32, fade_out: bool) -> f32 {
        let position = position.clamp(0.0, 1.0);
        let t = if fade_out { 1.0 - position } else { position };

        match self {
            FadeCurve::Linear => t,
            FadeCurve::SquareRoot => {
                if t <= 0.0 {
                    0.0
                } else {
                    t.sqrt()
                }
            }
            FadeCurve::SCurve => (1.0 - (PI * t).cos()) * 0.5,
            FadeCurve::EqualPower => (t * PI * 0.5).sin(),
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "Linear",
            FadeCurve::SquareRoot => "Square Root",
            FadeCurve::SCurve => "S-Curve",
            FadeCurve::EqualPower => "Equal Power",
        }
    }
}

/// Per-frame fade-out progress
#[derive(Debug, Clone)]
pub struct FadeRamp {
    curve: FadeCurve,
    total_frames: usize,
    elapsed_frames: usize,
}

impl FadeRamp {
    /// Fade out over `total_frames` output frames
    pub fn new(curve: FadeCurve, total_frames: usize) -> Self {
        Self {
            curve,
            total_frames,
            elapsed_frames: 0,
        }
    }

    /// Frame count for a duration at a sample rate
    pub fn frames_for(duration: std::time::Duration, sample_rate: u32) -> usize {
        (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize
    }

    /// Gain for the next frame; advances the ramp
    pub fn next_gain(&mut self) -> f32 {
        if self.is_complete() {
            return 0.0;
        }
        let position = self.elapsed_frames as f32 / self.total_frames as f32;
        self.elapsed_frames += 1;
        self.curve.calculate_gain(position, true)
    }

    /// Whether the ramp reached silence
    pub fn is_complete(&self) -> bool {
        self.elapsed_frames >= self.total_frames
    }

    /// Progress from 0.0 to 1.0
    pub fn progress(&self) -> f32 {
        if self.total_frames == 0 {
            1.0
        } else {
            (self.elapsed_frames as f32 / self.total_frames as f32).min(1.0)
        }
    }
}
