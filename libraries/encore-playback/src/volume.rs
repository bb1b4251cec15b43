//! Volume level with mute
//!
//! The level is a plain linear scalar in `[0, 1]` that survives track changes.
//! Muting keeps the level so unmuting restores it.

/// Volume controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume {
    /// Level (0.0 - 1.0)
    level: f32,

    /// Mute state (preserves level)
    muted: bool,
}

impl Volume {
    /// Create a volume at `level`, clamped to `[0, 1]`
    pub fn new(level: f32) -> Self {
        Self {
            level: Self::clamp(level),
            muted: false,
        }
    }

    /// Set level, clamped to `[0, 1]`
    pub fn set_level(&mut self, level: f32) {
        self.level = Self::clamp(level);
    }

    /// Current level
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Mute (level is kept)
    pub fn mute(&mut self) {
        self.muted = true;
    }

    /// Unmute
    pub fn unmute(&mut self) {
        self.muted = false;
    }

    /// Toggle mute state
    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    /// Check if muted
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Gain handed to the sound: 0.0 while muted
    pub fn gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.level
        }
    }

    fn clamp(level: f32) -> f32 {
        if level.is_nan() {
            0.0
        } else {
            level.clamp(0.0, 1.0)
        }
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(0.5)
    }
}
