//! Volume control
//!
//! The stored level is the linear 0.0-1.0 value the listener chose and the
//! one that gets persisted. Muting silences output without losing it.

/// Volume level plus mute flag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume {
    /// Volume level (0.0-1.0)
    level: f32,

    /// Mute state (preserves volume level)
    muted: bool,
}

impl Volume {
    /// Create new volume controller; out-of-range input is clamped, non-finite input becomes 0.5
    pub fn new(level: f32) -> Self {
        let level = if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            0.5
        };
        Self {
            level,
            muted: false,
        }
    }

    /// Set volume level (0.0-1.0)
    ///
    /// Clamps out-of-range values and ignores NaN/infinity. Returns whether
    /// the stored level changed.
    pub fn set_level(&mut self, level: f32) -> bool {
        if !level.is_finite() {
            return false;
        }
        let level = level.clamp(0.0, 1.0);
        if (level - self.level).abs() < f32::EPSILON {
            return false;
        }
        self.level = level;
        true
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn mute(&mut self) {
        self.muted = true;
    }

    pub fn unmute(&mut self) {
        self.muted = false;
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Gain to hand to the media element; 0.0 if muted
    pub fn gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.level
        }
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(0.5)
    }
}
