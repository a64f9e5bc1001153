//! Per-cell mana store with a pending-delta accumulator.
//!
//! Systems never write `current` directly. During the compute phase of a
//! tick they call [`ManaState::add_pending_change`]; the engine then commits
//! every cell once with [`ManaState::apply_pending_changes`].

use serde::{Deserialize, Serialize};

/// Threshold below which a cell counts as dormant
pub const DEFAULT_DORMANT_THRESHOLD: f32 = 0.1;

/// Inclusive bounds for a cell's mana
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManaBounds {
    pub min: f32,
    pub max: f32,
}

impl Default for ManaBounds {
    fn default() -> Self {
        Self { min: 0.0, max: 100.0 }
    }
}

impl ManaBounds {
    /// Finite, with `min <= max`
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }

    /// Bounds safe to clamp against. Inverted bounds collapse onto `min`;
    /// non-finite bounds fall back to the defaults.
    pub fn sanitized(self) -> Self {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Self::default();
        }
        Self {
            min: self.min,
            max: self.max.max(self.min),
        }
    }
}

/// Mana held by one cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManaState {
    current: f32,
    min: f32,
    max: f32,
    /// Only non-zero mid-tick, so it is never persisted
    #[serde(skip)]
    pending: f32,
}

impl ManaState {
    /// Starts at zero, or the nearest bound if zero is out of range.
    /// Bounds are passed through [`ManaBounds::sanitized`] first.
    pub fn new(bounds: ManaBounds) -> Self {
        let bounds = bounds.sanitized();
        Self {
            current: 0.0_f32.clamp(bounds.min, bounds.max),
            min: bounds.min,
            max: bounds.max,
            pending: 0.0,
        }
    }

    /// Bounds are valid and `current` is finite and inside them
    pub fn is_consistent(&self) -> bool {
        ManaBounds {
            min: self.min,
            max: self.max,
        }
        .is_valid()
            && self.current.is_finite()
            && self.current >= self.min
            && self.current <= self.max
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn pending(&self) -> f32 {
        self.pending
    }

    /// Queue a change for the current tick. Bounds are not checked here.
    pub fn add_pending_change(&mut self, delta: f32) {
        self.pending += delta;
    }

    /// Commit the queued changes, clamping into bounds
    pub fn apply_pending_changes(&mut self) {
        self.current = (self.current + self.pending).clamp(self.min, self.max);
        self.pending = 0.0;
    }

    /// Set mana outright, discarding anything pending
    pub fn initialize(&mut self, value: f32) {
        self.current = value.clamp(self.min, self.max);
        self.pending = 0.0;
    }

    pub fn is_dormant(&self, threshold: f32) -> bool {
        self.current < threshold
    }

    pub fn is_overcharged(&self) -> bool {
        self.current >= self.max
    }

    /// Fill level in 0-1
    pub fn level(&self) -> f32 {
        let span = self.max - self.min;
        if span > 0.0 {
            ((self.current - self.min) / span).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl Default for ManaState {
    fn default() -> Self {
        Self::new(ManaBounds::default())
    }
}
