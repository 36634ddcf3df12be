//! Bounded, adaptively updated confidence that a script passes on a node.
//!
//! The value is driven by an integer step: `atan(step) / π + 0.5`. Step 0
//! is the neutral 0.5; passes push it towards 1 and failures towards 0
//! without ever reaching either. Static scripts bypass the curve and pin
//! the value to exactly 0 or 1 once their outcome is known.

use std::f64::consts::PI;

/// Largest value reachable through `increase`.
const CEILING: f64 = 1.0 - f64::EPSILON;
/// Smallest value reachable through `decrease`.
const FLOOR: f64 = f64::MIN_POSITIVE;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probability {
    step: i64,
    value: f64,
}

impl Probability {
    pub fn new() -> Self {
        Self {
            step: 0,
            value: Self::default_value(),
        }
    }

    /// Confidence used when nothing is known about a (script, node) pair.
    pub fn default_value() -> f64 {
        0.5
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    pub fn increase(&mut self) {
        self.step = self.step.saturating_add(1);
        self.recompute();
    }

    pub fn decrease(&mut self) {
        self.step = self.step.saturating_sub(1);
        self.recompute();
    }

    /// Pin to exactly 1 (`passed`) or exactly 0.
    pub fn set_certain(&mut self, passed: bool) {
        self.value = if passed { 1.0 } else { 0.0 };
    }

    pub fn is_certain_pass(&self) -> bool {
        self.value == 1.0
    }

    pub fn is_certain_fail(&self) -> bool {
        self.value == 0.0
    }

    fn recompute(&mut self) {
        // Far out on the curve f64 rounds to the bounds; the open interval
        // must hold for any step count.
        self.value = ((self.step as f64).atan() / PI + 0.5).clamp(FLOOR, CEILING);
    }
}

impl Default for Probability {
    fn default() -> Self {
        Self::new()
    }
}
