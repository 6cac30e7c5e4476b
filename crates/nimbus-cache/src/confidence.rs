//! Success-rate estimation
//!
//! A running estimate of how often optimistic mutations are ultimately
//! confirmed. Purely advisory: the store uses it to label entries and the UI
//! uses it to weight trust display, it never affects commit/rollback
//! semantics.

use serde::Serialize;

/// Score bounds and steps, in hundredths. The score is stored as an integer
/// so repeated steps stay exact.
const START: u32 = 95;
const CEILING: u32 = 99;
const FLOOR: u32 = 70;
const COMMIT_STEP: u32 = 1;
const ROLLBACK_STEP: u32 = 5;

/// Coarse network-quality label derived from the success rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkQuality {
    /// Mutations are essentially always confirmed.
    Excellent,
    /// Occasional rollbacks.
    Good,
    /// Rollbacks are frequent enough to warrant visible caution.
    Degraded,
    /// At or near the floor; optimistic display should be muted.
    Poor,
}

/// Running success-rate estimate for optimistic mutations.
///
/// Starts at 0.95. Each confirmed commit adds 0.01 up to 0.99; each rollback
/// subtracts 0.05 down to 0.70. Five consecutive rollbacks from the start
/// land exactly on the floor.
#[derive(Debug, Clone)]
pub struct SuccessRateEstimator {
    score: u32,
}

impl SuccessRateEstimator {
    #[must_use]
    pub fn new() -> Self {
        Self { score: START }
    }

    /// The current estimate in `[0.70, 0.99]`.
    #[must_use]
    pub fn rate(&self) -> f64 {
        f64::from(self.score) / 100.0
    }

    /// Record a confirmed commit.
    pub fn record_commit(&mut self) {
        self.score = (self.score + COMMIT_STEP).min(CEILING);
    }

    /// Record a rollback.
    pub fn record_rollback(&mut self) {
        self.score = self.score.saturating_sub(ROLLBACK_STEP).max(FLOOR);
    }

    /// Classify the current rate for UI trust display.
    #[must_use]
    pub fn network_quality(&self) -> NetworkQuality {
        match self.score {
            95.. => NetworkQuality::Excellent,
            85..=94 => NetworkQuality::Good,
            75..=84 => NetworkQuality::Degraded,
            _ => NetworkQuality::Poor,
        }
    }
}

impl Default for SuccessRateEstimator {
    fn default() -> Self {
        Self::new()
    }
}
