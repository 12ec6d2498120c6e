//! Two-source progress estimation.
//!
//! The engine reports genuine progress only when it can (it needs the input
//! duration and emits status lines at its own pace). While it is silent a
//! synthetic filler creeps forward so the user sees movement. The value
//! reported is:
//!
//! ```text
//! effective = min(max(real, synthetic), ceiling)   while running
//! effective = 100                                   once complete
//! ```
//!
//! Decreases in real progress are ignored, the filler only advances on a
//! tick during which real progress did not move, and nothing is emitted
//! unless it is strictly above the last emitted value.

/// Blends engine-reported and synthetic progress for one extraction.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    ceiling: f64,
    real: f64,
    synthetic: f64,
    real_at_last_tick: f64,
    last_emitted: f64,
    completed: bool,
}

impl ProgressEstimator {
    pub fn new(ceiling: f64) -> Self {
        Self {
            ceiling: ceiling.clamp(0.0, 100.0),
            real: 0.0,
            synthetic: 0.0,
            real_at_last_tick: 0.0,
            last_emitted: 0.0,
            completed: false,
        }
    }

    /// Current effective value.
    pub fn value(&self) -> f64 {
        if self.completed {
            100.0
        } else {
            self.real.max(self.synthetic).min(self.ceiling)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Record engine-reported progress in percent.
    ///
    /// Returns the new effective value if it should be emitted.
    pub fn observe_engine(&mut self, percent: f64) -> Option<f64> {
        if self.completed || !percent.is_finite() {
            return None;
        }
        let percent = percent.clamp(0.0, 100.0);
        if percent > self.real {
            self.real = percent;
        }
        self.emit()
    }

    /// Advance the synthetic filler by `increment` if real progress stalled
    /// since the previous tick.
    pub fn tick(&mut self, increment: f64) -> Option<f64> {
        if self.completed {
            return None;
        }
        let stalled = self.real <= self.real_at_last_tick;
        self.real_at_last_tick = self.real;
        if !stalled || !increment.is_finite() || increment <= 0.0 {
            return None;
        }
        self.synthetic = (self.value() + increment).min(self.ceiling);
        self.emit()
    }

    /// The command finished; force 100.
    pub fn complete(&mut self) -> Option<f64> {
        self.completed = true;
        self.emit()
    }

    fn emit(&mut self) -> Option<f64> {
        let value = self.value();
        if value > self.last_emitted {
            self.last_emitted = value;
            Some(value)
        } else {
            None
        }
    }
}
