//! Exponential moving average over a load's ceiling/allocation, so a single
//! noisy tick doesn't immediately swing a charger's target current. Each
//! load owns one `EmaFilter`, constructed once and fed a sample per tick —
//! the same stateful-filter shape as `controller::pid::PidController`, with
//! gains replaced by a single smoothing factor.

#[derive(Debug, Clone)]
pub struct EmaFilter {
    /// Smoothing factor in `[0, 1]`. 1.0 tracks the raw sample exactly;
    /// values near 0 smooth heavily.
    alpha: f64,
    value: Option<f64>,
}

impl EmaFilter {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            value: None,
        }
    }

    pub fn reset(&mut self) {
        self.value = None;
    }

    pub fn current(&self) -> Option<f64> {
        self.value
    }

    /// Feed one sample. `NaN`/infinite samples (a stale or faulted sensor
    /// reading) are rejected outright — the filter holds its last good
    /// value rather than being corrupted by a single bad tick.
    pub fn update(&mut self, raw: f64) -> f64 {
        if !raw.is_finite() {
            return self.value.unwrap_or(0.0);
        }

        let next = match self.value {
            None => raw,
            Some(previous) => self.alpha * raw + (1.0 - self.alpha) * previous,
        };
        self.value = Some(next);
        next
    }
}
