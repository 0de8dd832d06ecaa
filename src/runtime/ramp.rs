//! Rate-limits a load's output current between ticks (spec.md §4.7): a
//! Schmitt dead-band suppresses chatter from sub-threshold noise, and an
//! asymmetric up/down ramp caps how fast current may actually move once a
//! real change is accepted. Same per-load, carried-state shape as
//! `controller::pid::PidController::update`.

#[derive(Debug, Clone)]
pub struct RampLimiter {
    up_rate_a_per_s: f64,
    down_rate_a_per_s: f64,
    dead_band_a: f64,
    last_output_a: f64,
}

impl RampLimiter {
    pub fn new(up_rate_a_per_s: f64, down_rate_a_per_s: f64, dead_band_a: f64) -> Self {
        Self {
            up_rate_a_per_s,
            down_rate_a_per_s,
            dead_band_a,
            last_output_a: 0.0,
        }
    }

    /// Force the limiter's state, e.g. when a connector transitions and the
    /// previous output is no longer meaningful.
    pub fn reset(&mut self, value_a: f64) {
        self.last_output_a = value_a;
    }

    pub fn last_output_a(&self) -> f64 {
        self.last_output_a
    }

    /// Move toward `target_a`, respecting the dead-band and ramp rate.
    /// `min_current_a` is the load's own minimum — a change that crosses it
    /// (an EVSE starting or stopping current entirely) is never suppressed
    /// by the dead-band even if the crossing itself is small.
    pub fn apply(&mut self, target_a: f64, dt_seconds: f64, min_current_a: f64) -> f64 {
        let delta = target_a - self.last_output_a;

        if delta.abs() < self.dead_band_a && !crosses_threshold(self.last_output_a, target_a, min_current_a) {
            return self.last_output_a;
        }

        let max_step = if delta >= 0.0 {
            self.up_rate_a_per_s * dt_seconds
        } else {
            self.down_rate_a_per_s * dt_seconds
        };
        let step = delta.clamp(-max_step, max_step);

        self.last_output_a += step;
        self.last_output_a
    }
}

fn crosses_threshold(from_a: f64, to_a: f64, threshold_a: f64) -> bool {
    (from_a < threshold_a) != (to_a < threshold_a)
}
