//! Per-load state machine (spec.md §4.8) and the grace/pause timers that
//! drive its `GraceHold`/`Paused` transitions. Lives outside the pure
//! engine: mutated once per command tick by `runtime::tick`, never read by
//! `engine::calculate` itself. Registry shape grounded on
//! `controller::safety_monitor::SafetyMonitor`'s struct-owns-state-behind-
//! one-lock pattern, keyed per load the way the teacher keys per device.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Eligible,
    Active,
    GraceHold,
    Paused,
    Faulted,
}

#[derive(Debug, Clone)]
pub struct LoadRuntimeState {
    pub state: LoadState,
    grace_deadline: Option<DateTime<Utc>>,
    pause_until: Option<DateTime<Utc>>,
}

impl Default for LoadRuntimeState {
    fn default() -> Self {
        Self {
            state: LoadState::Idle,
            grace_deadline: None,
            pause_until: None,
        }
    }
}

impl LoadRuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the state machine for one command tick.
    ///
    /// - `is_eligible`: `LoadContext::is_allocation_eligible()` this tick.
    /// - `is_faulted`: `LoadContext::is_faulted()` this tick.
    /// - `ceiling_met_minimum`: whether Step 4/5 would grant at least
    ///   `min_current_a` absent any grace hold.
    pub fn advance(
        &mut self,
        is_eligible: bool,
        is_faulted: bool,
        ceiling_met_minimum: bool,
        now: DateTime<Utc>,
        grace_period: Duration,
        pause_duration: Duration,
    ) -> LoadState {
        if is_faulted {
            self.state = LoadState::Faulted;
            self.grace_deadline = None;
            return self.state;
        }

        self.state = match self.state {
            LoadState::Idle | LoadState::Faulted => {
                if is_eligible {
                    LoadState::Eligible
                } else {
                    LoadState::Idle
                }
            }
            LoadState::Eligible => {
                if !is_eligible {
                    LoadState::Idle
                } else if ceiling_met_minimum {
                    LoadState::Active
                } else {
                    LoadState::Eligible
                }
            }
            LoadState::Active => {
                if !is_eligible {
                    LoadState::Idle
                } else if !ceiling_met_minimum {
                    self.grace_deadline = Some(now + to_chrono(grace_period));
                    LoadState::GraceHold
                } else {
                    LoadState::Active
                }
            }
            LoadState::GraceHold => {
                if !is_eligible {
                    self.grace_deadline = None;
                    LoadState::Idle
                } else if ceiling_met_minimum {
                    self.grace_deadline = None;
                    LoadState::Active
                } else if self.grace_deadline.map_or(true, |deadline| now >= deadline) {
                    self.grace_deadline = None;
                    self.pause_until = Some(now + to_chrono(pause_duration));
                    LoadState::Paused
                } else {
                    LoadState::GraceHold
                }
            }
            LoadState::Paused => {
                if !is_eligible {
                    self.pause_until = None;
                    LoadState::Idle
                } else if ceiling_met_minimum && self.pause_until.map_or(true, |until| now >= until) {
                    self.pause_until = None;
                    LoadState::Active
                } else {
                    LoadState::Paused
                }
            }
        };

        self.state
    }

    /// True while `GraceHold` should force the output to `min_current_a`
    /// regardless of what Step 4/5 computed this tick.
    pub fn holds_at_minimum(&self) -> bool {
        self.state == LoadState::GraceHold
    }

    /// True while re-activation is withheld even though mode conditions
    /// would otherwise allow it (the `charge_pause_duration` hold).
    pub fn blocks_reactivation(&self, now: DateTime<Utc>) -> bool {
        self.state == LoadState::Paused && self.pause_until.is_some_and(|until| now < until)
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero())
}

/// Every load's runtime state, keyed by load id, behind a single coarse
/// lock (spec.md §5: "the site holds a single coarse lock over all load
/// state" is an accepted option when ticks aren't already serialized).
#[derive(Debug, Default)]
pub struct HubRuntimeState {
    loads: Mutex<HashMap<String, LoadRuntimeState>>,
}

impl HubRuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_load<R>(&self, load_id: &str, f: impl FnOnce(&mut LoadRuntimeState) -> R) -> R {
        let mut loads = self.loads.lock();
        let entry = loads.entry(load_id.to_string()).or_default();
        f(entry)
    }

    pub fn snapshot(&self, load_id: &str) -> LoadRuntimeState {
        self.loads.lock().get(load_id).cloned().unwrap_or_default()
    }
}
