use serde::{Deserialize, Serialize};

use super::load::LoadContext;
use super::phase::PhaseValues;

/// How the distribution step (§4.6) allocates remaining pool capacity once
/// every load has received its `min_current`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionMode {
    /// Remaining capacity split equally among loads already at minimum.
    Shared,
    /// Remaining capacity walked in priority order, each load maximized
    /// before the next is considered.
    Priority,
    /// Single priority-ordered pass; lower-priority loads may receive
    /// leftover even when a higher-priority load didn't reach its max.
    Optimized,
    /// Single priority-ordered pass; load N only receives current if load
    /// N-1 reached its own `max_current`.
    Strict,
}

impl Default for DistributionMode {
    fn default() -> Self {
        DistributionMode::Shared
    }
}

/// Battery inputs, present only on sites with a home battery.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryContext {
    /// State of charge, percent.
    pub soc: f64,
    /// Minimum SOC below which discharge for loads is disallowed.
    pub soc_min: f64,
    /// Target SOC; above this the battery may discharge to loads, below it
    /// the battery has first claim on solar.
    pub soc_target: f64,
    /// Hysteresis band (percentage points) around `soc_target` to prevent
    /// charge/discharge toggling on a single noisy reading.
    pub soc_hysteresis: f64,
    pub max_charge_power_w: f64,
    pub max_discharge_power_w: f64,
    /// Current battery power, watts; positive means discharging.
    pub power_w: f64,
}

/// A set of loads sharing a hard per-phase limit enforced after
/// distribution (§4.6 Step 6), e.g. a sub-panel or extension-cord run rated
/// below the site's main breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitGroup {
    pub id: String,
    pub current_limit_per_phase: f64,
    pub member_ids: Vec<String>,
}

/// The fully-populated per-tick input to the engine: everything needed to
/// run Steps 0-6 without consulting any external state. Produced by the
/// integration layer from live sensor readings and static configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteContext {
    pub voltage: f64,
    pub main_breaker_rating_a: f64,

    /// Grid consumption per phase, already feedback-corrected (Step 0) by
    /// the time the rest of the pipeline sees it.
    pub consumption: PhaseValues,
    /// Export current per phase, derived from negative grid readings.
    pub export_current: PhaseValues,

    pub solar_production_total_w: f64,
    /// True when `solar_production_total_w` was derived from grid topology
    /// rather than read from a dedicated solar sensor.
    pub solar_is_derived: bool,

    pub battery: Option<BatteryContext>,

    pub inverter_max_power_w: f64,
    pub inverter_max_power_per_phase_w: f64,
    pub inverter_supports_asymmetric: bool,

    pub distribution_mode: DistributionMode,
    pub max_grid_import_power_w: Option<f64>,
    pub excess_export_threshold_w: f64,

    pub loads: Vec<LoadContext>,
    pub circuit_groups: Vec<CircuitGroup>,

    /// True once grid sensors have been unavailable longer than the
    /// configured stale timeout; forces all active loads to `min_current`.
    pub grid_stale: bool,
}

impl SiteContext {
    /// Number of phases present at this site, derived from which
    /// `consumption` entries are populated (spec.md §3.3).
    pub fn phase_count(&self) -> u8 {
        self.consumption.count()
    }

    pub fn has_battery(&self) -> bool {
        self.battery.is_some()
    }
}
