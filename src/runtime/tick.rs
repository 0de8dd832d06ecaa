//! Wraps the pure engine with the per-tick smoothing, rate limiting, and
//! state-machine bookkeeping spec.md §4.7/§5 describe around it. This is
//! the only place any of `runtime::smoothing`, `runtime::ramp`, or
//! `runtime::state` is actually driven — `engine::calculate` stays pure and
//! knows nothing about any of this.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::domain::load::AllocationReason;
use crate::domain::site::SiteContext;
use crate::engine::{self, TickOutput};

use super::ramp::RampLimiter;
use super::state::{HubRuntimeState, LoadState};

/// Per-load timing config the host supplies once (spec.md §6: `update_frequency`,
/// `charge_pause_duration`, plus the fixed ramp/dead-band figures of §4.7).
#[derive(Debug, Clone, Copy)]
pub struct TickTiming {
    pub grace_period: std::time::Duration,
    pub pause_duration: std::time::Duration,
    pub up_rate_a_per_s: f64,
    pub down_rate_a_per_s: f64,
    pub dead_band_a: f64,
}

impl Default for TickTiming {
    fn default() -> Self {
        Self {
            grace_period: std::time::Duration::from_secs(10),
            pause_duration: std::time::Duration::from_secs(180),
            up_rate_a_per_s: 0.1,
            down_rate_a_per_s: 0.2,
            dead_band_a: 0.3,
        }
    }
}

/// Run one command tick against an already-EMA-smoothed `SiteContext`
/// snapshot: the pure engine, then per-load grace-hold override, ramp
/// limiting, and state-machine advance.
pub fn run_tick(
    site: &SiteContext,
    runtime: &HubRuntimeState,
    ramps: &mut HashMap<String, RampLimiter>,
    timing: TickTiming,
    now: DateTime<Utc>,
    dt_seconds: f64,
) -> TickOutput {
    let mut output = engine::calculate(site);

    for load_result in &mut output.loads {
        let Some(load) = site.loads.iter().find(|l| l.id == load_result.load_id) else {
            continue;
        };

        let ceiling_met_minimum = load_result.allocation_reason == AllocationReason::Allocated;
        let state = runtime.with_load(&load_result.load_id, |s| {
            s.advance(
                load.is_allocation_eligible(),
                load.is_faulted(),
                ceiling_met_minimum,
                now,
                timing.grace_period,
                timing.pause_duration,
            )
        });

        let mut target_a = load_result.target_current_a;
        if state == LoadState::GraceHold {
            target_a = load.min_current_a;
            load_result.allocation_reason = AllocationReason::PausedGrace;
        }

        let ramp = ramps
            .entry(load_result.load_id.clone())
            .or_insert_with(|| RampLimiter::new(timing.up_rate_a_per_s, timing.down_rate_a_per_s, timing.dead_band_a));
        load_result.target_current_a = ramp.apply(target_a, dt_seconds, load.min_current_a);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constraints::Mask;
    use crate::domain::load::{ConnectorStatus, LoadContext, LoadKind, LoadStatus, OperatingMode};
    use crate::domain::phase::PhaseValues;
    use crate::domain::site::DistributionMode;

    fn site_with_one_standard_load() -> SiteContext {
        let load = LoadContext {
            id: "c1".into(),
            kind: LoadKind::Evse,
            phases: 3,
            active_phases_mask: Mask::Abc,
            min_current_a: 6.0,
            max_current_a: 16.0,
            priority: 1,
            operating_mode: OperatingMode::Standard,
            status: LoadStatus::Evse(ConnectorStatus::Charging),
            measured_draw: PhaseValues::three_phase(0.0, 0.0, 0.0),
            rated_power_w: None,
            target_current_a: 0.0,
            allocation_reason: AllocationReason::Allocated,
        };

        SiteContext {
            voltage: 230.0,
            main_breaker_rating_a: 32.0,
            consumption: PhaseValues::three_phase(0.0, 0.0, 0.0),
            export_current: PhaseValues::three_phase(0.0, 0.0, 0.0),
            solar_production_total_w: 0.0,
            solar_is_derived: false,
            battery: None,
            inverter_max_power_w: 0.0,
            inverter_max_power_per_phase_w: 0.0,
            inverter_supports_asymmetric: false,
            distribution_mode: DistributionMode::Shared,
            max_grid_import_power_w: None,
            excess_export_threshold_w: 13000.0,
            loads: vec![load],
            circuit_groups: Vec::new(),
            grid_stale: false,
        }
    }

    #[test]
    fn ramp_limiter_caps_first_tick_from_zero() {
        let site = site_with_one_standard_load();
        let runtime = HubRuntimeState::new();
        let mut ramps = HashMap::new();
        let timing = TickTiming::default();
        let now = DateTime::from_timestamp(0, 0).unwrap();

        let output = run_tick(&site, &runtime, &mut ramps, timing, now, 1.0);
        assert_eq!(output.loads[0].target_current_a, 0.1, "up_rate 0.1 A/s * 1s, despite a 16A ceiling");
    }

    #[test]
    fn repeated_ticks_ramp_up_toward_the_ceiling() {
        let site = site_with_one_standard_load();
        let runtime = HubRuntimeState::new();
        let mut ramps = HashMap::new();
        let timing = TickTiming::default();

        let mut last = 0.0;
        for i in 0..5 {
            let now = DateTime::from_timestamp(i, 0).unwrap();
            let output = run_tick(&site, &runtime, &mut ramps, timing, now, 1.0);
            assert!(output.loads[0].target_current_a >= last);
            last = output.loads[0].target_current_a;
        }
        assert!(last > 0.0);
    }
}
