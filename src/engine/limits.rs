//! Step 1 (spec.md §4.2): derive `site_limit`, the maximum current usable at
//! each phase mask for a Standard-mode load drawing from every source at
//! once. Grid and inverter limits are computed separately, since grid
//! current is strictly per-phase (a breaker cannot reassign current between
//! legs) while inverter current may be a genuinely shared pool.

use crate::domain::constraints::PhaseConstraints;
use crate::domain::phase::PhaseValues;
use crate::domain::site::SiteContext;

/// Per-phase headroom left on the grid connection: `min(breaker,
/// import_power_cap / phases) - consumption`, floored at zero. Grid current
/// cannot be reallocated between phases, so this is built with
/// `from_per_phase`, never `from_pool`.
pub fn grid_limit(site: &SiteContext, consumption: &PhaseValues) -> PhaseConstraints {
    let active_phases = consumption.count().max(1) as f64;
    let import_cap_per_phase_a = site
        .max_grid_import_power_w
        .map(|watts| (watts / site.voltage) / active_phases);

    let headroom = |phase_consumption: Option<f64>| -> f64 {
        let Some(consumed) = phase_consumption else {
            return 0.0;
        };
        let cap = match import_cap_per_phase_a {
            Some(import_cap) => site.main_breaker_rating_a.min(import_cap),
            None => site.main_breaker_rating_a,
        };
        (cap - consumed).max(0.0)
    };

    let mut constraints = PhaseConstraints::from_per_phase(
        headroom(consumption.a),
        headroom(consumption.b),
        headroom(consumption.c),
    );
    constraints.normalize();
    constraints
}

/// Whether the inverter component may contribute to `site_limit` this tick:
/// only in Standard mode, and only if there's no battery or the battery's
/// SOC is at or above `soc_min` (so discharging to support a load is
/// actually permitted).
pub fn inverter_discharge_permitted(site: &SiteContext) -> bool {
    match &site.battery {
        None => true,
        Some(battery) => battery.soc >= battery.soc_min,
    }
}

/// The inverter's contribution to `site_limit`: a shared pool for an
/// asymmetric inverter, or a fixed equal per-phase split for a symmetric
/// one. Assumes the inverter serves every phase the site has (a
/// mixed-phase-count inverter/site pairing is outside this engine's scope).
pub fn inverter_limit(site: &SiteContext) -> PhaseConstraints {
    let total_a = site.inverter_max_power_w / site.voltage;
    let per_phase_cap_a = if site.inverter_max_power_per_phase_w > 0.0 {
        Some(site.inverter_max_power_per_phase_w / site.voltage)
    } else {
        None
    };

    if site.inverter_supports_asymmetric {
        return PhaseConstraints::from_pool(total_a, per_phase_cap_a);
    }

    let active_phases = site.consumption.count().max(1) as f64;
    let equal_share = total_a / active_phases;
    let single = match per_phase_cap_a {
        Some(cap) => equal_share.min(cap),
        None => equal_share,
    };

    let per_phase = |present: bool| if present { single } else { 0.0 };
    PhaseConstraints::from_per_phase(
        per_phase(site.consumption.a.is_some()),
        per_phase(site.consumption.b.is_some()),
        per_phase(site.consumption.c.is_some()),
    )
}

/// `site_limit = grid + inverter`, gated by `inverter_discharge_permitted`.
pub fn site_limit(site: &SiteContext, consumption: &PhaseValues) -> PhaseConstraints {
    let grid = grid_limit(site, consumption);
    if !inverter_discharge_permitted(site) {
        return grid;
    }
    grid.add(&inverter_limit(site))
}
