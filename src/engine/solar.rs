//! Step 2 (spec.md §4.3): the solar-surplus pool, the non-grid-importing
//! power available this tick after the battery's own charge/discharge claim
//! is accounted for.

use crate::domain::constraints::PhaseConstraints;
use crate::domain::site::SiteContext;

/// Power (W) the battery claims to charge this tick: the full
/// `max_charge_power_w` while below target, reserving solar for the battery
/// first (spec.md §4.3 — "while below target, the battery has first claim
/// on solar"). Zero once at or above target.
pub fn battery_charging_w(site: &SiteContext) -> f64 {
    match &site.battery {
        Some(b) if b.soc < b.soc_target => b.max_charge_power_w,
        _ => 0.0,
    }
}

/// Power (W) the battery contributes by discharging this tick. Gated by a
/// one-sided hysteresis band above `soc_target` so a reading that's only
/// marginally above target doesn't start a discharge that immediately stops
/// on the next noisy sample.
pub fn battery_discharging_w(site: &SiteContext) -> f64 {
    match &site.battery {
        Some(b) if b.soc > b.soc_target + b.soc_hysteresis => b.max_discharge_power_w,
        _ => 0.0,
    }
}

/// `solar_surplus`, as a `PhaseConstraints`.
pub fn solar_surplus(site: &SiteContext) -> PhaseConstraints {
    let charging_w = battery_charging_w(site);
    let discharging_w = battery_discharging_w(site);

    if site.inverter_supports_asymmetric {
        let household_consumption_w = site.consumption.total() * site.voltage;
        let net_solar_w =
            (site.solar_production_total_w - household_consumption_w - charging_w + discharging_w).max(0.0);
        let net_solar_a = net_solar_w / site.voltage;
        let per_phase_cap_a = if site.inverter_max_power_per_phase_w > 0.0 {
            Some(site.inverter_max_power_per_phase_w / site.voltage)
        } else {
            None
        };
        return PhaseConstraints::from_pool(net_solar_a, per_phase_cap_a);
    }

    symmetric_solar_surplus(site, charging_w, discharging_w)
}

/// Symmetric-inverter case: the total solar production is split equally
/// across active phases before each phase's own consumption is subtracted,
/// rather than netted against total household consumption first — an
/// asymmetric inverter can move surplus between phases, a symmetric one
/// cannot. The single battery charge/discharge adjustment is attributed to
/// the first present phase in A, B, C order (see DESIGN.md's resolution of
/// the symmetric-inverter battery-attribution open question).
fn symmetric_solar_surplus(site: &SiteContext, charging_w: f64, discharging_w: f64) -> PhaseConstraints {
    let active = site.consumption.count().max(1) as f64;
    let solar_share_w = site.solar_production_total_w / active;
    let mut remaining_adjustment_w = discharging_w - charging_w;

    let mut values = [0.0_f64; 3];
    for (i, consumption) in [site.consumption.a, site.consumption.b, site.consumption.c]
        .into_iter()
        .enumerate()
    {
        let Some(consumption_a) = consumption else { continue };
        let consumption_w = consumption_a * site.voltage;
        let mut phase_w = solar_share_w - consumption_w;
        if remaining_adjustment_w != 0.0 {
            phase_w += remaining_adjustment_w;
            remaining_adjustment_w = 0.0;
        }
        values[i] = (phase_w / site.voltage).max(0.0);
    }

    PhaseConstraints::from_per_phase(values[0], values[1], values[2])
}

/// Split `total_a` evenly across the site's active phases, zero on any
/// absent phase. Shared by `engine::excess`, which distributes an
/// already-netted excess amount rather than gross solar production.
pub(crate) fn symmetric_even_split(site: &SiteContext, total_a: f64) -> PhaseConstraints {
    let active = site.consumption.count().max(1) as f64;
    let share = total_a.max(0.0) / active;
    let per_phase = |present: bool| if present { share } else { 0.0 };
    PhaseConstraints::from_per_phase(
        per_phase(site.consumption.a.is_some()),
        per_phase(site.consumption.b.is_some()),
        per_phase(site.consumption.c.is_some()),
    )
}
