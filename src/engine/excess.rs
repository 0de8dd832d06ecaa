//! Step 3 (spec.md §4.4): the excess-above-threshold pool, used only by
//! `Excess`-mode loads — power exported to the grid beyond a configured
//! threshold, with the threshold raised while the battery still wants
//! solar for itself.

use crate::domain::constraints::PhaseConstraints;
use crate::domain::site::SiteContext;

use super::solar::{solar_surplus, symmetric_even_split};

const BATTERY_FULL_SOC: f64 = 98.0;

fn battery_reserve_w(site: &SiteContext) -> f64 {
    match &site.battery {
        Some(b) if b.soc < b.soc_target => b.max_charge_power_w,
        _ => 0.0,
    }
}

/// `excess_pool`. Once the battery is effectively full (SOC >= 98%, and can
/// no longer absorb more), this degenerates to the same pool `engine::solar`
/// produces.
pub fn excess_pool(site: &SiteContext) -> PhaseConstraints {
    if let Some(battery) = &site.battery {
        if battery.soc >= BATTERY_FULL_SOC {
            return solar_surplus(site);
        }
    }

    let effective_threshold_w = site.excess_export_threshold_w + battery_reserve_w(site);
    let total_export_w = site.export_current.total() * site.voltage;

    if total_export_w <= effective_threshold_w {
        return PhaseConstraints::zero();
    }

    let excess_a = (total_export_w - effective_threshold_w) / site.voltage;

    if site.inverter_supports_asymmetric {
        let per_phase_cap_a = if site.inverter_max_power_per_phase_w > 0.0 {
            Some(site.inverter_max_power_per_phase_w / site.voltage)
        } else {
            None
        };
        return PhaseConstraints::from_pool(excess_a, per_phase_cap_a);
    }

    symmetric_even_split(site, excess_a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::phase::PhaseValues;
    use crate::domain::site::{BatteryContext, DistributionMode};

    fn base_site() -> SiteContext {
        SiteContext {
            voltage: 230.0,
            main_breaker_rating_a: 25.0,
            consumption: PhaseValues::single(0.0),
            export_current: PhaseValues::single(0.0),
            solar_production_total_w: 0.0,
            solar_is_derived: false,
            battery: None,
            inverter_max_power_w: 0.0,
            inverter_max_power_per_phase_w: 0.0,
            inverter_supports_asymmetric: true,
            distribution_mode: DistributionMode::Shared,
            max_grid_import_power_w: None,
            excess_export_threshold_w: 10000.0,
            loads: Vec::new(),
            circuit_groups: Vec::new(),
            grid_stale: false,
        }
    }

    #[test]
    fn excess_mode_above_threshold_asymmetric() {
        // spec.md scenario 2: export 11840W, threshold 10000W -> 1840W / 230V = 8A.
        let mut site = base_site();
        site.export_current = PhaseValues::single(11840.0 / 230.0);
        let pool = excess_pool(&site);
        assert!((pool.a - 8.0).abs() < 1e-9);
    }

    #[test]
    fn below_threshold_yields_empty_pool() {
        let mut site = base_site();
        site.export_current = PhaseValues::single(9000.0 / 230.0);
        let pool = excess_pool(&site);
        assert_eq!(pool, PhaseConstraints::zero());
    }

    #[test]
    fn threshold_raised_while_battery_below_target() {
        let mut site = base_site();
        site.battery = Some(BatteryContext {
            soc: 50.0,
            soc_min: 20.0,
            soc_target: 80.0,
            soc_hysteresis: 3.0,
            max_charge_power_w: 3000.0,
            max_discharge_power_w: 3000.0,
            power_w: 0.0,
        });
        // Export of 12000W would clear the bare 10000W threshold but not
        // the battery-reserved 13000W.
        site.export_current = PhaseValues::single(12000.0 / 230.0);
        assert_eq!(excess_pool(&site), PhaseConstraints::zero());
    }

    #[test]
    fn full_battery_falls_back_to_solar_surplus_behavior() {
        let mut site = base_site();
        site.solar_production_total_w = 4600.0;
        site.inverter_supports_asymmetric = false;
        site.battery = Some(BatteryContext {
            soc: 99.0,
            soc_min: 20.0,
            soc_target: 80.0,
            soc_hysteresis: 3.0,
            max_charge_power_w: 3000.0,
            max_discharge_power_w: 3000.0,
            power_w: 0.0,
        });
        let pool = excess_pool(&site);
        assert_eq!(pool, solar_surplus(&site));
    }
}
