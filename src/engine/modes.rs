//! Step 4 (spec.md §4.5): per-load ceiling evaluation. A single tagged-variant
//! dispatch over `OperatingMode` (spec.md §9 design note), rather than a
//! ceiling method on a per-mode subclass — generalized from
//! `optimizer::greedy::GreedyOptimizer::determine_power`'s "decide then
//! clamp" shape.

use crate::domain::constraints::{Mask, PhaseConstraints};
use crate::domain::load::{AllocationReason, LoadContext, LoadKind, OperatingMode};
use crate::domain::site::SiteContext;

/// Which pool a load's ceiling was drawn from — distribution (Step 5) must
/// deduct an allocated load's current from this same pool, not from
/// `site_limit` unconditionally, so two loads drawing from different pools
/// don't falsely compete for the same headroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolSource {
    GridOnly,
    SiteLimit,
    SolarSurplus,
    Excess,
    /// A faulted or otherwise-disallowed load: no pool to deduct from.
    None,
}

/// Where a load's battery sits relative to the bands the ceiling table
/// (spec.md §4.5) keys off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryBand {
    NoBattery,
    BelowMin,
    InRange,
    AboveTarget,
}

pub fn battery_band(site: &SiteContext) -> BatteryBand {
    match &site.battery {
        None => BatteryBand::NoBattery,
        Some(b) if b.soc < b.soc_min => BatteryBand::BelowMin,
        Some(b) if b.soc > b.soc_target => BatteryBand::AboveTarget,
        Some(_) => BatteryBand::InRange,
    }
}

/// The four pools a load's ceiling might be drawn from, computed once per
/// tick by the pipeline and shared across every load's evaluation.
pub struct Pools<'a> {
    /// The grid-only component of Step 1 (battery excluded), used by
    /// Standard mode when the battery is below `soc_min`.
    pub grid_only: &'a PhaseConstraints,
    pub site_limit: &'a PhaseConstraints,
    pub solar_surplus: &'a PhaseConstraints,
    pub excess: &'a PhaseConstraints,
}

fn clamp_ceiling(raw_a: f64, load: &LoadContext, source: PoolSource) -> (f64, AllocationReason, PoolSource) {
    if raw_a < load.min_current_a {
        (0.0, AllocationReason::BelowMin, PoolSource::None)
    } else {
        (raw_a.min(load.max_current_a), AllocationReason::Allocated, source)
    }
}

/// The ceiling (max current this tick), why, and which pool it came from,
/// for one load. Connector faults and ineligible statuses are resolved
/// before any mode logic runs.
pub fn evaluate_ceiling(
    load: &LoadContext,
    pools: &Pools,
    band: BatteryBand,
    voltage: f64,
) -> (f64, AllocationReason, PoolSource) {
    if load.is_faulted() {
        return (0.0, AllocationReason::Faulted, PoolSource::None);
    }
    if !load.is_allocation_eligible() {
        return (0.0, AllocationReason::ModeDisallowed, PoolSource::None);
    }

    match load.kind {
        LoadKind::Evse => evaluate_evse_ceiling(load, pools, band),
        LoadKind::Plug => evaluate_plug_ceiling(load, pools, band, voltage),
    }
}

fn evaluate_evse_ceiling(load: &LoadContext, pools: &Pools, band: BatteryBand) -> (f64, AllocationReason, PoolSource) {
    let mask = load.active_phases_mask;

    match (load.operating_mode, band) {
        (OperatingMode::Standard, BatteryBand::BelowMin) => {
            clamp_ceiling(pools.grid_only.get_available(mask), load, PoolSource::GridOnly)
        }
        (OperatingMode::Standard, _) => {
            clamp_ceiling(pools.site_limit.get_available(mask), load, PoolSource::SiteLimit)
        }

        (OperatingMode::SolarPriority, BatteryBand::BelowMin) => {
            (0.0, AllocationReason::ModeDisallowed, PoolSource::None)
        }
        (OperatingMode::SolarPriority, BatteryBand::AboveTarget) => {
            clamp_ceiling(pools.site_limit.get_available(mask), load, PoolSource::SiteLimit)
        }
        (OperatingMode::SolarPriority, _) => {
            // Grid is allowed to make up the minimum even when solar alone
            // can't reach it.
            let raw = pools.solar_surplus.get_available(mask).max(load.min_current_a);
            clamp_ceiling(raw, load, PoolSource::SolarSurplus)
        }

        (OperatingMode::SolarOnly, BatteryBand::NoBattery) | (OperatingMode::SolarOnly, BatteryBand::AboveTarget) => {
            clamp_ceiling(pools.solar_surplus.get_available(mask), load, PoolSource::SolarSurplus)
        }
        (OperatingMode::SolarOnly, _) => (0.0, AllocationReason::ModeDisallowed, PoolSource::None),

        (OperatingMode::Excess, BatteryBand::BelowMin) => (0.0, AllocationReason::ModeDisallowed, PoolSource::None),
        (OperatingMode::Excess, _) => clamp_ceiling(pools.excess.get_available(mask), load, PoolSource::Excess),

        (OperatingMode::Continuous, _) => {
            unreachable!("Continuous is a plug-only operating mode")
        }
    }
}

fn evaluate_plug_ceiling(
    load: &LoadContext,
    pools: &Pools,
    band: BatteryBand,
    voltage: f64,
) -> (f64, AllocationReason, PoolSource) {
    let mask = load.active_phases_mask;
    let rated_a = load.plug_rated_current_a(voltage);

    let source = match load.operating_mode {
        OperatingMode::Continuous => Some(PoolSource::SiteLimit),
        OperatingMode::SolarOnly => match band {
            BatteryBand::NoBattery | BatteryBand::AboveTarget
                if pools.solar_surplus.get_available(mask) >= rated_a =>
            {
                Some(PoolSource::SolarSurplus)
            }
            _ => None,
        },
        OperatingMode::Excess if pools.excess.get_available(mask) >= rated_a => Some(PoolSource::Excess),
        OperatingMode::Excess => None,
        OperatingMode::Standard | OperatingMode::SolarPriority => {
            unreachable!("Standard/SolarPriority are EVSE-only operating modes")
        }
    };

    match source {
        Some(source) => (rated_a, AllocationReason::Allocated, source),
        None => (0.0, AllocationReason::ModeDisallowed, PoolSource::None),
    }
}
