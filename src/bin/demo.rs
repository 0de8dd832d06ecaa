//! Drives the engine against a hand-authored site snapshot so the allocation
//! pipeline can be inspected end to end without any host integration.

use load_juggler::domain::{
    AllocationReason, BatteryContext, ConnectorStatus, DistributionMode, LoadContext, LoadKind,
    LoadStatus, Mask, OperatingMode, PhaseValues, SiteContext,
};
use load_juggler::telemetry;

fn site() -> SiteContext {
    let evse_standard = LoadContext {
        id: "evse-garage".into(),
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

    let evse_solar_only = LoadContext {
        id: "evse-carport".into(),
        kind: LoadKind::Evse,
        phases: 3,
        active_phases_mask: Mask::Abc,
        min_current_a: 6.0,
        max_current_a: 16.0,
        priority: 5,
        operating_mode: OperatingMode::SolarOnly,
        status: LoadStatus::Evse(ConnectorStatus::Charging),
        measured_draw: PhaseValues::three_phase(0.0, 0.0, 0.0),
        rated_power_w: None,
        target_current_a: 0.0,
        allocation_reason: AllocationReason::Allocated,
    };

    SiteContext {
        voltage: 230.0,
        main_breaker_rating_a: 32.0,
        consumption: PhaseValues::three_phase(4.0, 4.0, 4.0),
        export_current: PhaseValues::three_phase(0.0, 0.0, 0.0),
        solar_production_total_w: 6000.0,
        solar_is_derived: false,
        battery: Some(BatteryContext {
            soc: 65.0,
            soc_min: 20.0,
            soc_target: 80.0,
            soc_hysteresis: 3.0,
            max_charge_power_w: 5000.0,
            max_discharge_power_w: 5000.0,
            power_w: 0.0,
        }),
        inverter_max_power_w: 8000.0,
        inverter_max_power_per_phase_w: 0.0,
        inverter_supports_asymmetric: false,
        distribution_mode: DistributionMode::Shared,
        max_grid_import_power_w: None,
        excess_export_threshold_w: 13000.0,
        loads: vec![evse_standard, evse_solar_only],
        circuit_groups: Vec::new(),
        grid_stale: false,
    }
}

fn main() {
    telemetry::init_tracing();

    let site = site();
    let output = load_juggler::calculate(&site);

    for load in &output.loads {
        tracing::info!(
            load_id = %load.load_id,
            target_current_a = load.target_current_a,
            reason = ?load.allocation_reason,
            "tick result"
        );
    }

    for diagnostic in &output.diagnostics {
        diagnostic.log();
    }
}
