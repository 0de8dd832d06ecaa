//! The pure calculation engine (spec.md §4): no I/O, no clock, no shared
//! state — `calculate` is a plain function from a `SiteContext` snapshot to
//! a `TickOutput`, safe to call from any thread or to replay in a test.
//! Mirrors the numbered-step shape of `power_flow::model::compute_flows` in
//! the teacher, generalized from one fixed pipeline to the mode/pool table
//! spec.md describes.

pub mod circuit_groups;
pub mod distribution;
pub mod excess;
pub mod feedback;
pub mod limits;
pub mod modes;
pub mod solar;

use crate::domain::load::{AllocationReason, LoadContext};
use crate::domain::site::SiteContext;
use crate::error::Diagnostic;

use distribution::{distribute, Candidate, PoolSet};
use modes::{battery_band, evaluate_ceiling, Pools};

/// One load's result for the tick, merged back onto its `LoadContext` shape
/// by the caller (spec.md §3.4: `LoadContext` is both input and output).
#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    pub load_id: String,
    pub target_current_a: f64,
    pub allocation_reason: AllocationReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    pub loads: Vec<LoadResult>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run every step of the allocation pipeline once, for one tick's snapshot.
/// Pure: the same `SiteContext` always produces the same `TickOutput`.
pub fn calculate(site: &SiteContext) -> TickOutput {
    let mut diagnostics = Vec::new();

    // Step 0: remove each load's own draw from observed consumption.
    let (consumption, feedback_diagnostics) = feedback::correct_consumption(&site.consumption, &site.loads);
    diagnostics.extend(feedback_diagnostics);

    if site.grid_stale {
        // Force already-eligible loads down to min_current rather than zero —
        // cutting a session to nothing risks destroying it on a fragile EV
        // (spec.md §4.7). A load that wasn't already eligible gets nothing.
        let loads = site
            .loads
            .iter()
            .map(|load| LoadResult {
                load_id: load.id.clone(),
                target_current_a: if load.is_allocation_eligible() && !load.is_faulted() {
                    load.min_current_a
                } else {
                    0.0
                },
                allocation_reason: AllocationReason::GridStale,
            })
            .collect();
        return TickOutput { loads, diagnostics };
    }

    // Step 1-3: the four pools every load's ceiling is drawn from.
    let grid_only = limits::grid_limit(site, &consumption);
    let site_limit = limits::site_limit(site, &consumption);
    let solar_surplus = solar::solar_surplus(site);
    let excess = excess::excess_pool(site);

    let pools_for_modes = Pools {
        grid_only: &grid_only,
        site_limit: &site_limit,
        solar_surplus: &solar_surplus,
        excess: &excess,
    };
    let band = battery_band(site);

    // Step 4: per-load ceiling.
    let evaluations: Vec<(&LoadContext, f64, AllocationReason, modes::PoolSource)> = site
        .loads
        .iter()
        .map(|load| {
            let (ceiling, reason, source) = evaluate_ceiling(load, &pools_for_modes, band, site.voltage);
            (load, ceiling, reason, source)
        })
        .collect();

    let candidates: Vec<Candidate> = evaluations
        .iter()
        .map(|(load, ceiling, reason, source)| Candidate {
            load,
            ceiling_a: *ceiling,
            reason: *reason,
            source: *source,
        })
        .collect();

    // Step 5: distribution, drawing from independent copies of the pools so
    // one mode's consumers can't eat into another mode's headroom twice.
    let mut pools = PoolSet {
        grid_only,
        site_limit,
        solar_surplus,
        excess,
    };
    let mut allocations = distribute(candidates, &mut pools, site.distribution_mode);

    // Step 6: sub-circuit group caps.
    circuit_groups::apply_circuit_groups(&mut allocations, &site.loads, &site.circuit_groups);

    let loads = allocations
        .into_iter()
        .map(|allocation| LoadResult {
            load_id: allocation.load_id,
            target_current_a: allocation.current_a,
            allocation_reason: allocation.reason,
        })
        .collect();

    TickOutput { loads, diagnostics }
}
