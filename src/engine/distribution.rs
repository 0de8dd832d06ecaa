//! Step 5 (spec.md §4.6): turn each load's ceiling (Step 4) into an actual
//! `target_current_a`, enforcing that loads sharing a pool cannot together
//! draw more than that pool allows. Ordering is mode urgency first, numeric
//! priority second (`LoadContext::ordering_key`).
//!
//! Four algorithms, selected per site by `DistributionMode`:
//! - `Shared`: everyone eligible gets `min_current_a` first, then the
//!   remainder is water-filled equally among loads still below their ceiling.
//! - `Priority`: same minimum pass, then the remainder goes to the
//!   highest-priority load first, each maxed out before the next gets any.
//! - `Optimized`: a single pass in priority order, no separate minimum pass —
//!   a lower-priority load can still get power even if a higher one didn't
//!   reach its own ceiling, as long as there's room.
//! - `Strict`: like `Optimized`, but a load gets nothing unless the load
//!   immediately ahead of it in priority order reached its own `max_current_a`.

use std::collections::HashMap;

use crate::domain::constraints::PhaseConstraints;
use crate::domain::load::{AllocationReason, LoadContext};
use crate::domain::site::DistributionMode;

use super::modes::PoolSource;

/// One load's ceiling, already resolved by `engine::modes::evaluate_ceiling`.
pub struct Candidate<'a> {
    pub load: &'a LoadContext,
    pub ceiling_a: f64,
    pub reason: AllocationReason,
    pub source: PoolSource,
}

/// The four pools a tick's candidates may draw from, each independently
/// deducted from as loads are allocated against it.
#[derive(Debug, Clone, Default)]
pub struct PoolSet {
    pub grid_only: PhaseConstraints,
    pub site_limit: PhaseConstraints,
    pub solar_surplus: PhaseConstraints,
    pub excess: PhaseConstraints,
}

impl PoolSet {
    fn get_mut(&mut self, source: PoolSource) -> Option<&mut PhaseConstraints> {
        match source {
            PoolSource::GridOnly => Some(&mut self.grid_only),
            PoolSource::SiteLimit => Some(&mut self.site_limit),
            PoolSource::SolarSurplus => Some(&mut self.solar_surplus),
            PoolSource::Excess => Some(&mut self.excess),
            PoolSource::None => None,
        }
    }
}

pub struct Allocation {
    pub load_id: String,
    pub current_a: f64,
    pub reason: AllocationReason,
}

pub fn distribute(candidates: Vec<Candidate>, pools: &mut PoolSet, mode: DistributionMode) -> Vec<Allocation> {
    let mut ordered = candidates;
    ordered.sort_by_key(|c| c.load.ordering_key());

    match mode {
        DistributionMode::Shared => two_pass(ordered, pools, true),
        DistributionMode::Priority => two_pass(ordered, pools, false),
        DistributionMode::Optimized => sequential(ordered, pools, false),
        DistributionMode::Strict => sequential(ordered, pools, true),
    }
}

/// Candidates already resolved to zero by Step 4 (faulted, mode-disallowed,
/// or below minimum before any pool was even consulted) pass straight
/// through.
fn already_resolved(candidate: &Candidate) -> Option<Allocation> {
    if candidate.reason != AllocationReason::Allocated || candidate.source == PoolSource::None {
        Some(Allocation {
            load_id: candidate.load.id.clone(),
            current_a: 0.0,
            reason: candidate.reason,
        })
    } else {
        None
    }
}

fn two_pass(candidates: Vec<Candidate>, pools: &mut PoolSet, equal_split: bool) -> Vec<Allocation> {
    let mut results = Vec::with_capacity(candidates.len());
    let mut by_pool: HashMap<PoolSource, Vec<(&LoadContext, f64, f64)>> = HashMap::new();

    for candidate in &candidates {
        if let Some(resolved) = already_resolved(candidate) {
            results.push(resolved);
            continue;
        }

        let pool = pools.get_mut(candidate.source).expect("resolved candidates have a pool");
        let mask = candidate.load.active_phases_mask;
        let available = pool.get_available(mask);

        if available + 1e-9 < candidate.load.min_current_a {
            results.push(Allocation {
                load_id: candidate.load.id.clone(),
                current_a: 0.0,
                reason: AllocationReason::BelowMin,
            });
            continue;
        }

        pool.deduct(candidate.load.min_current_a, mask);
        by_pool
            .entry(candidate.source)
            .or_default()
            .push((candidate.load, candidate.load.min_current_a, candidate.ceiling_a));
    }

    for (source, mut group) in by_pool {
        let pool = pools.get_mut(source).expect("grouped candidates have a pool");
        if equal_split {
            water_fill(pool, &mut group);
        } else {
            sequential_take(pool, &mut group);
        }
        for (load, current, _) in group {
            results.push(Allocation {
                load_id: load.id.clone(),
                current_a: current,
                reason: AllocationReason::Allocated,
            });
        }
    }

    results
}

/// Repeatedly grant the smallest available increment to every load still
/// below its ceiling, so loads sharing a pool converge on an equal share
/// bounded by their individual headroom.
///
/// `step` is the largest increment any *single* active load could safely
/// take from the pool alone; several loads drawing on the same combination
/// key at once would overshoot it if each took the full amount, so the
/// increment actually applied is `step` divided across every load active
/// this round. Conservative (leaves the pool under-drawn within a single
/// round) rather than exact, but the outer loop re-derives `step` from the
/// live pool every round and converges to the same equal split.
fn water_fill(pool: &mut PhaseConstraints, items: &mut [(&LoadContext, f64, f64)]) {
    loop {
        let active: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, (_, current, ceiling))| *current + 1e-9 < *ceiling)
            .map(|(i, _)| i)
            .collect();
        if active.is_empty() {
            break;
        }

        let mut step = f64::INFINITY;
        for &i in &active {
            let (load, current, ceiling) = items[i];
            let room = (ceiling - current).min(pool.get_available(load.active_phases_mask));
            step = step.min(room.max(0.0));
        }
        if step <= 1e-9 {
            break;
        }
        let increment = step / active.len() as f64;

        for &i in &active {
            let (load, current, _) = &mut items[i];
            pool.deduct(increment, load.active_phases_mask);
            *current += increment;
        }
    }
}

/// Hand out the remainder in priority order: each load takes as much of its
/// own ceiling as the pool still allows before the next load gets anything.
fn sequential_take(pool: &mut PhaseConstraints, items: &mut [(&LoadContext, f64, f64)]) {
    for (load, current, ceiling) in items.iter_mut() {
        let room = (*ceiling - *current).min(pool.get_available(load.active_phases_mask)).max(0.0);
        pool.deduct(room, load.active_phases_mask);
        *current += room;
    }
}

fn sequential(candidates: Vec<Candidate>, pools: &mut PoolSet, strict: bool) -> Vec<Allocation> {
    let mut results = Vec::with_capacity(candidates.len());
    let mut previous_maxed = true;

    for candidate in candidates {
        if let Some(resolved) = already_resolved(&candidate) {
            previous_maxed = false;
            results.push(resolved);
            continue;
        }

        if strict && !previous_maxed {
            results.push(Allocation {
                load_id: candidate.load.id.clone(),
                current_a: 0.0,
                reason: AllocationReason::CircuitCapped,
            });
            continue;
        }

        let mask = candidate.load.active_phases_mask;
        let pool = pools.get_mut(candidate.source).expect("resolved candidates have a pool");
        let take = candidate.ceiling_a.min(pool.get_available(mask)).max(0.0);

        if take + 1e-9 < candidate.load.min_current_a {
            previous_maxed = false;
            results.push(Allocation {
                load_id: candidate.load.id.clone(),
                current_a: 0.0,
                reason: AllocationReason::BelowMin,
            });
            continue;
        }

        pool.deduct(take, mask);
        previous_maxed = take + 1e-9 >= candidate.load.max_current_a;
        results.push(Allocation {
            load_id: candidate.load.id.clone(),
            current_a: take,
            reason: AllocationReason::Allocated,
        });
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constraints::Mask;
    use crate::domain::load::{ConnectorStatus, LoadKind, LoadStatus, OperatingMode};
    use crate::domain::phase::PhaseValues;

    // Single-phase (`Mask::A`) loads keep this module's tests free of the
    // ABC-divisor arithmetic covered separately in `domain::constraints` --
    // a pool of N amps behaves as a plain shared bucket when nothing spans
    // more than one phase, which is what these cases are actually exercising.
    fn evse(id: &str, priority: u16, min: f64, max: f64) -> LoadContext {
        LoadContext {
            id: id.to_string(),
            kind: LoadKind::Evse,
            phases: 3,
            active_phases_mask: Mask::A,
            min_current_a: min,
            max_current_a: max,
            priority,
            operating_mode: OperatingMode::Standard,
            status: LoadStatus::Evse(ConnectorStatus::Charging),
            measured_draw: PhaseValues::three_phase(0.0, 0.0, 0.0),
            rated_power_w: None,
            target_current_a: 0.0,
            allocation_reason: AllocationReason::Allocated,
        }
    }

    fn pools_with_site_limit(total_a: f64) -> PoolSet {
        PoolSet {
            site_limit: PhaseConstraints::from_pool(total_a, None),
            ..Default::default()
        }
    }

    fn find<'a>(allocations: &'a [Allocation], id: &str) -> &'a Allocation {
        allocations.iter().find(|a| a.load_id == id).unwrap()
    }

    #[test]
    fn shared_splits_remainder_equally_between_two_loads() {
        let a = evse("a", 1, 6.0, 16.0);
        let b = evse("b", 1, 6.0, 16.0);
        let candidates = vec![
            Candidate { load: &a, ceiling_a: 16.0, reason: AllocationReason::Allocated, source: PoolSource::SiteLimit },
            Candidate { load: &b, ceiling_a: 16.0, reason: AllocationReason::Allocated, source: PoolSource::SiteLimit },
        ];
        let mut pools = pools_with_site_limit(20.0);
        let result = distribute(candidates, &mut pools, DistributionMode::Shared);
        assert!((find(&result, "a").current_a - 10.0).abs() < 1e-6);
        assert!((find(&result, "b").current_a - 10.0).abs() < 1e-6);
    }

    #[test]
    fn priority_gives_the_remainder_after_minimums_to_the_higher_priority_load() {
        let a = evse("a", 1, 6.0, 16.0);
        let b = evse("b", 2, 6.0, 16.0);
        let candidates = vec![
            Candidate { load: &a, ceiling_a: 16.0, reason: AllocationReason::Allocated, source: PoolSource::SiteLimit },
            Candidate { load: &b, ceiling_a: 16.0, reason: AllocationReason::Allocated, source: PoolSource::SiteLimit },
        ];
        let mut pools = pools_with_site_limit(20.0);
        let result = distribute(candidates, &mut pools, DistributionMode::Priority);
        // Both get their 6A minimum first (8A left in the pool), then a takes
        // as much of that remainder as its own ceiling allows (8 more, to 14)
        // before b sees any of it -- b stays at its minimum.
        assert!((find(&result, "a").current_a - 14.0).abs() < 1e-6);
        assert!((find(&result, "b").current_a - 6.0).abs() < 1e-6);
    }

    #[test]
    fn strict_gives_nothing_to_a_load_behind_an_unsaturated_one() {
        let a = evse("a", 1, 6.0, 16.0);
        let b = evse("b", 2, 6.0, 16.0);
        let candidates = vec![
            Candidate { load: &a, ceiling_a: 10.0, reason: AllocationReason::Allocated, source: PoolSource::SiteLimit },
            Candidate { load: &b, ceiling_a: 16.0, reason: AllocationReason::Allocated, source: PoolSource::SiteLimit },
        ];
        let mut pools = pools_with_site_limit(30.0);
        let result = distribute(candidates, &mut pools, DistributionMode::Strict);
        assert!((find(&result, "a").current_a - 10.0).abs() < 1e-6, "a's own ceiling caps it below its max");
        assert_eq!(find(&result, "b").current_a, 0.0, "b is blocked because a never reached its max_current_a");
        assert_eq!(find(&result, "b").reason, AllocationReason::CircuitCapped);
    }

    #[test]
    fn optimized_lets_lower_priority_take_leftover_even_if_higher_capped_by_ceiling() {
        let a = evse("a", 1, 6.0, 16.0);
        let b = evse("b", 2, 6.0, 16.0);
        let candidates = vec![
            Candidate { load: &a, ceiling_a: 10.0, reason: AllocationReason::Allocated, source: PoolSource::SiteLimit },
            Candidate { load: &b, ceiling_a: 16.0, reason: AllocationReason::Allocated, source: PoolSource::SiteLimit },
        ];
        let mut pools = pools_with_site_limit(30.0);
        let result = distribute(candidates, &mut pools, DistributionMode::Optimized);
        assert!((find(&result, "a").current_a - 10.0).abs() < 1e-6);
        assert!((find(&result, "b").current_a - 16.0).abs() < 1e-6, "b takes the leftover despite a not maxing out");
    }

    #[test]
    fn below_min_when_pool_cannot_even_cover_minimum() {
        let a = evse("a", 1, 6.0, 16.0);
        let candidates = vec![Candidate {
            load: &a,
            ceiling_a: 16.0,
            reason: AllocationReason::Allocated,
            source: PoolSource::SiteLimit,
        }];
        let mut pools = pools_with_site_limit(2.0);
        let result = distribute(candidates, &mut pools, DistributionMode::Shared);
        assert_eq!(find(&result, "a").current_a, 0.0);
        assert_eq!(find(&result, "a").reason, AllocationReason::BelowMin);
    }
}
