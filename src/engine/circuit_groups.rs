//! Step 6 (spec.md §4.6 circuit groups): after distribution, some loads
//! share a sub-circuit breaker tighter than anything already enforced by the
//! site-wide pools. Reduce members of an over-limit group, starting from the
//! lowest-urgency/lowest-priority member, until the group is back within its
//! `current_limit_per_phase` on every phase.

use std::collections::HashMap;

use crate::domain::load::{AllocationReason, LoadContext};
use crate::domain::phase::PhaseLetter;
use crate::domain::site::CircuitGroup;

use super::distribution::Allocation;

fn phase_index(phase: PhaseLetter) -> usize {
    match phase {
        PhaseLetter::A => 0,
        PhaseLetter::B => 1,
        PhaseLetter::C => 2,
    }
}

/// Per-phase current a group's members are drawing, summed via each
/// member's `active_phases_mask`.
fn group_phase_draw(group: &CircuitGroup, loads: &[&LoadContext], currents: &HashMap<&str, f64>) -> [f64; 3] {
    let mut draw = [0.0_f64; 3];
    for member_id in &group.member_ids {
        let Some(load) = loads.iter().find(|l| &l.id == member_id) else { continue };
        let current = currents.get(load.id.as_str()).copied().unwrap_or(0.0);
        for phase in load.active_phases_mask.phases() {
            draw[phase_index(phase)] += current;
        }
    }
    draw
}

/// Apply every circuit group's cap to a tick's already-distributed
/// allocations, mutating `allocations` in place. Members are reduced in
/// reverse ordering-key order (least urgent, lowest priority, first): each
/// victim is trimmed down by just enough to clear the phases it's actually
/// over-limit on, and only zeroed outright if that trim would take it below
/// its own `min_current_a`.
pub fn apply_circuit_groups(allocations: &mut [Allocation], loads: &[LoadContext], groups: &[CircuitGroup]) {
    let loads_by_id: HashMap<&str, &LoadContext> = loads.iter().map(|l| (l.id.as_str(), l)).collect();

    for group in groups {
        loop {
            let mut currents: HashMap<&str, f64> = HashMap::new();
            for allocation in allocations.iter() {
                currents.insert(allocation.load_id.as_str(), allocation.current_a);
            }

            let member_loads: Vec<&LoadContext> =
                group.member_ids.iter().filter_map(|id| loads_by_id.get(id.as_str()).copied()).collect();
            let draw = group_phase_draw(group, &member_loads, &currents);
            let over_phases: Vec<usize> = (0..3).filter(|&i| draw[i] - group.current_limit_per_phase > 1e-9).collect();

            if over_phases.is_empty() {
                break;
            }

            let mut reducible: Vec<&LoadContext> = member_loads
                .iter()
                .copied()
                .filter(|l| currents.get(l.id.as_str()).copied().unwrap_or(0.0) > 1e-9)
                .filter(|l| over_phases.iter().any(|&i| l.active_phases_mask.contains(phase_of(i))))
                .collect();
            reducible.sort_by_key(|l| std::cmp::Reverse(l.ordering_key()));

            let Some(victim) = reducible.first() else {
                break;
            };
            let victim_current = currents.get(victim.id.as_str()).copied().unwrap_or(0.0);

            // How much this victim alone must give up to clear the phases it
            // shares with the overage -- the largest overage among those.
            let needed_reduction = over_phases
                .iter()
                .filter(|&&i| victim.active_phases_mask.contains(phase_of(i)))
                .fold(0.0_f64, |acc, &i| acc.max(draw[i] - group.current_limit_per_phase));
            let trimmed = (victim_current - needed_reduction).max(0.0);

            for allocation in allocations.iter_mut() {
                if allocation.load_id == victim.id {
                    allocation.current_a =
                        if trimmed + 1e-9 >= victim.min_current_a { trimmed } else { 0.0 };
                    allocation.reason = AllocationReason::CircuitCapped;
                    break;
                }
            }
        }
    }
}

fn phase_of(index: usize) -> PhaseLetter {
    match index {
        0 => PhaseLetter::A,
        1 => PhaseLetter::B,
        _ => PhaseLetter::C,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constraints::Mask;
    use crate::domain::load::{ConnectorStatus, LoadKind, LoadStatus, OperatingMode};
    use crate::domain::phase::PhaseValues;

    fn evse(id: &str, priority: u16) -> LoadContext {
        LoadContext {
            id: id.to_string(),
            kind: LoadKind::Evse,
            phases: 1,
            active_phases_mask: Mask::A,
            min_current_a: 6.0,
            max_current_a: 16.0,
            priority,
            operating_mode: OperatingMode::Standard,
            status: LoadStatus::Evse(ConnectorStatus::Charging),
            measured_draw: PhaseValues::single(0.0),
            rated_power_w: None,
            target_current_a: 0.0,
            allocation_reason: AllocationReason::Allocated,
        }
    }

    #[test]
    fn zeroes_lowest_priority_member_until_group_limit_respected() {
        let loads = vec![evse("c1", 1), evse("c2", 2)];
        let group = CircuitGroup {
            id: "sub1".into(),
            current_limit_per_phase: 20.0,
            member_ids: vec!["c1".into(), "c2".into()],
        };
        let mut allocations = vec![
            Allocation { load_id: "c1".into(), current_a: 16.0, reason: AllocationReason::Allocated },
            Allocation { load_id: "c2".into(), current_a: 16.0, reason: AllocationReason::Allocated },
        ];
        apply_circuit_groups(&mut allocations, &loads, &[group]);

        let c1 = allocations.iter().find(|a| a.load_id == "c1").unwrap();
        let c2 = allocations.iter().find(|a| a.load_id == "c2").unwrap();
        assert_eq!(c1.current_a, 16.0, "higher priority member kept whole");
        assert_eq!(c2.current_a, 0.0);
        assert_eq!(c2.reason, AllocationReason::CircuitCapped);
    }

    #[test]
    fn trims_victim_down_to_its_reduced_share_instead_of_zeroing_when_min_current_still_fits() {
        let loads = vec![evse("c1", 1), evse("c2", 2)];
        let group = CircuitGroup {
            id: "sub1".into(),
            current_limit_per_phase: 20.0,
            member_ids: vec!["c1".into(), "c2".into()],
        };
        let mut allocations = vec![
            Allocation { load_id: "c1".into(), current_a: 10.0, reason: AllocationReason::Allocated },
            Allocation { load_id: "c2".into(), current_a: 16.0, reason: AllocationReason::Allocated },
        ];
        apply_circuit_groups(&mut allocations, &loads, &[group]);

        let c1 = allocations.iter().find(|a| a.load_id == "c1").unwrap();
        let c2 = allocations.iter().find(|a| a.load_id == "c2").unwrap();
        assert_eq!(c1.current_a, 10.0, "higher priority member kept whole");
        assert_eq!(c2.current_a, 10.0, "lower priority member trimmed by the 6A excess, not zeroed");
        assert_eq!(c2.reason, AllocationReason::CircuitCapped);
    }

    #[test]
    fn leaves_allocations_untouched_when_group_within_limit() {
        let loads = vec![evse("c1", 1)];
        let group = CircuitGroup {
            id: "sub1".into(),
            current_limit_per_phase: 20.0,
            member_ids: vec!["c1".into()],
        };
        let mut allocations =
            vec![Allocation { load_id: "c1".into(), current_a: 10.0, reason: AllocationReason::Allocated }];
        apply_circuit_groups(&mut allocations, &loads, &[group]);
        assert_eq!(allocations[0].current_a, 10.0);
    }
}
