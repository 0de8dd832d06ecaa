//! Step 0 (spec.md §4.1): remove each load's own measured draw from the
//! site's observed grid consumption before any limit is derived, so that
//! increasing a load's allocation does not look like an increase in
//! background household consumption on the next tick — which would make
//! the engine reduce the very allocation it just granted.

use crate::domain::load::LoadContext;
use crate::domain::phase::{PhaseLetter, PhaseValues};
use crate::error::{Diagnostic, EngineError};

/// Subtract each load's measured per-phase draw (clamped to the load's
/// `max_current_a`, defensive against hardware that reports a single
/// phase's total) from `consumption`. A phase the load isn't wired to
/// (`measured_draw` absent there) is left untouched, never driven absent by
/// a load that simply doesn't occupy it.
pub fn correct_consumption(
    consumption: &PhaseValues,
    loads: &[LoadContext],
) -> (PhaseValues, Vec<Diagnostic>) {
    let mut corrected = *consumption;
    let mut diagnostics = Vec::new();

    for load in loads {
        for phase in [PhaseLetter::A, PhaseLetter::B, PhaseLetter::C] {
            let (Some(draw), Some(current)) = (load.measured_draw.get(phase), corrected.get(phase))
            else {
                continue;
            };

            let clamped_draw = draw.min(load.max_current_a);
            let subtracted = current - clamped_draw;

            let value = if subtracted < 0.0 {
                diagnostics.push(Diagnostic::load(
                    load.id.clone(),
                    EngineError::invariant_violation(
                        "feedback_correction",
                        format!(
                            "{phase:?} consumption went negative after subtracting measured draw \
                             (sensor or wiring mismatch)"
                        ),
                    ),
                ));
                0.0
            } else {
                subtracted
            };

            corrected = corrected.set(phase, Some(value));
        }
    }

    (corrected, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constraints::Mask;
    use crate::domain::load::{AllocationReason, ConnectorStatus, LoadKind, LoadStatus, OperatingMode};

    fn evse_drawing(id: &str, mask: Mask, draw: PhaseValues, max_current_a: f64) -> LoadContext {
        LoadContext {
            id: id.to_string(),
            kind: LoadKind::Evse,
            phases: mask.phase_count(),
            active_phases_mask: mask,
            min_current_a: 6.0,
            max_current_a,
            priority: 1,
            operating_mode: OperatingMode::Standard,
            status: LoadStatus::Evse(ConnectorStatus::Charging),
            measured_draw: draw,
            rated_power_w: None,
            target_current_a: 0.0,
            allocation_reason: AllocationReason::Allocated,
        }
    }

    #[test]
    fn subtracts_measured_draw_from_matching_phase_only() {
        let consumption = PhaseValues::three_phase(10.0, 10.0, 10.0);
        let loads = vec![evse_drawing("c1", Mask::A, PhaseValues::single(4.0), 16.0)];
        let (corrected, diagnostics) = correct_consumption(&consumption, &loads);
        assert_eq!(corrected.a, Some(6.0));
        assert_eq!(corrected.b, Some(10.0), "phase B untouched by a single-phase load on A");
        assert_eq!(corrected.c, Some(10.0));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn clamps_measured_draw_to_load_max_current() {
        // A load reporting 50A (e.g. a CT wired to report phase total) is
        // clamped to its own 16A max before subtraction, so 20 - 16 = 4,
        // not 20 - 50 clamped to 0.
        let consumption = PhaseValues::single(20.0);
        let loads = vec![evse_drawing("c1", Mask::A, PhaseValues::single(50.0), 16.0)];
        let (corrected, _) = correct_consumption(&consumption, &loads);
        assert_eq!(corrected.a, Some(4.0));
    }

    #[test]
    fn clamps_negative_result_to_zero_and_emits_diagnostic() {
        let consumption = PhaseValues::single(2.0);
        let loads = vec![evse_drawing("c1", Mask::A, PhaseValues::single(5.0), 16.0)];
        let (corrected, diagnostics) = correct_consumption(&consumption, &loads);
        assert_eq!(corrected.a, Some(0.0));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].load_id.as_deref(), Some("c1"));
    }

    #[test]
    fn multiple_loads_on_same_phase_both_subtract() {
        let consumption = PhaseValues::single(20.0);
        let loads = vec![
            evse_drawing("c1", Mask::A, PhaseValues::single(4.0), 16.0),
            evse_drawing("c2", Mask::A, PhaseValues::single(6.0), 16.0),
        ];
        let (corrected, _) = correct_consumption(&consumption, &loads);
        assert_eq!(corrected.a, Some(10.0));
    }
}
