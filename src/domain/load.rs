use serde::{Deserialize, Serialize};

use super::constraints::Mask;
use super::phase::PhaseValues;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadKind {
    Evse,
    Plug,
}

/// The connector lifecycle for an EVSE (spec.md §3.4, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorStatus {
    Available,
    Preparing,
    Charging,
    SuspendedEV,
    SuspendedEVSE,
    Finishing,
    Faulted,
}

/// The simpler on/off lifecycle for a plug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlugStatus {
    Active,
    Idle,
}

/// Per-kind connector state, tagged by `LoadKind` so a `LoadContext` can
/// only carry the status shape that matches its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadStatus {
    Evse(ConnectorStatus),
    Plug(PlugStatus),
}

impl LoadStatus {
    /// True when the connector is in a state Step 4 should even consider
    /// (spec.md §4.5: "Preparing, Charging, SuspendedEV" for EVSE; the
    /// plug's "on-eligible" state).
    pub fn is_allocation_eligible(&self) -> bool {
        match self {
            LoadStatus::Evse(s) => matches!(
                s,
                ConnectorStatus::Preparing | ConnectorStatus::Charging | ConnectorStatus::SuspendedEV
            ),
            LoadStatus::Plug(s) => matches!(s, PlugStatus::Active),
        }
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self, LoadStatus::Evse(ConnectorStatus::Faulted))
    }
}

/// The tagged-variant operating mode shared by both load kinds (spec.md §9
/// design note: one dispatch, no per-mode subclassing). `Standard` only
/// occurs on EVSE loads; `Continuous` only on plugs; `SolarPriority` only on
/// EVSE; `SolarOnly` and `Excess` occur on both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatingMode {
    Standard,
    SolarPriority,
    SolarOnly,
    Excess,
    Continuous,
}

impl OperatingMode {
    /// Coarse ordering applied before numeric priority (spec.md §4.6):
    /// lower value wins, same convention as `priority`.
    pub fn urgency(&self) -> u8 {
        match self {
            OperatingMode::Standard | OperatingMode::Continuous => 0,
            OperatingMode::SolarPriority => 1,
            OperatingMode::SolarOnly => 2,
            OperatingMode::Excess => 3,
        }
    }
}

/// Why a load's `target_current_a` came out the way it did (spec.md §6
/// outputs) — a diagnostic for the host, not consumed by the engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationReason {
    Allocated,
    BelowMin,
    PausedGrace,
    CircuitCapped,
    ModeDisallowed,
    GridStale,
    Faulted,
}

/// Per-load per-tick input, and (once the engine has run) output.
/// Snapshot-scoped: built fresh each tick by the integration, consumed by
/// the engine, read back afterward (spec.md §3.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadContext {
    pub id: String,
    pub kind: LoadKind,

    /// Hardware capability: how many phases this device can draw on (1, 2,
    /// or 3), independent of which site phases it is actually wired to.
    pub phases: u8,
    /// Which site phases this load is actually wired to, after
    /// L1/L2/L3 -> A/B/C mapping.
    pub active_phases_mask: Mask,

    pub min_current_a: f64,
    pub max_current_a: f64,
    /// Lower number = higher priority; default 1.
    pub priority: u16,

    pub operating_mode: OperatingMode,
    pub status: LoadStatus,

    /// Measured draw per hardware leg, already mapped onto site phases.
    /// Used only for feedback correction (Step 0) and diagnostics, never
    /// for computing this tick's allocation directly.
    pub measured_draw: PhaseValues,

    /// Plug-only: rated power in watts. A plug is binary, either off or
    /// drawing `rated_power_w / (voltage * phases_in_mask)` per phase.
    pub rated_power_w: Option<f64>,

    /// Output: per-phase current this load may draw this tick.
    pub target_current_a: f64,
    /// Output: why `target_current_a` has the value it does.
    pub allocation_reason: AllocationReason,
}

impl LoadContext {
    pub fn urgency(&self) -> u8 {
        self.operating_mode.urgency()
    }

    /// Sort key for distribution ordering: mode urgency first, numeric
    /// priority second (spec.md §4.6).
    pub fn ordering_key(&self) -> (u8, u16) {
        (self.urgency(), self.priority)
    }

    pub fn is_allocation_eligible(&self) -> bool {
        self.status.is_allocation_eligible()
    }

    pub fn is_faulted(&self) -> bool {
        self.status.is_faulted()
    }

    /// For a plug: the per-phase current equivalent of its rated power,
    /// given the site voltage and how many phases it is wired to.
    pub fn plug_rated_current_a(&self, voltage: f64) -> f64 {
        let phases = self.active_phases_mask.phase_count().max(1) as f64;
        self.rated_power_w.unwrap_or(0.0) / (voltage * phases)
    }
}
