// battery.rs/ev_charger.rs/forecast.rs/grid.rs/inverter.rs/schedule.rs/types.rs
// are teacher reference files left on disk but deliberately not wired in:
// they depend on async_trait/tokio/uuid, none of which this crate carries
// (a pure calculation engine has no async I/O to justify them). See
// DESIGN.md's final trimming pass, which deletes them outright.

pub mod constraints;
pub mod load;
pub mod phase;
pub mod site;

pub use constraints::{Mask, PhaseConstraints};
pub use load::{
    AllocationReason, ConnectorStatus, LoadContext, LoadKind, LoadStatus, OperatingMode, PlugStatus,
};
pub use phase::{PhaseLetter, PhaseValues};
pub use site::{BatteryContext, CircuitGroup, DistributionMode, SiteContext};
