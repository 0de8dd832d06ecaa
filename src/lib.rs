//! A pure, side-effect-free calculation engine that decides per-tick current
//! allocation for EV chargers and smart plugs across a 1/2/3-phase
//! residential site with grid, solar inverter, and optional battery.
//!
//! `engine::calculate` is the only call the host integration needs for the
//! allocation decision itself; `runtime` wraps it with the smoothing, rate
//! limiting, and per-load state machine a real tick loop needs around it.

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod runtime;
pub mod telemetry;

pub use domain::site::SiteContext;
pub use engine::{calculate, LoadResult, TickOutput};
pub use error::{Diagnostic, EngineError};
