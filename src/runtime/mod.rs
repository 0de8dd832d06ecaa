//! The ambient layer around the pure engine: smoothing, rate limiting, the
//! per-load state machine, and the tick wrapper that ties them together
//! (spec.md §4.7, §4.8, §5). Nothing in `engine` depends on this module;
//! everything here depends on `engine`.

pub mod ramp;
pub mod smoothing;
pub mod state;
pub mod tick;
