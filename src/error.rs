//! The engine's error taxonomy (spec.md §7). None of these ever escape the
//! engine as a halting `Result::Err` — `calculate` always returns a tick
//! output; variants here are attached to it as diagnostics, mirroring how
//! the teacher's `SafetyMonitor` records `SafetyEvent`s alongside, not
//! instead of, a successful control decision.

use thiserror::Error;

/// One of the four error kinds the engine can encounter while processing a
/// tick. Each carries enough context to explain itself in a log line or a
/// diagnostic surfaced to the host.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A required input was `None`/NaN/Inf. Handled by EMA hold; escalates
    /// to grid-stale safety mode after the configured timeout.
    #[error("input unavailable: {field}")]
    InputUnavailable { field: String },

    /// A constraint operation produced a value outside its own invariants
    /// (e.g. normalization left a negative value, or a deduction exceeded
    /// the pool it drew from). Clamped at zero and continued.
    #[error("invariant violation in {operation}: {detail}")]
    InvariantViolation { operation: String, detail: String },

    /// Static configuration was out of domain (negative/zero voltage,
    /// min > max current, empty mask). A safe default was substituted.
    #[error("config domain error on {field}: {detail}, falling back to {fallback}")]
    ConfigDomainError {
        field: String,
        detail: String,
        fallback: String,
    },

    /// The load's connector status indicates a hardware fault. Allocation
    /// was skipped for this load.
    #[error("load {load_id} faulted")]
    LoadFaulted { load_id: String },
}

impl EngineError {
    pub fn input_unavailable(field: impl Into<String>) -> Self {
        EngineError::InputUnavailable { field: field.into() }
    }

    pub fn invariant_violation(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        EngineError::InvariantViolation {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    pub fn config_domain_error(
        field: impl Into<String>,
        detail: impl Into<String>,
        fallback: impl Into<String>,
    ) -> Self {
        EngineError::ConfigDomainError {
            field: field.into(),
            detail: detail.into(),
            fallback: fallback.into(),
        }
    }

    pub fn load_faulted(load_id: impl Into<String>) -> Self {
        EngineError::LoadFaulted { load_id: load_id.into() }
    }
}

/// A diagnostic attached to a tick's output: a recorded `EngineError` plus
/// which load it concerns, if any. The engine never halts on these; they
/// exist purely so a host can surface what happened.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub error: EngineError,
    pub load_id: Option<String>,
}

impl Diagnostic {
    pub fn site(error: EngineError) -> Self {
        Self { error, load_id: None }
    }

    pub fn load(load_id: impl Into<String>, error: EngineError) -> Self {
        Self {
            error,
            load_id: Some(load_id.into()),
        }
    }

    /// Emit this diagnostic through `tracing`, matching the teacher's
    /// pattern of logging a `SafetyEvent` at the point it's recorded.
    pub fn log(&self) {
        match self.load_id.as_deref() {
            Some(id) => tracing::warn!(load_id = id, error = %self.error, "engine diagnostic"),
            None => tracing::warn!(error = %self.error, "engine diagnostic"),
        }
    }
}
