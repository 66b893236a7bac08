//! Model validation errors.
//!
//! Remote failures are not represented here: the service traits return
//! `anyhow::Result` and the state machine treats every failure of a given
//! request the same way (abort, fall back, or log).

use thiserror::Error;

/// Errors raised when a value violates the data model's constraints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A required text field was empty or whitespace only.
    #[error("{0} must be a non-empty, non-blank string")]
    BlankField(&'static str),

    /// The exposure window was zero.
    #[error("exposure_ms must be a positive integer")]
    NonPositiveExposure,

    /// A session was configured with zero rounds.
    #[error("a session needs at least one round, got {0}")]
    InvalidRoundCount(u32),
}
