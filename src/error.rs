//! Crate-wide error type shared by the geometry core, the planners, and the
//! adapter layer (CSV + HTTP).

use thiserror::Error;

/// The five error kinds the core is allowed to signal. The adapter decides
/// what to do with each one; the core never retries or recovers locally.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("no fit: {0}")]
    NoFit(String),

    /// Indicates occupancy-index corruption: an insert happened into a
    /// region that was reported free. Never caught and continued by the
    /// adapter — the whole batch must abort.
    #[error("overlap violation: {0}")]
    OverlapViolation(String),

    #[error("aborted: {0}")]
    Aborted(String),
}

impl CoreError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn no_fit(msg: impl Into<String>) -> Self {
        Self::NoFit(msg.into())
    }

    pub fn overlap_violation(msg: impl Into<String>) -> Self {
        Self::OverlapViolation(msg.into())
    }

    pub fn aborted(msg: impl Into<String>) -> Self {
        Self::Aborted(msg.into())
    }

    /// Stable machine-readable tag, used in HTTP error bodies and log rows.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidInput(_) => "invalid-input",
            CoreError::NotFound(_) => "not-found",
            CoreError::NoFit(_) => "no-fit",
            CoreError::OverlapViolation(_) => "overlap-violation",
            CoreError::Aborted(_) => "aborted",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
