//! Failure kinds recognized by the backend layer (spec.md §7).

use thiserror::Error;

/// Failure kinds a [`crate::backend::Backend`] can report from `invoke`.
///
/// These map directly onto the dispatcher's bookkeeping: every variant
/// drives either the circuit breaker, the bandit's reward, or both.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("read/inference timed out")]
    ReadTimeout,

    #[error("stream protocol error: {0}")]
    Protocol(String),

    #[error("http status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("rate limited, retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("quota exhausted")]
    QuotaExhausted,

    #[error("circuit open")]
    CircuitOpen,

    #[error("response rejected: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Whether this failure should charge the circuit breaker's
    /// consecutive-failure counter (rate-limit/quota have their own gates
    /// and don't also trip the breaker on the first occurrence).
    pub fn counts_against_breaker(&self) -> bool {
        !matches!(self, Self::CircuitOpen)
    }
}
