//! Remote assistant integration: one thread per room, one turn at a
//! time, plus best-effort extraction of clinical signals from replies.

pub mod extract;
pub mod gateway;

#[cfg(test)]
pub(crate) mod stub;

pub use extract::{extract_score, extract_vitals};
pub use gateway::AssistantGateway;

use thiserror::Error;

/// Errors from the assistant gateway. The gateway performs no retries —
/// retry policy belongs to the caller, and resubmitting a non-idempotent
/// remote turn risks double work.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Assistant request failed: {0}")]
    Http(String),

    #[error("Assistant API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Assistant turn did not complete within {0}s")]
    Timeout(u64),

    #[error("Assistant turn ended in state '{0}'")]
    Turn(String),

    #[error("Malformed assistant response: {0}")]
    MalformedResponse(String),
}
