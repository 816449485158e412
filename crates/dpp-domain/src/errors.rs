//! Domain errors

use thiserror::Error;

/// Domain errors for the Decision-Proof Protocol verifier
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid verifier transition: cannot go from {current_state} via {attempted_transition}")]
    InvalidTransition {
        current_state: String,
        attempted_transition: String,
    },
}
