//! Decision-Proof Protocol domain core
//!
//! Pure domain logic: entities, the verifier state machine, timing
//! statistics, and the proof-of-work predicate. This crate MUST NOT import
//! DB clients, HTTP frameworks, or LLM/HTTP client SDKs — those live behind
//! `dpp-ports` in `dpp-adapters`.

pub mod entities;
pub mod errors;
pub mod pow;
pub mod scenario;
pub mod state_machines;
pub mod stats;

pub use entities::*;
pub use errors::*;
pub use scenario::*;
pub use state_machines::*;
