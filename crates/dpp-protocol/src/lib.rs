//! Decision-Proof Protocol orchestrator and stage implementations.
//!
//! This crate drives the four-stage verification state machine over a
//! [`dpp_ports::Channel`], calling out to the [`dpp_ports::SessionStore`],
//! [`dpp_ports::ChallengeOracle`], and [`dpp_ports::TokenSigner`] ports for
//! everything stateful.

pub mod config;
pub mod orchestrator;
pub mod stage1;
pub mod stage2;
pub mod stage3;
pub mod stage4;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::StageConfig;
pub use orchestrator::{verify, VerificationOutcome};
