//! Decision-Proof Protocol port traits
//!
//! Defines the interfaces adapters must implement for the external
//! collaborators the verification core talks to:
//! - `Channel` — the duplex message connection (transport framing)
//! - `SessionStore` — session + challenge-round persistence
//! - `ChallengeOracle` — challenge generation/validation
//! - `TokenSigner` — bearer token minting/verification
//!
//! Plus `Clock`, used only for the wall-clock session timestamp and token
//! `iat`/`exp` — per-stage elapsed measurements use a monotonic clock
//! directly, not this trait.

use std::future::Future;

use chrono::{DateTime, Utc};
use dpp_domain::{Challenge, ChallengeRoundRow, SessionRow, Timings};
use serde::{Deserialize, Serialize};

/// Duplex JSON-frame connection.
///
/// The core consumes `send`/`recv` only; reconnection, backpressure, and
/// wire encoding are the adapter's concern.
pub trait Channel: Send {
    fn send(
        &mut self,
        frame: serde_json::Value,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Await exactly one inbound frame. Deadlines are applied by the caller
    /// (e.g. `tokio::time::timeout`), not by this port.
    fn recv(&mut self) -> impl Future<Output = Result<serde_json::Value, ChannelError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("peer closed the connection")]
    Closed,
    #[error("codec error: {message}")]
    Codec { message: String },
    #[error("transport error: {message}")]
    Transport { message: String },
}

/// Session + challenge-round persistence.
pub trait SessionStore: Send + Sync {
    fn insert_session(
        &self,
        agent_id: &str,
        stage_reached: u8,
        timestamp: f64,
        timings: &Timings,
        passed: bool,
        reject_reason: Option<&str>,
    ) -> impl Future<Output = Result<i64, SessionStoreError>> + Send;

    fn update_session(
        &self,
        id: i64,
        stage_reached: u8,
        timings: &Timings,
        passed: bool,
        reject_reason: Option<&str>,
    ) -> impl Future<Output = Result<(), SessionStoreError>> + Send;

    fn insert_challenge_round(
        &self,
        session_id: i64,
        round_num: u32,
        challenge_text: &str,
        response_text: &str,
        correct: bool,
        response_time_s: f64,
    ) -> impl Future<Output = Result<(), SessionStoreError>> + Send;

    /// Ordered by `timestamp` ascending.
    fn fetch_sessions_by_agent(
        &self,
        agent_id: &str,
    ) -> impl Future<Output = Result<Vec<SessionRow>, SessionStoreError>> + Send;

    /// Ordered by `round_num` ascending.
    fn fetch_challenge_history(
        &self,
        session_id: i64,
    ) -> impl Future<Output = Result<Vec<ChallengeRoundRow>, SessionStoreError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session not found: {id}")]
    NotFound { id: i64 },
    #[error("connection error: {message}")]
    ConnectionError { message: String },
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// One prior round of a Stage 2 history, fed back into the oracle's
/// `context` on the next `generate` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub round: u32,
    pub prompt: String,
    pub answer: String,
    pub correct: bool,
}

/// Per-session context threaded through Stage 2's rounds.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChallengeContext {
    pub agent_id: String,
    pub history: Vec<HistoryEntry>,
}

/// Challenge generation/validation.
pub trait ChallengeOracle: Send + Sync {
    fn generate(
        &self,
        context: &ChallengeContext,
        round_num: u32,
        prev_answer_hash: &str,
    ) -> impl Future<Output = Result<Challenge, ChallengeOracleError>> + Send;

    fn validate(&self, challenge: &Challenge, answer: &str) -> impl Future<Output = bool> + Send;

    /// When true, Stage 2 includes `mock_correct` in the outbound frame so a
    /// demo peer can answer deterministically. True for the static bank,
    /// false for the remote oracle (its mid-call fallback to the static
    /// bank does not change the outward contract).
    fn is_mock(&self) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChallengeOracleError {
    #[error("network error calling challenge oracle: {message}")]
    Network { message: String },
    #[error("failed to parse oracle response: {message}")]
    Parse { message: String },
    #[error("oracle response did not match the expected schema: {message}")]
    Schema { message: String },
}

/// Bearer token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub agent_id: String,
    pub verified_at: i64,
    pub expires_in: i64,
    pub stages_passed: Vec<u8>,
    pub exp: i64,
    pub iat: i64,
}

/// Token signer. Only HS256 is accepted.
pub trait TokenSigner: Send + Sync {
    fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError>;
    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {reason}")]
    Invalid { reason: String },
}

/// Wall clock port, used for the session `timestamp` column and token
/// `iat`/`exp` only.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
