//! Core data model: challenges, sessions, and their persisted row shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scenario::Scenario;

/// One of the four sequential gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Stage {
    ProofOfWork = 1,
    Decisions = 2,
    Environment = 3,
    Consistency = 4,
}

/// Terminal verdict of one verification session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Accept,
    Reject,
}

/// One round's multiple-choice challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub prompt: String,
    /// Ordered sequence of 2-8 labeled choices; label is the first
    /// character of each option string (typically A-D).
    pub options: Vec<String>,
    pub correct_option: char,
    /// Not sent to the peer.
    pub rationale: String,
    pub scenario: Scenario,
    pub round_num: u32,
}

impl Challenge {
    /// The label implied by an option string, or `None` if the string is empty.
    pub fn label_of(option: &str) -> Option<char> {
        option.chars().next()
    }
}

/// One round's answer, as recorded by Stage 2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub round_num: u32,
    pub answer: String,
    pub elapsed_s: f64,
    pub correct: bool,
}

/// Per-session timing/stat bag. Most values are seconds (f64); `stage4`
/// holds the analyzer's full stats object, so the map is JSON-valued.
pub type Timings = BTreeMap<String, serde_json::Value>;

/// Transient, per-connection verification state.
#[derive(Debug, Clone)]
pub struct Session {
    pub agent_id: String,
    pub nonce: [u8; 16],
    pub stage_reached: u8,
    pub timings: Timings,
    pub challenge_responses: Vec<ChallengeResponse>,
    pub env_data: serde_json::Value,
}

impl Session {
    pub fn new(agent_id: String) -> Self {
        Self {
            agent_id,
            nonce: [0u8; 16],
            stage_reached: 0,
            timings: Timings::new(),
            challenge_responses: Vec::new(),
            env_data: serde_json::Value::Null,
        }
    }

    pub fn record_timing(&mut self, key: &str, seconds: f64) {
        self.timings
            .insert(key.to_string(), serde_json::json!(seconds));
    }
}

/// The sentinel reject_reason used between pre-insert and final update.
pub const IN_PROGRESS_REASON: &str = "in_progress";

/// Persisted session row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: i64,
    pub agent_id: String,
    pub stage_reached: u8,
    /// Wall-clock seconds, fixed at session start.
    pub timestamp: f64,
    pub timings: Timings,
    pub passed: bool,
    pub reject_reason: Option<String>,
}

/// Persisted challenge round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRoundRow {
    pub session_id: i64,
    pub round_num: u32,
    pub challenge_text: String,
    pub response_text: String,
    pub correct: bool,
    pub response_time_s: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_of_takes_first_char() {
        assert_eq!(Challenge::label_of("A: roll back"), Some('A'));
        assert_eq!(Challenge::label_of(""), None);
    }

    #[test]
    fn session_starts_at_stage_zero() {
        let session = Session::new("agent-1".to_string());
        assert_eq!(session.stage_reached, 0);
        assert!(session.challenge_responses.is_empty());
    }
}
