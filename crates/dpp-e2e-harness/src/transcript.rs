//! Deterministic record of one scenario run, for audit and for asserting
//! the invariants the protocol is supposed to uphold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessTranscript {
    pub scenario: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: TranscriptStatus,
    pub entries: Vec<TranscriptEntry>,
    pub invariants_checked: Vec<InvariantCheck>,
    pub content_hash: Option<String>,
}

impl HarnessTranscript {
    pub fn new(scenario: &str) -> Self {
        Self {
            scenario: scenario.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            status: TranscriptStatus::Running,
            entries: Vec::new(),
            invariants_checked: Vec::new(),
            content_hash: None,
        }
    }

    pub fn record(&mut self, kind: TranscriptEntryKind, description: impl Into<String>, details: Option<serde_json::Value>) {
        self.entries.push(TranscriptEntry {
            sequence: self.entries.len() as u32 + 1,
            timestamp: Utc::now(),
            kind,
            description: description.into(),
            details,
        });
    }

    pub fn check_invariant(&mut self, name: &str, passed: bool, message: impl Into<String>) {
        self.invariants_checked.push(InvariantCheck {
            name: name.to_string(),
            passed,
            message: message.into(),
        });
    }

    pub fn mark_success(&mut self) {
        self.ended_at = Some(Utc::now());
        self.status = TranscriptStatus::Success;
        self.compute_hash();
    }

    pub fn mark_failed(&mut self, error: &str) {
        self.ended_at = Some(Utc::now());
        self.status = TranscriptStatus::Failed {
            error: error.to_string(),
        };
        self.compute_hash();
    }

    fn compute_hash(&mut self) {
        let mut hasher = Sha256::new();
        hasher.update(self.scenario.as_bytes());
        hasher.update(self.started_at.to_rfc3339().as_bytes());
        for entry in &self.entries {
            hasher.update(entry.sequence.to_le_bytes());
            hasher.update(format!("{:?}", entry.kind).as_bytes());
            hasher.update(entry.description.as_bytes());
        }
        self.content_hash = Some(format!("sha256:{}", hex::encode(hasher.finalize())));
    }

    pub fn all_invariants_passed(&self) -> bool {
        self.invariants_checked.iter().all(|i| i.passed)
    }

    pub fn failed_invariants(&self) -> Vec<&InvariantCheck> {
        self.invariants_checked.iter().filter(|i| !i.passed).collect()
    }

    pub fn to_deterministic_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&serde_json::to_value(self)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TranscriptStatus {
    Running,
    Success,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub sequence: u32,
    pub timestamp: DateTime<Utc>,
    pub kind: TranscriptEntryKind,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TranscriptEntryKind {
    HarnessStart,
    HarnessComplete,
    ConnectionOpened,
    Stage1PowSolved,
    Stage1PowSkipped,
    Stage2RoundAnswered,
    Stage3EnvironmentSubmitted,
    ResultAccepted,
    ResultRejected,
    InvariantCheck,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheck {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_entries_in_sequence() {
        let mut transcript = HarnessTranscript::new("happy_path");
        transcript.record(TranscriptEntryKind::HarnessStart, "starting", None);
        transcript.record(TranscriptEntryKind::ConnectionOpened, "connected", None);
        assert_eq!(transcript.entries[0].sequence, 1);
        assert_eq!(transcript.entries[1].sequence, 2);
    }

    #[test]
    fn invariant_failures_are_reported() {
        let mut transcript = HarnessTranscript::new("happy_path");
        transcript.check_invariant("token_issued_only_on_accept", true, "ok");
        transcript.check_invariant("no_token_on_reject", false, "token leaked on reject");
        assert!(!transcript.all_invariants_passed());
        assert_eq!(transcript.failed_invariants().len(), 1);
    }

    #[test]
    fn success_computes_a_content_hash() {
        let mut transcript = HarnessTranscript::new("happy_path");
        transcript.record(TranscriptEntryKind::HarnessStart, "starting", None);
        transcript.mark_success();
        assert!(transcript.content_hash.as_deref().unwrap().starts_with("sha256:"));
    }
}
