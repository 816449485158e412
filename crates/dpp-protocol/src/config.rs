//! Tunable protocol parameters. Owned here (rather than in `dpp-server`) so
//! `dpp-e2e-harness` can drive the orchestrator without depending on the
//! HTTP crate.

#[derive(Debug, Clone)]
pub struct StageConfig {
    pub pow_difficulty: u32,
    pub pow_timeout_ms: u64,
    pub decision_rounds: u32,
    pub decision_timeout_s: f64,
    pub decision_cv_threshold: f64,
    pub env_timeout_s: f64,
    pub min_history_sessions: usize,
    pub stage1_cv_reject_threshold: f64,
    pub min_sessions_for_hour_check: usize,
    pub hour_std_reject_threshold: f64,
    pub token_expiry_s: i64,
}

impl StageConfig {
    /// Matches the defaults named in configuration: `pow_difficulty=4`,
    /// `pow_timeout_ms=200`, `decision_rounds=10`, `decision_timeout_s=1.5`.
    pub fn defaults() -> Self {
        Self {
            pow_difficulty: 4,
            pow_timeout_ms: 200,
            decision_rounds: 10,
            decision_timeout_s: 1.5,
            decision_cv_threshold: 0.8,
            env_timeout_s: 5.0,
            min_history_sessions: 5,
            stage1_cv_reject_threshold: 0.6,
            min_sessions_for_hour_check: 10,
            hour_std_reject_threshold: 3.0,
            token_expiry_s: 3600,
        }
    }

    /// Tighter timeouts and fewer rounds for fast-running tests.
    pub fn test() -> Self {
        Self {
            pow_difficulty: 1,
            pow_timeout_ms: 1000,
            decision_rounds: 3,
            decision_timeout_s: 2.0,
            ..Self::defaults()
        }
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self::defaults()
    }
}
