//! Verifier orchestrator (C8): drives stages 1-4 over one connection,
//! persists outcomes, and emits the terminal result frame.

use chrono::Utc;
use dpp_domain::{Timings, Verdict, IN_PROGRESS_REASON};
use dpp_ports::{
    Channel, ChallengeOracle, SessionStore, TokenClaims, TokenSigner,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::StageConfig;
use crate::{stage1, stage2, stage3, stage4};

pub struct VerificationOutcome {
    pub agent_id: String,
    pub verdict: Verdict,
    pub reject_reason: Option<String>,
    pub token: Option<String>,
    pub stages_passed: Vec<u8>,
}

/// Runs the full four-stage protocol over `channel`. `agent_id` is used if
/// provided, else a fresh UUIDv4 is minted.
pub async fn verify<C, S, O, T>(
    channel: &mut C,
    store: &S,
    oracle: &O,
    signer: &T,
    config: &StageConfig,
    agent_id: Option<String>,
) -> VerificationOutcome
where
    C: Channel,
    S: SessionStore,
    O: ChallengeOracle,
    T: TokenSigner,
{
    let agent_id = agent_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let timestamp = Utc::now().timestamp_millis() as f64 / 1000.0;
    let mut timings = Timings::new();
    let mut stage_reached: u8 = 0;
    let mut stages_passed: Vec<u8> = Vec::new();

    let session_id = match store
        .insert_session(&agent_id, 0, timestamp, &timings, false, Some(IN_PROGRESS_REASON))
        .await
    {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(error = %e, "failed to pre-insert session row");
            None
        }
    };

    macro_rules! reject {
        ($reason:expr) => {{
            let reason = $reason;
            info!(%agent_id, stage_reached, reason = %reason, "verification rejected");
            let _ = channel
                .send(serde_json::json!({
                    "type": "result",
                    "verdict": "REJECT",
                    "reason": reason,
                }))
                .await;
            if let Some(id) = session_id {
                let _ = store
                    .update_session(id, stage_reached, &timings, false, Some(&reason))
                    .await;
            }
            return VerificationOutcome {
                agent_id,
                verdict: Verdict::Reject,
                reject_reason: Some(reason),
                token: None,
                stages_passed,
            };
        }};
    }

    // Stage 1 — proof of work
    let s1 = match stage1::run(channel, config).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "stage1 channel error");
            return VerificationOutcome {
                agent_id,
                verdict: Verdict::Reject,
                reject_reason: Some("channel_error".to_string()),
                token: None,
                stages_passed,
            };
        }
    };
    timings.insert("stage1".to_string(), serde_json::json!(s1.elapsed_s));
    if let Some(reason) = s1.reject_reason {
        reject!(reason);
    }
    stage_reached = 1;
    stages_passed.push(1);

    // Stage 2 — decision rounds
    let s2 = match stage2::run(channel, oracle, store, session_id, &agent_id, config).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "stage2 channel error");
            return VerificationOutcome {
                agent_id,
                verdict: Verdict::Reject,
                reject_reason: Some("channel_error".to_string()),
                token: None,
                stages_passed,
            };
        }
    };
    timings.insert("stage2".to_string(), serde_json::json!(s2.sum_s));
    timings.insert("stage2_mean_s".to_string(), serde_json::json!(s2.mean_s));
    timings.insert("stage2_cv".to_string(), serde_json::json!(s2.cv));
    if let Some(reason) = s2.reject_reason {
        reject!(reason);
    }
    stage_reached = 2;
    stages_passed.push(2);

    // Stage 3 — environment attestation
    let s3 = match stage3::run(channel, config).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "stage3 channel error");
            return VerificationOutcome {
                agent_id,
                verdict: Verdict::Reject,
                reject_reason: Some("channel_error".to_string()),
                token: None,
                stages_passed,
            };
        }
    };
    timings.insert("stage3".to_string(), serde_json::json!(s3.elapsed_s));
    if let Some(reason) = s3.reject_reason {
        reject!(reason);
    }
    stage_reached = 3;
    stages_passed.push(3);

    // Stage 4 — cross-session consistency
    let fetch_started = tokio::time::Instant::now();
    let mut history = store.fetch_sessions_by_agent(&agent_id).await.unwrap_or_else(|e| {
        warn!(error = %e, "failed to fetch agent history, treating as empty");
        Vec::new()
    });
    // The current session's own pre-inserted row is in this fetch; Stage 4
    // only looks at *prior* sessions (spec §3/§4.7).
    history.retain(|s| Some(s.id) != session_id);
    timings.insert(
        "stage4_fetch_s".to_string(),
        serde_json::json!(fetch_started.elapsed().as_secs_f64()),
    );
    let s4 = stage4::analyze(&history, config);
    timings.insert("stage4".to_string(), s4.stats);
    if let Some(reason) = s4.reject_reason {
        reject!(reason);
    }
    stage_reached = 4;
    stages_passed.push(4);

    // All four stages passed: mint token and finalize.
    let now = Utc::now().timestamp();
    let claims = TokenClaims {
        agent_id: agent_id.clone(),
        verified_at: now,
        expires_in: config.token_expiry_s,
        stages_passed: stages_passed.clone(),
        iat: now,
        exp: now + config.token_expiry_s,
    };
    let token = match signer.sign(&claims) {
        Ok(token) => token,
        Err(e) => {
            warn!(error = %e, "token signing failed");
            reject!("token_signing_failed".to_string());
        }
    };

    if let Some(id) = session_id {
        if let Err(e) = store.update_session(id, 4, &timings, true, None).await {
            warn!(error = %e, "failed to finalize session row on accept");
        }
    }

    let _ = channel
        .send(serde_json::json!({
            "type": "result",
            "verdict": "ACCEPT",
            "token": token,
            "stages_passed": stages_passed,
        }))
        .await;

    info!(%agent_id, "verification accepted");
    VerificationOutcome {
        agent_id,
        verdict: Verdict::Accept,
        reject_reason: None,
        token: Some(token),
        stages_passed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedChannel;
    use dpp_adapters::{HmacTokenSigner, SqliteSessionStore, StaticChallengeOracle};

    async fn harness() -> (SqliteSessionStore, StaticChallengeOracle, HmacTokenSigner) {
        (
            SqliteSessionStore::connect("sqlite::memory:").await.unwrap(),
            StaticChallengeOracle::new(),
            HmacTokenSigner::new("test-secret"),
        )
    }

    fn agent_env_frame() -> serde_json::Value {
        serde_json::json!({"env": {
            "has_tty": false,
            "display_set": false,
            "uptime_seconds": 3600,
            "open_connections": 5,
            "parent_process": "python",
        }})
    }

    #[tokio::test]
    async fn happy_path_accepts_and_issues_a_token() {
        let (store, oracle, signer) = harness().await;
        let mut config = StageConfig::test();
        config.pow_difficulty = 0;

        let mut frames = vec![serde_json::json!({"solution": "x"})];
        for _ in 0..config.decision_rounds {
            frames.push(serde_json::json!({"answer": "A"}));
        }
        frames.push(agent_env_frame());
        let mut channel = ScriptedChannel::new(frames);

        let outcome = verify(&mut channel, &store, &oracle, &signer, &config, None).await;
        assert!(matches!(outcome.verdict, Verdict::Accept));
        assert_eq!(outcome.stages_passed, vec![1, 2, 3, 4]);
        assert!(outcome.token.is_some());

        let sessions = dpp_ports::SessionStore::fetch_sessions_by_agent(&store, &outcome.agent_id)
            .await
            .unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].passed);
        assert_eq!(sessions[0].stage_reached, 4);
    }

    #[tokio::test]
    async fn pow_timeout_rejects_before_any_other_stage() {
        let (store, oracle, signer) = harness().await;
        let mut config = StageConfig::test();
        config.pow_timeout_ms = 10;

        let mut channel = ScriptedChannel::with_delay(vec![serde_json::json!({"solution": "x"})], 200);
        let outcome = verify(&mut channel, &store, &oracle, &signer, &config, None).await;

        assert!(matches!(outcome.verdict, Verdict::Reject));
        assert_eq!(outcome.reject_reason.as_deref(), Some("stage1_timeout"));
        assert!(outcome.stages_passed.is_empty());

        let sessions = dpp_ports::SessionStore::fetch_sessions_by_agent(&store, &outcome.agent_id)
            .await
            .unwrap();
        assert_eq!(sessions[0].stage_reached, 0);
        assert!(!sessions[0].passed);
    }

    #[tokio::test]
    async fn human_environment_rejects_at_stage_three() {
        let (store, oracle, signer) = harness().await;
        let mut config = StageConfig::test();
        config.pow_difficulty = 0;

        let mut frames = vec![serde_json::json!({"solution": "x"})];
        for _ in 0..config.decision_rounds {
            frames.push(serde_json::json!({"answer": "A"}));
        }
        frames.push(serde_json::json!({"env": {
            "has_tty": true,
            "display_set": true,
            "uptime_seconds": 1800,
            "open_connections": 2,
            "parent_process": "zsh",
        }}));
        let mut channel = ScriptedChannel::new(frames);

        let outcome = verify(&mut channel, &store, &oracle, &signer, &config, None).await;
        assert_eq!(outcome.stages_passed, vec![1, 2]);
        assert_eq!(
            outcome.reject_reason.as_deref(),
            Some("stage3_env_checks_failed=has_tty,display_set,parent_process")
        );
    }

    #[tokio::test]
    async fn caller_supplied_agent_id_is_preserved() {
        let (store, oracle, signer) = harness().await;
        let mut config = StageConfig::test();
        config.pow_timeout_ms = 10;
        let mut channel = ScriptedChannel::with_delay(vec![serde_json::json!({"solution": "x"})], 200);

        let outcome = verify(
            &mut channel,
            &store,
            &oracle,
            &signer,
            &config,
            Some("fixed-agent".to_string()),
        )
        .await;
        assert_eq!(outcome.agent_id, "fixed-agent");
    }

    #[tokio::test]
    async fn stage4_does_not_count_the_current_session_towards_its_own_history() {
        let (store, oracle, signer) = harness().await;
        let mut config = StageConfig::test();
        config.pow_difficulty = 0;
        let agent_id = "agent-with-four-prior-sessions";

        // Exactly four genuine prior sessions: below `min_history_sessions`
        // (5), so Stage 4 must skip. If the in-flight session's own
        // pre-inserted row leaked into the fetch, the count would read 5
        // and the analyzer would run instead.
        for i in 0..4 {
            dpp_ports::SessionStore::insert_session(
                &store,
                agent_id,
                4,
                i as f64 * 100_000.0,
                &dpp_domain::Timings::new(),
                true,
                None,
            )
            .await
            .unwrap();
        }

        let mut frames = vec![serde_json::json!({"solution": "x"})];
        for _ in 0..config.decision_rounds {
            frames.push(serde_json::json!({"answer": "A"}));
        }
        frames.push(serde_json::json!({"env": {
            "has_tty": false,
            "display_set": false,
            "uptime_seconds": 3600,
            "open_connections": 5,
            "parent_process": "python",
        }}));
        let mut channel = ScriptedChannel::new(frames);

        let outcome = verify(
            &mut channel,
            &store,
            &oracle,
            &signer,
            &config,
            Some(agent_id.to_string()),
        )
        .await;

        assert!(matches!(outcome.verdict, Verdict::Accept), "{:?}", outcome.reject_reason);
        assert_eq!(outcome.stages_passed, vec![1, 2, 3, 4]);
    }
}
