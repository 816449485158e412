//! Stage 2 — chained semantic decision rounds.

use dpp_domain::stats::coefficient_of_variation;
use dpp_domain::{ChallengeResponse, Scenario};
use dpp_ports::{
    Channel, ChallengeContext, ChallengeOracle, ChannelError, HistoryEntry, SessionStore,
};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::StageConfig;

pub struct Stage2Outcome {
    pub responses: Vec<ChallengeResponse>,
    pub mean_s: f64,
    pub cv: f64,
    pub sum_s: f64,
    pub reject_reason: Option<String>,
}

fn prev_answer_hash(answer: &str) -> String {
    let digest = Sha256::digest(answer.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// `session_id`, when present, is used to best-effort persist each round as
/// it completes; a persistence failure is logged and does not fail the
/// stage.
pub async fn run<C: Channel, O: ChallengeOracle, S: SessionStore>(
    channel: &mut C,
    oracle: &O,
    store: &S,
    session_id: Option<i64>,
    agent_id: &str,
    config: &StageConfig,
) -> Result<Stage2Outcome, ChannelError> {
    let mut responses = Vec::with_capacity(config.decision_rounds as usize);
    let mut context = ChallengeContext {
        agent_id: agent_id.to_string(),
        history: Vec::new(),
    };
    let mut prev_hash = String::new();

    for round_num in 1..=config.decision_rounds {
        let challenge = oracle
            .generate(&context, round_num, &prev_hash)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, round = round_num, "challenge generation failed entirely");
                fallback_challenge(round_num)
            });

        let mut frame = serde_json::json!({
            "stage": 2,
            "type": "decision_challenge",
            "round": round_num,
            "total_rounds": config.decision_rounds,
            "prompt": challenge.prompt,
            "options": challenge.options,
            "prev_answer_hash": prev_hash,
        });
        if oracle.is_mock() {
            frame["mock_correct"] = serde_json::json!(challenge.correct_option.to_string());
        }
        channel.send(frame).await?;

        let deadline = std::time::Duration::from_secs_f64(config.decision_timeout_s);
        let started = tokio::time::Instant::now();

        let frame = match tokio::time::timeout(deadline, channel.recv()).await {
            Ok(Ok(frame)) => frame,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Ok(Stage2Outcome {
                    responses,
                    mean_s: 0.0,
                    cv: 0.0,
                    sum_s: started.elapsed().as_secs_f64(),
                    reject_reason: Some(format!("stage2_timeout_round{round_num}")),
                })
            }
        };

        let elapsed_s = started.elapsed().as_secs_f64();
        let answer = frame.get("answer").and_then(|v| v.as_str()).unwrap_or("");
        let correct = oracle.validate(&challenge, answer).await;

        if let Some(id) = session_id {
            if let Err(e) = store
                .insert_challenge_round(id, round_num, &challenge.prompt, answer, correct, elapsed_s)
                .await
            {
                warn!(error = %e, round = round_num, "failed to persist challenge round");
            }
        }

        responses.push(ChallengeResponse {
            round_num,
            answer: answer.to_string(),
            elapsed_s,
            correct,
        });
        context.history.push(HistoryEntry {
            round: round_num,
            prompt: challenge.prompt.clone(),
            answer: answer.to_string(),
            correct,
        });
        prev_hash = prev_answer_hash(answer);
    }

    let timings: Vec<f64> = responses.iter().map(|r| r.elapsed_s).collect();
    let mean_s = timings.iter().sum::<f64>() / timings.len() as f64;
    let cv = coefficient_of_variation(&timings);
    let sum_s = timings.iter().sum();

    if cv > config.decision_cv_threshold {
        return Ok(Stage2Outcome {
            responses,
            mean_s,
            cv,
            sum_s,
            reject_reason: Some(format!("stage2_timing_variance_cv={cv:.3}")),
        });
    }

    let correct_count = responses.iter().filter(|r| r.correct).count();
    let required = (config.decision_rounds as f64 * 0.7).ceil() as usize;
    if correct_count < required {
        info!(correct_count, required, "stage2 accuracy gate failed");
        return Ok(Stage2Outcome {
            responses,
            mean_s,
            cv,
            sum_s,
            reject_reason: Some(format!(
                "stage2_low_accuracy_{correct_count}/{}",
                config.decision_rounds
            )),
        });
    }

    Ok(Stage2Outcome {
        responses,
        mean_s,
        cv,
        sum_s,
        reject_reason: None,
    })
}

fn fallback_challenge(round_num: u32) -> dpp_domain::Challenge {
    dpp_domain::Challenge {
        prompt: format!("Round {round_num}: choose the most operationally sound action."),
        options: vec![
            "A: Immediate rollback".to_string(),
            "B: Gradual rollback".to_string(),
            "C: Monitor only".to_string(),
            "D: Escalate".to_string(),
        ],
        correct_option: 'A',
        rationale: "Immediate rollback minimises blast radius.".to_string(),
        scenario: Scenario::for_round(round_num),
        round_num,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedChannel;
    use dpp_adapters::{SqliteSessionStore, StaticChallengeOracle};

    async fn test_store() -> SqliteSessionStore {
        SqliteSessionStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn correct_low_variance_answers_pass_both_gates() {
        let config = StageConfig::test();
        let oracle = StaticChallengeOracle::new();
        let store = test_store().await;
        let frames: Vec<serde_json::Value> = (0..config.decision_rounds)
            .map(|_| serde_json::json!({"answer": "A"}))
            .collect();
        let mut channel = ScriptedChannel::new(frames);
        let outcome = run(&mut channel, &oracle, &store, None, "agent-1", &config)
            .await
            .unwrap();
        assert!(outcome.reject_reason.is_none(), "{:?}", outcome.reject_reason);
    }

    #[tokio::test]
    async fn wrong_answers_trigger_low_accuracy_reject() {
        let config = StageConfig::test();
        let oracle = StaticChallengeOracle::new();
        let store = test_store().await;
        let frames: Vec<serde_json::Value> = (0..config.decision_rounds)
            .map(|_| serde_json::json!({"answer": "Z"}))
            .collect();
        let mut channel = ScriptedChannel::new(frames);
        let outcome = run(&mut channel, &oracle, &store, None, "agent-1", &config)
            .await
            .unwrap();
        assert!(outcome
            .reject_reason
            .as_deref()
            .unwrap()
            .starts_with("stage2_low_accuracy_"));
    }

    #[tokio::test]
    async fn round_timeout_rejects_immediately() {
        let mut config = StageConfig::test();
        config.decision_timeout_s = 0.01;
        let oracle = StaticChallengeOracle::new();
        let store = test_store().await;
        let mut channel = ScriptedChannel::with_delay(vec![serde_json::json!({"answer": "A"})], 200);
        let outcome = run(&mut channel, &oracle, &store, None, "agent-1", &config)
            .await
            .unwrap();
        assert_eq!(outcome.reject_reason.as_deref(), Some("stage2_timeout_round1"));
    }

    #[tokio::test]
    async fn completed_rounds_are_persisted_when_a_session_id_is_given() {
        let config = StageConfig::test();
        let oracle = StaticChallengeOracle::new();
        let store = test_store().await;
        let session_id = store
            .insert_session("agent-1", 1, 0.0, &dpp_domain::Timings::new(), false, None)
            .await
            .unwrap();
        let frames: Vec<serde_json::Value> = (0..config.decision_rounds)
            .map(|_| serde_json::json!({"answer": "A"}))
            .collect();
        let mut channel = ScriptedChannel::new(frames);
        run(&mut channel, &oracle, &store, Some(session_id), "agent-1", &config)
            .await
            .unwrap();

        let history = dpp_ports::SessionStore::fetch_challenge_history(&store, session_id)
            .await
            .unwrap();
        assert_eq!(history.len(), config.decision_rounds as usize);
    }
}
