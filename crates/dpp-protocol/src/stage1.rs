//! Stage 1 — proof-of-work gate.

use dpp_domain::pow::verify_solution;
use dpp_ports::{Channel, ChannelError};
use rand::RngCore;
use tracing::{debug, instrument};

use crate::config::StageConfig;

pub struct Stage1Outcome {
    pub elapsed_s: f64,
    pub reject_reason: Option<String>,
}

#[instrument(skip(channel, config))]
pub async fn run<C: Channel>(
    channel: &mut C,
    config: &StageConfig,
) -> Result<Stage1Outcome, ChannelError> {
    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);

    channel
        .send(serde_json::json!({
            "stage": 1,
            "type": "pow_challenge",
            "nonce": hex::encode(nonce),
            "difficulty": config.pow_difficulty,
            "timeout_ms": config.pow_timeout_ms,
        }))
        .await?;

    let started = tokio::time::Instant::now();
    let deadline = std::time::Duration::from_millis(config.pow_timeout_ms);

    let frame = match tokio::time::timeout(deadline, channel.recv()).await {
        Ok(Ok(frame)) => frame,
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            return Ok(Stage1Outcome {
                elapsed_s: started.elapsed().as_secs_f64(),
                reject_reason: Some("stage1_timeout".to_string()),
            })
        }
    };

    let elapsed_s = started.elapsed().as_secs_f64();
    let solution = frame
        .get("solution")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    if !verify_solution(&nonce, solution, config.pow_difficulty) {
        debug!("stage1 solution failed verification");
        return Ok(Stage1Outcome {
            elapsed_s,
            reject_reason: Some("stage1_invalid_solution".to_string()),
        });
    }

    Ok(Stage1Outcome {
        elapsed_s,
        reject_reason: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedChannel;

    #[tokio::test]
    async fn passes_a_correctly_solved_challenge() {
        let mut config = StageConfig::test();
        config.pow_difficulty = 0;
        let mut channel = ScriptedChannel::new(vec![serde_json::json!({"solution": "anything"})]);
        let outcome = run(&mut channel, &config).await.unwrap();
        assert!(outcome.reject_reason.is_none());
    }

    #[tokio::test]
    async fn rejects_a_wrong_solution() {
        let mut config = StageConfig::test();
        config.pow_difficulty = 8;
        let mut channel = ScriptedChannel::new(vec![serde_json::json!({"solution": "wrong"})]);
        let outcome = run(&mut channel, &config).await.unwrap();
        assert_eq!(outcome.reject_reason.as_deref(), Some("stage1_invalid_solution"));
    }

    #[tokio::test]
    async fn times_out_when_no_response_arrives() {
        let mut config = StageConfig::test();
        config.pow_timeout_ms = 10;
        let mut channel = ScriptedChannel::with_delay(vec![serde_json::json!({"solution": "x"})], 200);
        let outcome = run(&mut channel, &config).await.unwrap();
        assert_eq!(outcome.reject_reason.as_deref(), Some("stage1_timeout"));
    }
}
