//! Stage 3 — one-shot environment attestation, majority-rule scoring.

use dpp_ports::{Channel, ChannelError};
use tracing::debug;

use crate::config::StageConfig;

const REQUIRED_FIELDS: &[&str] = &[
    "has_tty",
    "display_set",
    "uptime_seconds",
    "open_connections",
    "parent_process",
];

const HUMAN_SHELLS: &[&str] = &["bash", "zsh", "sh", "fish", "cmd", "powershell", "pwsh"];

pub struct Stage3Outcome {
    pub elapsed_s: f64,
    pub env_data: serde_json::Value,
    pub reject_reason: Option<String>,
}

fn evaluate(env: &serde_json::Value) -> (u32, Vec<&'static str>) {
    let mut passed = 0;
    let mut failed = Vec::new();

    if env.get("has_tty").and_then(|v| v.as_bool()) == Some(false) {
        passed += 1;
    } else {
        failed.push("has_tty");
    }

    let display_set = env
        .get("display_set")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !display_set {
        passed += 1;
    } else {
        failed.push("display_set");
    }

    let uptime_ok = env
        .get("uptime_seconds")
        .and_then(|v| v.as_f64())
        .map(|u| u >= 0.0)
        .unwrap_or(false);
    if uptime_ok {
        passed += 1;
    } else {
        failed.push("uptime_seconds");
    }

    let conns_ok = env
        .get("open_connections")
        .and_then(|v| v.as_i64())
        .map(|c| c >= 0)
        .unwrap_or(false);
    if conns_ok {
        passed += 1;
    } else {
        failed.push("open_connections");
    }

    let parent = env
        .get("parent_process")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_lowercase();
    if !parent.is_empty() && !HUMAN_SHELLS.contains(&parent.as_str()) {
        passed += 1;
    } else {
        failed.push("parent_process");
    }

    (passed, failed)
}

pub async fn run<C: Channel>(
    channel: &mut C,
    config: &StageConfig,
) -> Result<Stage3Outcome, ChannelError> {
    channel
        .send(serde_json::json!({
            "stage": 3,
            "type": "env_request",
            "required_fields": REQUIRED_FIELDS,
        }))
        .await?;

    let deadline = std::time::Duration::from_secs_f64(config.env_timeout_s);
    let started = tokio::time::Instant::now();

    let frame = match tokio::time::timeout(deadline, channel.recv()).await {
        Ok(Ok(frame)) => frame,
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            return Ok(Stage3Outcome {
                elapsed_s: started.elapsed().as_secs_f64(),
                env_data: serde_json::Value::Null,
                reject_reason: Some("stage3_timeout".to_string()),
            })
        }
    };

    let elapsed_s = started.elapsed().as_secs_f64();
    let env = frame
        .get("env")
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    let (passed_count, failed) = evaluate(&env);
    debug!(passed_count, ?failed, "stage3 checks evaluated");

    if passed_count < 4 {
        return Ok(Stage3Outcome {
            elapsed_s,
            env_data: env,
            reject_reason: Some(format!("stage3_env_checks_failed={}", failed.join(","))),
        });
    }

    Ok(Stage3Outcome {
        elapsed_s,
        env_data: env,
        reject_reason: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedChannel;

    fn agent_env() -> serde_json::Value {
        serde_json::json!({
            "has_tty": false,
            "display_set": false,
            "uptime_seconds": 3600,
            "open_connections": 5,
            "parent_process": "python",
        })
    }

    #[tokio::test]
    async fn full_agent_environment_passes() {
        let config = StageConfig::test();
        let mut channel = ScriptedChannel::new(vec![serde_json::json!({"env": agent_env()})]);
        let outcome = run(&mut channel, &config).await.unwrap();
        assert!(outcome.reject_reason.is_none());
    }

    #[tokio::test]
    async fn exactly_four_of_five_checks_still_passes() {
        let config = StageConfig::test();
        let mut env = agent_env();
        env["parent_process"] = serde_json::json!("bash");
        let mut channel = ScriptedChannel::new(vec![serde_json::json!({"env": env})]);
        let outcome = run(&mut channel, &config).await.unwrap();
        assert!(outcome.reject_reason.is_none());
    }

    #[tokio::test]
    async fn human_like_environment_fails_three_checks() {
        let config = StageConfig::test();
        let env = serde_json::json!({
            "has_tty": true,
            "display_set": true,
            "uptime_seconds": 1800,
            "open_connections": 2,
            "parent_process": "zsh",
        });
        let mut channel = ScriptedChannel::new(vec![serde_json::json!({"env": env})]);
        let outcome = run(&mut channel, &config).await.unwrap();
        assert_eq!(
            outcome.reject_reason.as_deref(),
            Some("stage3_env_checks_failed=has_tty,display_set,parent_process")
        );
    }

    #[tokio::test]
    async fn timeout_rejects() {
        let mut config = StageConfig::test();
        config.env_timeout_s = 0.01;
        let mut channel = ScriptedChannel::with_delay(vec![serde_json::json!({"env": agent_env()})], 200);
        let outcome = run(&mut channel, &config).await.unwrap();
        assert_eq!(outcome.reject_reason.as_deref(), Some("stage3_timeout"));
    }
}
