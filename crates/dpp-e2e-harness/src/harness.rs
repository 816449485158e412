//! Scenario runners driving the verification protocol end to end against a
//! live `dpp-server`, recording a transcript and asserting the invariants
//! the protocol is supposed to uphold: a bearer token is issued if and only
//! if all four stages pass, and every rejection names the stage and reason.

use std::time::Duration;

use dpp_domain::pow::verify_solution;
use tracing::{info, instrument};

use crate::client::{ApiClient, ClientError, DppClient};
use crate::transcript::{HarnessTranscript, TranscriptEntryKind};

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub ws_url: String,
    pub http_base_url: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            ws_url: std::env::var("DPP_WS_URL")
                .unwrap_or_else(|_| "ws://localhost:8080/ws/verify".to_string()),
            http_base_url: std::env::var("DPP_HTTP_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
        }
    }
}

pub struct HarnessResult {
    pub transcript: HarnessTranscript,
    pub success: bool,
    pub error: Option<String>,
}

/// One round's scripted answer.
#[derive(Clone, Copy)]
pub struct RoundPlan {
    pub answer_correctly: bool,
    pub delay: Duration,
}

/// Everything a scenario needs to script one connection.
pub struct ScenarioPlan {
    pub agent_id: Option<String>,
    pub solve_pow: bool,
    pub pow_delay: Duration,
    pub rounds: Vec<RoundPlan>,
    pub environment: serde_json::Value,
}

impl ScenarioPlan {
    fn agent_environment() -> serde_json::Value {
        serde_json::json!({
            "has_tty": false,
            "display_set": false,
            "uptime_seconds": 1800,
            "open_connections": 4,
            "parent_process": "python3",
        })
    }

    fn human_environment() -> serde_json::Value {
        serde_json::json!({
            "has_tty": true,
            "display_set": true,
            "uptime_seconds": 600,
            "open_connections": 2,
            "parent_process": "zsh",
        })
    }

    pub fn happy_path(rounds: u32) -> Self {
        Self {
            agent_id: None,
            solve_pow: true,
            pow_delay: Duration::from_millis(5),
            rounds: vec![
                RoundPlan { answer_correctly: true, delay: Duration::from_millis(40) };
                rounds as usize
            ],
            environment: Self::agent_environment(),
        }
    }

    pub fn pow_timeout(rounds: u32) -> Self {
        Self {
            solve_pow: false,
            pow_delay: Duration::from_millis(500),
            ..Self::happy_path(rounds)
        }
    }

    pub fn low_accuracy(rounds: u32) -> Self {
        Self {
            rounds: vec![
                RoundPlan { answer_correctly: false, delay: Duration::from_millis(40) };
                rounds as usize
            ],
            ..Self::happy_path(rounds)
        }
    }

    /// Irregular, human-scale response times despite always answering
    /// correctly: trips the post-hoc timing-variance gate.
    pub fn timing_variance(rounds: u32) -> Self {
        let delays_ms = [20u64, 900, 60, 1100, 40, 750, 30, 950, 25, 800];
        let rounds_plan = (0..rounds as usize)
            .map(|i| RoundPlan {
                answer_correctly: true,
                delay: Duration::from_millis(delays_ms[i % delays_ms.len()]),
            })
            .collect();
        Self {
            rounds: rounds_plan,
            ..Self::happy_path(rounds)
        }
    }

    pub fn human_environment_scenario(rounds: u32) -> Self {
        Self {
            environment: Self::human_environment(),
            ..Self::happy_path(rounds)
        }
    }
}

/// Connects, scripts the whole four-stage exchange per `plan`, and returns
/// the terminal result frame.
async fn drive(
    client: &mut DppClient,
    plan: &ScenarioPlan,
    transcript: &mut HarnessTranscript,
) -> Result<serde_json::Value, ClientError> {
    loop {
        let frame = client.recv().await?;
        match frame.get("type").and_then(|v| v.as_str()) {
            Some("pow_challenge") => {
                tokio::time::sleep(plan.pow_delay).await;
                if !plan.solve_pow {
                    // Deliberately never answer; the server's own timeout fires
                    // and the next recv() on this socket yields its reject frame.
                    transcript.record(TranscriptEntryKind::Stage1PowSkipped, "withholding PoW solution", None);
                    continue;
                }
                let nonce = hex::decode(frame["nonce"].as_str().unwrap_or_default()).unwrap_or_default();
                let difficulty = frame["difficulty"].as_u64().unwrap_or(0) as u32;
                let solution = find_pow_solution(&nonce, difficulty);
                client.send(&serde_json::json!({"solution": solution})).await?;
                transcript.record(TranscriptEntryKind::Stage1PowSolved, "solved PoW challenge", None);
            }
            Some("decision_challenge") => {
                let round_num = frame["round"].as_u64().unwrap_or(1) as usize;
                let plan_round = plan.rounds[(round_num - 1).min(plan.rounds.len() - 1)];
                tokio::time::sleep(plan_round.delay).await;

                let answer = if plan_round.answer_correctly {
                    frame
                        .get("mock_correct")
                        .and_then(|v| v.as_str())
                        .unwrap_or("A")
                        .to_string()
                } else {
                    let correct = frame.get("mock_correct").and_then(|v| v.as_str());
                    ["A", "B", "C", "D"]
                        .into_iter()
                        .find(|l| Some(*l) != correct)
                        .unwrap_or("Z")
                        .to_string()
                };
                client.send(&serde_json::json!({"answer": answer})).await?;
                transcript.record(
                    TranscriptEntryKind::Stage2RoundAnswered,
                    format!("round {round_num} answered"),
                    Some(serde_json::json!({"round": round_num, "answer": answer})),
                );
            }
            Some("env_request") => {
                client.send(&serde_json::json!({"env": plan.environment})).await?;
                transcript.record(TranscriptEntryKind::Stage3EnvironmentSubmitted, "submitted environment", None);
            }
            Some("result") => return Ok(frame),
            other => return Err(ClientError::UnexpectedFrame(format!("{other:?}"))),
        }
    }
}

fn find_pow_solution(nonce: &[u8], difficulty: u32) -> String {
    for counter in 0u64.. {
        let candidate = counter.to_string();
        if verify_solution(nonce, &candidate, difficulty) {
            return candidate;
        }
    }
    unreachable!()
}

/// Runs one connection through `plan` and asserts the token-issuance
/// invariant: a bearer token appears iff the verdict is ACCEPT, never
/// alongside a reject reason.
#[instrument(skip(config, plan))]
async fn run_scenario(
    name: &str,
    config: &HarnessConfig,
    plan: ScenarioPlan,
) -> HarnessResult {
    let mut transcript = HarnessTranscript::new(name);
    transcript.record(TranscriptEntryKind::HarnessStart, format!("running scenario {name}"), None);

    let outcome = async {
        let ws_url = match &plan.agent_id {
            Some(id) => format!("{}?agent_id={}", config.ws_url, id),
            None => config.ws_url.clone(),
        };
        let mut client = DppClient::connect(&ws_url).await?;
        transcript.record(TranscriptEntryKind::ConnectionOpened, "connected", None);
        drive(&mut client, &plan, &mut transcript).await
    }
    .await;

    match outcome {
        Ok(result) => {
            let verdict = result.get("verdict").and_then(|v| v.as_str()).unwrap_or("");
            let token = result.get("token").and_then(|v| v.as_str());
            let reason = result.get("reason").and_then(|v| v.as_str());

            transcript.check_invariant(
                "token_only_on_accept",
                (verdict == "ACCEPT") == token.is_some(),
                format!("verdict={verdict} token_present={}", token.is_some()),
            );
            transcript.check_invariant(
                "reject_always_has_reason",
                verdict != "REJECT" || reason.is_some(),
                "a REJECT verdict must name a reason",
            );

            transcript.record(
                if verdict == "ACCEPT" {
                    TranscriptEntryKind::ResultAccepted
                } else {
                    TranscriptEntryKind::ResultRejected
                },
                format!("terminal verdict: {verdict}"),
                Some(result.clone()),
            );

            info!(%verdict, reason, "scenario finished");
            transcript.mark_success();
            HarnessResult { transcript, success: true, error: None }
        }
        Err(e) => {
            transcript.mark_failed(&e.to_string());
            HarnessResult { transcript, success: false, error: Some(e.to_string()) }
        }
    }
}

const DEFAULT_ROUNDS: u32 = 10;

pub async fn run_happy_path(config: HarnessConfig) -> HarnessResult {
    run_scenario("happy_path", &config, ScenarioPlan::happy_path(DEFAULT_ROUNDS)).await
}

pub async fn run_pow_timeout(config: HarnessConfig) -> HarnessResult {
    run_scenario("pow_timeout", &config, ScenarioPlan::pow_timeout(DEFAULT_ROUNDS)).await
}

pub async fn run_stage2_low_accuracy(config: HarnessConfig) -> HarnessResult {
    run_scenario("stage2_low_accuracy", &config, ScenarioPlan::low_accuracy(DEFAULT_ROUNDS)).await
}

pub async fn run_stage2_timing_variance(config: HarnessConfig) -> HarnessResult {
    run_scenario(
        "stage2_timing_variance",
        &config,
        ScenarioPlan::timing_variance(DEFAULT_ROUNDS),
    )
    .await
}

pub async fn run_stage3_human_environment(config: HarnessConfig) -> HarnessResult {
    run_scenario(
        "stage3_human_environment",
        &config,
        ScenarioPlan::human_environment_scenario(DEFAULT_ROUNDS),
    )
    .await
}

/// Replays the happy path for the same agent enough times to populate the
/// history Stage 4 inspects, with deliberately irregular PoW-solve delays
/// across attempts, then runs one final attempt expecting a Stage 4 reject.
pub async fn run_stage4_clustered_history(config: HarnessConfig) -> HarnessResult {
    let agent_id = format!("e2e-stage4-{}", uuid::Uuid::new_v4());
    let pow_delays_ms = [10u64, 400, 30, 500, 20];

    for delay_ms in pow_delays_ms {
        let mut plan = ScenarioPlan::happy_path(DEFAULT_ROUNDS);
        plan.agent_id = Some(agent_id.clone());
        plan.pow_delay = Duration::from_millis(delay_ms);
        let warmup = run_scenario("stage4_warmup", &config, plan).await;
        if !warmup.success {
            return warmup;
        }
    }

    let mut plan = ScenarioPlan::happy_path(DEFAULT_ROUNDS);
    plan.agent_id = Some(agent_id);
    run_scenario("stage4_clustered_history", &config, plan).await
}

pub async fn run_all(config: HarnessConfig) -> Vec<HarnessResult> {
    vec![
        run_happy_path(config.clone()).await,
        run_pow_timeout(config.clone()).await,
        run_stage2_low_accuracy(config.clone()).await,
        run_stage2_timing_variance(config.clone()).await,
        run_stage3_human_environment(config.clone()).await,
        run_stage4_clustered_history(config).await,
    ]
}

/// Decodes the token from a successful result through the REST surface, as
/// an independent cross-check that the signer and `/verify` agree.
pub async fn cross_check_token(config: &HarnessConfig, token: &str) -> Result<serde_json::Value, ClientError> {
    ApiClient::new(&config.http_base_url).verify_token(token).await
}
