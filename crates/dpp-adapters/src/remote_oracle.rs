//! LLM-backed challenge oracle.
//!
//! Calls out to a hosted chat-completion endpoint to generate and grade
//! challenges, falling back to [`StaticChallengeOracle`] on any network,
//! parse, or schema failure so a flaky upstream never blocks verification.

use dpp_domain::{Challenge, Scenario};
use dpp_ports::{ChallengeContext, ChallengeOracle, ChallengeOracleError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::static_oracle::StaticChallengeOracle;

const GEN_SYSTEM_PROMPT: &str = "You are generating decision challenges for an agent verification \
service. Each challenge tests whether a respondent is an autonomous AI agent capable of rapid, \
consistent reasoning about operational scenarios. Respond ONLY with valid JSON (no markdown \
fences) in this exact schema: {\"prompt\": string, \"options\": [string, string, string, string], \
\"correct_option\": \"A\"|\"B\"|\"C\"|\"D\", \"rationale\": string}";

const VAL_SYSTEM_PROMPT: &str = "You are validating an answer to an operational decision \
challenge. Given the challenge JSON and the respondent's answer string, determine whether the \
answer is correct or at least semantically equivalent to the correct option. Respond ONLY with \
valid JSON: {\"correct\": true} or {\"correct\": false}";

#[derive(Debug, Clone)]
pub struct RemoteOracleConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

pub struct RemoteChallengeOracle {
    config: RemoteOracleConfig,
    http_client: reqwest::Client,
    fallback: StaticChallengeOracle,
}

impl RemoteChallengeOracle {
    pub fn new(config: RemoteOracleConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
            fallback: StaticChallengeOracle::new(),
        }
    }

    async fn call_completion(
        &self,
        system: &str,
        user_message: &str,
        max_tokens: u32,
    ) -> Result<String, ChallengeOracleError> {
        let request = CompletionRequest {
            model: self.config.model.clone(),
            max_tokens,
            system: system.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: user_message.to_string(),
            }],
        };

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChallengeOracleError::Network {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ChallengeOracleError::Network {
                message: format!("oracle endpoint returned status {}", response.status()),
            });
        }

        let body: CompletionResponse =
            response
                .json()
                .await
                .map_err(|e| ChallengeOracleError::Parse {
                    message: e.to_string(),
                })?;

        body.content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| ChallengeOracleError::Schema {
                message: "completion response had no content blocks".to_string(),
            })
    }
}

/// Strip a leading/trailing markdown code fence, if present.
fn strip_json_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

impl ChallengeOracle for RemoteChallengeOracle {
    async fn generate(
        &self,
        context: &ChallengeContext,
        round_num: u32,
        prev_answer_hash: &str,
    ) -> Result<Challenge, ChallengeOracleError> {
        let scenario = Scenario::for_round(round_num);
        let history_summary = if context.history.is_empty() {
            "First round.".to_string()
        } else {
            format!("Previous {} rounds completed.", context.history.len())
        };
        let user_message = format!(
            "Scenario type: {}\nRound: {round_num}\nContext: {history_summary}\n\
             Prev-answer-hash: {prev_answer_hash}\nGenerate a new challenge for this scenario.",
            scenario.as_str(),
        );

        let raw = match self.call_completion(GEN_SYSTEM_PROMPT, &user_message, 512).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "remote oracle generate failed, using static fallback");
                return self.fallback.generate(context, round_num, prev_answer_hash).await;
            }
        };

        let parsed: Result<GeneratedChallenge, _> = serde_json::from_str(strip_json_fence(&raw));
        match parsed {
            Ok(g) if g.options.len() >= 2 => Ok(Challenge {
                prompt: g.prompt,
                options: g.options,
                correct_option: g.correct_option.chars().next().unwrap_or('A'),
                rationale: g.rationale,
                scenario,
                round_num,
            }),
            Ok(_) => {
                warn!("remote oracle returned fewer than 2 options, using static fallback");
                self.fallback.generate(context, round_num, prev_answer_hash).await
            }
            Err(e) => {
                debug!(error = %e, raw = %raw, "failed to parse remote oracle response");
                self.fallback.generate(context, round_num, prev_answer_hash).await
            }
        }
    }

    async fn validate(&self, challenge: &Challenge, answer: &str) -> bool {
        let user_message = format!(
            "Challenge: {}\nRespondent answer: {answer}",
            serde_json::json!({
                "prompt": challenge.prompt,
                "options": challenge.options,
                "correct_option": challenge.correct_option.to_string(),
            }),
        );

        let raw = match self.call_completion(VAL_SYSTEM_PROMPT, &user_message, 64).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "remote oracle validate failed, using prefix-match fallback");
                return self.fallback.validate(challenge, answer).await;
            }
        };

        match serde_json::from_str::<ValidationResult>(strip_json_fence(&raw)) {
            Ok(result) => result.correct,
            Err(_) => self.fallback.validate(challenge, answer).await,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeneratedChallenge {
    prompt: String,
    options: Vec<String>,
    correct_option: String,
    rationale: String,
}

#[derive(Debug, Deserialize)]
struct ValidationResult {
    correct: bool,
}
