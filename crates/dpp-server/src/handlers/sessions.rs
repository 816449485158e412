//! `GET /sessions/{agent_id}` and `GET /sessions/{agent_id}/history/{session_id}`
//! — read-only session and per-round introspection.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use dpp_domain::Timings;
use dpp_ports::SessionStore;
use serde::Serialize;

use crate::handlers::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub id: i64,
    pub agent_id: String,
    pub stage_reached: u8,
    pub timestamp: f64,
    pub timings: Timings,
    pub passed: bool,
    pub reject_reason: Option<String>,
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<Vec<SessionSummary>>> {
    let sessions = state.store.fetch_sessions_by_agent(&agent_id).await?;
    if sessions.is_empty() {
        return Err(ApiError::NotFound {
            resource: "agent".to_string(),
            id: agent_id,
        });
    }

    Ok(Json(
        sessions
            .into_iter()
            .map(|s| SessionSummary {
                id: s.id,
                agent_id: s.agent_id,
                stage_reached: s.stage_reached,
                timestamp: s.timestamp,
                timings: s.timings,
                passed: s.passed,
                reject_reason: s.reject_reason,
            })
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
pub struct ChallengeRoundSummary {
    pub round_num: u32,
    pub challenge_text: String,
    pub response_text: String,
    pub correct: bool,
    pub response_time_s: f64,
}

pub async fn session_history(
    State(state): State<Arc<AppState>>,
    Path((agent_id, session_id)): Path<(String, i64)>,
) -> ApiResult<Json<Vec<ChallengeRoundSummary>>> {
    let sessions = state.store.fetch_sessions_by_agent(&agent_id).await?;
    if !sessions.iter().any(|s| s.id == session_id) {
        return Err(ApiError::NotFound {
            resource: "session".to_string(),
            id: session_id.to_string(),
        });
    }

    let history = state.store.fetch_challenge_history(session_id).await?;
    Ok(Json(
        history
            .into_iter()
            .map(|r| ChallengeRoundSummary {
                round_num: r.round_num,
                challenge_text: r.challenge_text,
                response_text: r.response_text,
                correct: r.correct,
                response_time_s: r.response_time_s,
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;

    #[tokio::test]
    async fn unknown_agent_returns_not_found() {
        let state = test_state().await;
        let err = list_sessions(State(state), Path("nobody".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
    }

    #[tokio::test]
    async fn lists_sessions_inserted_for_an_agent() {
        let state = test_state().await;
        state
            .store
            .insert_session("agent-1", 2, 0.0, &Timings::new(), false, Some("in_progress"))
            .await
            .unwrap();

        let Json(sessions) = list_sessions(State(state), Path("agent-1".to_string()))
            .await
            .unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].stage_reached, 2);
    }

    #[tokio::test]
    async fn history_for_unknown_session_returns_not_found() {
        let state = test_state().await;
        state
            .store
            .insert_session("agent-1", 2, 0.0, &Timings::new(), false, None)
            .await
            .unwrap();

        let err = session_history(State(state), Path(("agent-1".to_string(), 999)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
    }
}
