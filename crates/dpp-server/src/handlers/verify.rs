//! `GET /verify?token=...` — decode and inspect a bearer token issued by an
//! accepted verification session.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use dpp_ports::{TokenClaims, TokenSigner};
use serde::Deserialize;

use crate::handlers::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    token: String,
}

pub async fn verify_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
) -> ApiResult<Json<TokenClaims>> {
    let claims = state.signer.verify(&query.token)?;
    Ok(Json(claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use chrono::Utc;

    #[tokio::test]
    async fn decodes_a_freshly_signed_token() {
        let state = test_state().await;
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            agent_id: "agent-1".to_string(),
            verified_at: now,
            expires_in: 3600,
            stages_passed: vec![1, 2, 3, 4],
            iat: now,
            exp: now + 3600,
        };
        let token = state.signer.sign(&claims).unwrap();

        let Json(decoded) = verify_token(
            State(state),
            Query(VerifyQuery { token }),
        )
        .await
        .unwrap();
        assert_eq!(decoded.agent_id, "agent-1");
    }

    #[tokio::test]
    async fn rejects_a_malformed_token() {
        let state = test_state().await;
        let err = verify_token(
            State(state),
            Query(VerifyQuery {
                token: "not-a-real-token".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, crate::handlers::ApiError::Unauthorized { .. }));
    }
}
