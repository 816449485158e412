//! Decision-Proof Protocol verifier service.
//!
//! Exposes the WebSocket verification endpoint (C9, driving the C8
//! orchestrator over one connection) alongside the read-only REST
//! introspection surface from spec §6: `/status`, `/verify`, `/sessions`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dpp_adapters::{
    AnyChallengeOracle, HmacTokenSigner, RemoteChallengeOracle, SqliteSessionStore,
    StaticChallengeOracle,
};
use dpp_protocol::StageConfig;

mod config;
mod handlers;
mod rate_limit;
mod ws;

#[cfg(test)]
mod test_support;

use config::DppConfig;
use rate_limit::RateLimiter;

/// Shared server state: the three external collaborators behind
/// `dpp-ports` plus the stage gates and the admission-layer rate limiter.
pub struct AppState {
    pub store: SqliteSessionStore,
    pub oracle: AnyChallengeOracle,
    pub signer: HmacTokenSigner,
    pub stage_config: StageConfig,
    pub mock_mode: bool,
    pub rate_limiter: RateLimiter,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(handlers::status::status))
        .route("/verify", get(handlers::verify::verify_token))
        .route("/sessions/:agent_id", get(handlers::sessions::list_sessions))
        .route(
            "/sessions/:agent_id/history/:session_id",
            get(handlers::sessions::session_history),
        )
        .route("/ws/verify", get(ws::verify_ws))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit::enforce,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn build_state(config: &DppConfig) -> Arc<AppState> {
    let store = SqliteSessionStore::connect(&config.database_url)
        .await
        .expect("failed to connect to session store");

    let mock_mode = config.mock_mode();
    let oracle = match &config.remote_oracle {
        Some(remote) => AnyChallengeOracle::Remote(RemoteChallengeOracle::new(remote.clone())),
        None => AnyChallengeOracle::Static(StaticChallengeOracle::new()),
    };

    Arc::new(AppState {
        store,
        oracle,
        signer: HmacTokenSigner::new(&config.token_secret),
        stage_config: config.stages.clone(),
        mock_mode,
        rate_limiter: RateLimiter::new(config.rate_limit_requests, config.rate_limit_window_s),
    })
}

#[tokio::main]
async fn main() {
    let config = DppConfig::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("dpp_server={},tower_http=info", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = build_state(&config).await;
    let app = build_router(state);

    let addr: SocketAddr = config.bind_addr().parse().expect("invalid bind address");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");

    tracing::info!(%addr, mock_mode = config.mock_mode(), "Decision-Proof Protocol verifier listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server error");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let state = test_support::test_state().await;
        let app = build_router(state);
        let peer: SocketAddr = "127.0.0.1:0".parse().unwrap();

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .extension(ConnectInfo(peer))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
