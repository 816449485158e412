//! Shared `AppState` construction for handler unit tests.

use std::sync::Arc;

use dpp_adapters::{AnyChallengeOracle, HmacTokenSigner, SqliteSessionStore, StaticChallengeOracle};
use dpp_protocol::StageConfig;

use crate::rate_limit::RateLimiter;
use crate::AppState;

pub async fn test_state() -> Arc<AppState> {
    Arc::new(AppState {
        store: SqliteSessionStore::connect("sqlite::memory:").await.unwrap(),
        oracle: AnyChallengeOracle::Static(StaticChallengeOracle::new()),
        signer: HmacTokenSigner::new("test-secret"),
        stage_config: StageConfig::test(),
        mock_mode: true,
        rate_limiter: RateLimiter::new(1000, 60),
    })
}
