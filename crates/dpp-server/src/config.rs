//! Service configuration.
//!
//! Centralized configuration for the verifier service, loaded from `DPP_`
//! prefixed environment variables with `local_dev()`/`test()` fallbacks.

use std::env;

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct DppConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// SQLite connection string for the session store.
    pub database_url: String,
    /// HMAC signing secret for issued tokens.
    pub token_secret: String,
    /// When set, challenge generation/validation calls a remote completion
    /// endpoint instead of the static bank.
    pub remote_oracle: Option<dpp_adapters::RemoteOracleConfig>,
    /// Stage gates and deadlines.
    pub stages: dpp_protocol::StageConfig,
    /// Log level / `EnvFilter` directive.
    pub log_level: String,
    /// Requests allowed per source per `rate_limit_window_s`.
    pub rate_limit_requests: u32,
    /// Sliding-window width, in seconds.
    pub rate_limit_window_s: u64,
}

impl DppConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Self {
        let mut stages = dpp_protocol::StageConfig::defaults();
        if let Some(v) = env_f64("DPP_DECISION_CV_THRESHOLD") {
            stages.decision_cv_threshold = v;
        }
        if let Some(v) = env_u32("DPP_POW_DIFFICULTY") {
            stages.pow_difficulty = v;
        }

        let remote_oracle = env::var("DPP_ORACLE_ENDPOINT")
            .ok()
            .map(|endpoint| dpp_adapters::RemoteOracleConfig {
                endpoint,
                api_key: env::var("DPP_ORACLE_API_KEY").unwrap_or_default(),
                model: env::var("DPP_ORACLE_MODEL").unwrap_or_else(|_| "default".to_string()),
            });

        Self {
            host: env::var("DPP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("DPP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database_url: env::var("DPP_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://dpp.db?mode=rwc".to_string()),
            token_secret: env::var("DPP_TOKEN_SECRET")
                .unwrap_or_else(|_| "dev-only-insecure-secret".to_string()),
            remote_oracle,
            stages,
            log_level: env::var("DPP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            rate_limit_requests: env::var("DPP_RATE_LIMIT_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            rate_limit_window_s: env::var("DPP_RATE_LIMIT_WINDOW_S")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        }
    }

    /// Local development configuration: static oracle, on-disk database.
    pub fn local_dev() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: "sqlite://dpp-dev.db?mode=rwc".to_string(),
            token_secret: "dev-only-insecure-secret".to_string(),
            remote_oracle: None,
            stages: dpp_protocol::StageConfig::defaults(),
            log_level: "debug".to_string(),
            rate_limit_requests: 10,
            rate_limit_window_s: 60,
        }
    }

    /// Test configuration: fast gates, in-memory database.
    pub fn test() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            token_secret: "test-secret".to_string(),
            remote_oracle: None,
            stages: dpp_protocol::StageConfig::test(),
            log_level: "debug".to_string(),
            rate_limit_requests: 1000,
            rate_limit_window_s: 60,
        }
    }

    /// Whether the challenge oracle is running in mock (static bank) mode —
    /// true whenever no remote oracle endpoint is configured.
    pub fn mock_mode(&self) -> bool {
        self.remote_oracle.is_none()
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for DppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_f64(key: &str) -> Option<f64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
