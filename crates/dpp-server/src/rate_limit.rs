//! Per-source sliding-window rate limiter, sitting in front of the
//! connection adapter and the introspection endpoints alike. Not part of
//! the protocol core.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::AppState;

/// Allows `limit` requests per `window` per source key, evicting timestamps
/// older than the window on every check.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: u32, window_s: u64) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            limit,
            window: Duration::from_secs(window_s),
        }
    }

    /// Records one request for `key`; returns `false` if it exceeds the
    /// limit within the current window.
    fn check(&self, key: &str) -> bool {
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let now = Instant::now();
        let dq = windows.entry(key.to_string()).or_default();

        while let Some(&front) = dq.front() {
            if now.duration_since(front) > self.window {
                dq.pop_front();
            } else {
                break;
            }
        }

        if dq.len() >= self.limit as usize {
            false
        } else {
            dq.push_back(now);
            true
        }
    }

    pub fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }
}

fn source_key(request: &Request<Body>, addr: SocketAddr) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| addr.ip().to_string())
}

/// WebSocket upgrade requests count toward the limit the same as any other
/// request, matching the upstream middleware this replaces.
pub async fn enforce(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = source_key(&request, addr);

    if !state.rate_limiter.check(&key) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [("Retry-After", state.rate_limiter.window_secs().to_string())],
            "rate limit exceeded",
        )
            .into_response();
    }

    next.run(request).await
}
