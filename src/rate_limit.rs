use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::AppState;
use crate::error::AppError;

/// Sliding-window request limiter keyed by client IP.
///
/// Each slot holds the timestamps of accepted requests inside the trailing
/// window; once the count reaches the limit, further requests are rejected
/// until old entries age out. State is per process.
#[derive(Debug)]
pub struct RateLimiter {
    requests: Mutex<HashMap<String, Vec<Instant>>>,
    limit: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            limit,
            window,
        }
    }

    /// Record a request from `ip` and report whether it is allowed.
    pub fn allow(&self, ip: &str) -> bool {
        let mut requests = self
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let now = Instant::now();
        let stamps = requests.entry(ip.to_string()).or_default();
        stamps.retain(|t| now.duration_since(*t) < self.window);

        if stamps.len() >= self.limit {
            return false;
        }
        stamps.push(now);
        true
    }
}

/// Router-level middleware applying the shared limiter to every request.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);
    if !state.rate_limiter.allow(&ip) {
        tracing::warn!("Rate limit exceeded for {ip}");
        return AppError::RateLimited.into_response();
    }
    next.run(request).await
}

/// Prefer the transport peer address; fall back to a shared bucket when the
/// connection info is unavailable (e.g. in-process test requests).
fn client_ip(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
