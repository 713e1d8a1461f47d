//! Nebula Backend Library
//!
//! Multi-tenant backend-as-a-service: authenticated users register named
//! databases, define table schemas at runtime, and perform typed CRUD on
//! records through a generic JSON surface. Exported for the binary and the
//! integration tests.

pub mod auth;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod extract;
pub mod models;
pub mod query;
pub mod rate_limit;
pub mod routes;
pub mod validation;

pub use config::Config;
pub use db::MetaDb;
pub use error::{AppError, Result};

use std::sync::Arc;
use std::time::Duration;

use rate_limit::RateLimiter;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub meta: MetaDb,
    pub config: Config,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Create a new AppState; the rate limiter takes its parameters from
    /// the configuration.
    pub fn new(meta: MetaDb, config: Config) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_requests,
            Duration::from_secs(config.rate_limit_window_secs),
        ));
        Self {
            meta,
            config,
            rate_limiter,
        }
    }
}
