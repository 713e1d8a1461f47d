use axum::Json;
use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::extract::AuthContext;

/// Liveness probe
pub async fn ping() -> &'static str {
    "pong"
}

/// Public health check, used by load balancers
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Authenticated health check reporting the resolved identity and scope.
pub async fn api_health(auth: AuthContext) -> Json<Value> {
    let scope = match auth.db_scope {
        Some(database_id) => format!("database (ID: {database_id})"),
        None => "user".to_string(),
    };
    Json(json!({
        "userId": auth.user_id,
        "scope": scope,
    }))
}
