use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::AppState;
use crate::db::metadata;
use crate::error::{AppError, Result};
use crate::extract::AuthUser;
use crate::validation::Identifier;

/// Retrieve the API key bound to one of the caller's databases.
pub async fn get_api_key(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(db_name): Path<String>,
) -> Result<Json<Value>> {
    let db_name = Identifier::parse(&db_name)?;
    let database_id = metadata::find_database_id(&state.meta, &auth.user_id, db_name.as_str())?;

    let key = metadata::find_api_key_by_database(&state.meta, database_id)?
        .ok_or(AppError::ApiKeyNotFound)?;
    Ok(Json(json!({ "key": key })))
}

/// Mint an API key scoped to one of the caller's databases.
///
/// The full key is returned only here; a database can hold at most one key
/// at a time, so rotation is delete-then-create.
pub async fn create_api_key(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(db_name): Path<String>,
) -> Result<(StatusCode, Json<Value>)> {
    let db_name = Identifier::parse(&db_name)?;
    let database_id = metadata::find_database_id(&state.meta, &auth.user_id, db_name.as_str())?;

    let api_key = metadata::store_api_key(&state.meta, &auth.user_id, database_id)?;

    tracing::info!(
        "Issued API key for database '{db_name}' of user {}",
        auth.user_id
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "api_key": api_key,
            "message": "API key created. Store it securely; it will not be shown again.",
        })),
    ))
}

/// Revoke the API key bound to one of the caller's databases.
pub async fn delete_api_key(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(db_name): Path<String>,
) -> Result<StatusCode> {
    let db_name = Identifier::parse(&db_name)?;
    let database_id = metadata::find_database_id(&state.meta, &auth.user_id, db_name.as_str())?;

    let key = metadata::find_api_key_by_database(&state.meta, database_id)?
        .ok_or(AppError::ApiKeyNotFound)?;
    metadata::delete_api_key(&state.meta, &key)?;

    tracing::info!(
        "Revoked API key for database '{db_name}' of user {}",
        auth.user_id
    );
    Ok(StatusCode::NO_CONTENT)
}
