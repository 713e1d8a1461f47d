use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::AppState;
use crate::db::{self, metadata, tenant};
use crate::error::Result;
use crate::extract::AuthContext;
use crate::validation::Identifier;

#[derive(Debug, Deserialize)]
pub struct CreateDatabaseRequest {
    pub db_name: String,
}

/// List the caller's database registrations with table counts.
pub async fn list_databases(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Value>> {
    let mut databases = metadata::list_databases(&state.meta, &auth.user_id)?;

    // Table counts come from the tenant files themselves; a file that
    // cannot be opened is reported with a count of zero rather than
    // failing the listing.
    for summary in &mut databases {
        match db::open_tenant(std::path::Path::new(&summary.file_path)) {
            Ok(conn) => match tenant::count_tables(&conn) {
                Ok(count) => summary.table_count = count,
                Err(err) => {
                    tracing::warn!("Failed to count tables in '{}': {err}", summary.db_name);
                }
            },
            Err(err) => {
                tracing::warn!("Failed to open tenant database '{}': {err}", summary.db_name);
            }
        }
    }

    Ok(Json(json!({ "databases": databases })))
}

/// Register a new database for the caller.
pub async fn create_database(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<CreateDatabaseRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let db_name = Identifier::parse(&payload.db_name)?;

    let root = &state.config.database_directory;
    let file_path = db::tenant_db_path(root, &auth.user_id, &db_name)?;
    std::fs::create_dir_all(root.join(&auth.user_id))?;

    metadata::register_database(
        &state.meta,
        &auth.user_id,
        db_name.as_str(),
        &file_path.to_string_lossy(),
    )?;

    tracing::info!("Registered database '{db_name}' for user {}", auth.user_id);
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Database registered successfully",
            "db_name": db_name.as_str(),
        })),
    ))
}

/// Remove a database registration and, best-effort, its file.
pub async fn delete_database(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(db_name): Path<String>,
) -> Result<StatusCode> {
    let db_name = Identifier::parse(&db_name)?;
    let (_database_id, file_path) = auth.resolve_database(&state, &db_name)?;

    metadata::delete_database_registration(&state.meta, &auth.user_id, db_name.as_str())?;

    // An already-missing file is not a failure
    if let Err(err) = std::fs::remove_file(&file_path)
        && err.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!("Failed to remove tenant file '{file_path}': {err}");
    }

    tracing::info!("Deleted database '{db_name}' for user {}", auth.user_id);
    Ok(StatusCode::NO_CONTENT)
}
