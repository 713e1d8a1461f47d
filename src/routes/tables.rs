use std::collections::HashSet;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::AppState;
use crate::db::{self, tenant};
use crate::error::{AppError, Result};
use crate::extract::AuthContext;
use crate::query;
use crate::validation::{ColumnType, Identifier};

#[derive(Debug, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSchemaRequest {
    pub table_name: String,
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
}

/// Open the tenant store addressed by the request path, after scope and
/// ownership checks.
fn open_scoped(state: &AppState, auth: &AuthContext, db_name: &str) -> Result<rusqlite::Connection> {
    let db_name = Identifier::parse(db_name)?;
    let (_database_id, file_path) = auth.resolve_database(state, &db_name)?;
    db::open_tenant(std::path::Path::new(&file_path))
}

/// Define a table inside a registered database.
///
/// Every table gets the implicit `id` primary key and a `created_at`
/// default; creation is idempotent.
pub async fn create_schema(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(db_name): Path<String>,
    Json(payload): Json<CreateSchemaRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let conn = open_scoped(&state, &auth, &db_name)?;

    let table = Identifier::parse(&payload.table_name)?;
    if payload.columns.is_empty() {
        return Err(AppError::BadRequest(
            "no columns provided in 'columns' field".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(payload.columns.len());
    for column in &payload.columns {
        let name = Identifier::parse(&column.name).map_err(|_| {
            AppError::BadRequest(format!(
                "invalid column name '{}': use valid identifiers, cannot be 'id'",
                column.name
            ))
        })?;
        let lower = name.as_str().to_lowercase();
        if lower == "id" {
            return Err(AppError::BadRequest(
                "invalid column name 'id': the id column is implicit".to_string(),
            ));
        }
        if !seen.insert(lower) {
            return Err(AppError::BadRequest(format!(
                "duplicate column name '{}'",
                column.name
            )));
        }
        let column_type = ColumnType::parse(&column.column_type).ok_or_else(|| {
            AppError::BadRequest(format!(
                "invalid type '{}' for column '{}'",
                column.column_type, column.name
            ))
        })?;
        columns.push((name, column_type));
    }

    let create_sql = query::build_create_table_sql(&table, &columns);
    tenant::create_table(&conn, &create_sql)?;

    tracing::info!("Ensured table '{table}' in database '{db_name}'");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Table '{table}' created or already exists."),
            "db_name": db_name,
            "table_name": table.as_str(),
        })),
    ))
}

/// List the tables of a registered database.
pub async fn list_tables(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(db_name): Path<String>,
) -> Result<Json<Value>> {
    let conn = open_scoped(&state, &auth, &db_name)?;
    let tables = tenant::list_tables(&conn)?;
    Ok(Json(json!({ "tables": tables })))
}

/// Report the declared schema of one table.
pub async fn get_table_schema(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((db_name, table_name)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let table = Identifier::parse(&table_name)?;
    let conn = open_scoped(&state, &auth, &db_name)?;
    let schema = tenant::table_schema(&conn, &table)?;
    Ok(Json(json!({
        "db_name": db_name,
        "table_name": table.as_str(),
        "schema": schema,
    })))
}

/// Drop a table. A second drop of the same table also succeeds.
pub async fn delete_table(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((db_name, table_name)): Path<(String, String)>,
) -> Result<StatusCode> {
    let table = Identifier::parse(&table_name)?;
    let conn = open_scoped(&state, &auth, &db_name)?;
    tenant::drop_table(&conn, &table)?;

    tracing::info!("Dropped table '{table}' in database '{db_name}'");
    Ok(StatusCode::NO_CONTENT)
}
