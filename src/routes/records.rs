use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value, json};

use crate::AppState;
use crate::db::{self, tenant};
use crate::error::{AppError, Result};
use crate::extract::AuthContext;
use crate::query::{self, ListOptions};
use crate::validation::Identifier;

/// Validate the path identifiers, enforce scope, and open the tenant store.
fn open_table(
    state: &AppState,
    auth: &AuthContext,
    db_name: &str,
    table_name: &str,
) -> Result<(rusqlite::Connection, Identifier)> {
    let db_name = Identifier::parse(db_name)?;
    let table = Identifier::parse(table_name)?;
    let (_database_id, file_path) = auth.resolve_database(state, &db_name)?;
    let conn = db::open_tenant(std::path::Path::new(&file_path))?;
    Ok((conn, table))
}

/// Require a non-empty JSON object body.
fn object_body(body: Value) -> Result<Map<String, Value>> {
    let object = match body {
        Value::Object(object) => object,
        _ => {
            return Err(AppError::BadRequest(
                "request body must be a JSON object".to_string(),
            ));
        }
    };
    if object.is_empty() {
        return Err(AppError::BadRequest(
            "request body cannot be empty".to_string(),
        ));
    }
    Ok(object)
}

/// Insert a record, validating every value against the table schema.
pub async fn create_record(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((db_name, table_name)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    let (conn, table) = open_table(&state, &auth, &db_name, &table_name)?;
    let body = object_body(body)?;

    let schema = tenant::table_info(&conn, &table)?;
    let plan = query::build_write_plan(&schema, &body)?;
    let insert_sql = query::build_insert_sql(&table, &plan.columns);

    let record_id = tenant::insert_record(&conn, &insert_sql, &plan.args)?;

    tracing::info!("Inserted record {record_id} into '{db_name}'.'{table}'");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Record created successfully",
            "record_id": record_id,
        })),
    ))
}

/// List records with equality filters, pagination, sorting, and field
/// selection.
pub async fn list_records(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((db_name, table_name)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<tenant::ListResult>> {
    let (conn, table) = open_table(&state, &auth, &db_name, &table_name)?;

    let opts = ListOptions::parse(&params)?;
    let schema = tenant::table_info(&conn, &table)?;
    let plan = query::build_list_plan(&table, &schema, &params, &opts)?;

    let result = tenant::list_records(&conn, &plan)?;
    Ok(Json(result))
}

/// Fetch a single record by id.
pub async fn get_record(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((db_name, table_name, record_id)): Path<(String, String, i64)>,
) -> Result<Json<Map<String, Value>>> {
    let (conn, table) = open_table(&state, &auth, &db_name, &table_name)?;
    let record = tenant::get_record(&conn, &query::select_by_id_sql(&table), record_id)?;
    Ok(Json(record))
}

/// Apply a partial update to a record.
pub async fn update_record(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((db_name, table_name, record_id)): Path<(String, String, i64)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    let (conn, table) = open_table(&state, &auth, &db_name, &table_name)?;
    let body = object_body(body)?;

    let schema = tenant::table_info(&conn, &table)?;
    let plan = query::build_write_plan(&schema, &body)?;
    let update_sql = query::build_update_sql(&table, &plan.columns);

    let mut args = plan.args;
    args.push(SqlValue::Integer(record_id));
    tenant::update_record(&conn, &update_sql, &args)?;

    tracing::info!("Updated record {record_id} in '{db_name}'.'{table}'");
    Ok(Json(json!({
        "message": "Record updated successfully",
        "record_id": record_id,
    })))
}

/// Delete a record by id.
pub async fn delete_record(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((db_name, table_name, record_id)): Path<(String, String, i64)>,
) -> Result<StatusCode> {
    let (conn, table) = open_table(&state, &auth, &db_name, &table_name)?;
    tenant::delete_record(&conn, &query::delete_by_id_sql(&table), record_id)?;

    tracing::info!("Deleted record {record_id} from '{db_name}'.'{table}'");
    Ok(StatusCode::NO_CONTENT)
}
