use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::{AppError, Result};
use crate::query::{ListPlan, TableSchema};
use crate::validation::{ColumnType, Identifier};

/// Column metadata as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

/// A table in a tenant store, with its stored DDL and columns.
#[derive(Debug, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub sql: String,
    pub columns: Vec<ColumnInfo>,
}

/// One column as recovered from the stored CREATE TABLE text.
#[derive(Debug, Serialize)]
pub struct SchemaColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    pub primary_key: bool,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct ListResult {
    pub records: Vec<Map<String, JsonValue>>,
    pub pagination: Pagination,
}

/// Map driver errors onto stable kinds for the classifier.
fn map_tenant_err(err: rusqlite::Error) -> AppError {
    let message = err.to_string();
    if message.contains("no such table") {
        return AppError::TableNotFound;
    }
    if message.contains("has no column named") || message.contains("no such column") {
        return AppError::ColumnNotFound;
    }
    if message.contains("datatype mismatch") {
        return AppError::TypeMismatch("datatype mismatch".to_string());
    }
    if let rusqlite::Error::SqliteFailure(e, _) = &err
        && e.code == rusqlite::ErrorCode::ConstraintViolation
    {
        return AppError::ConstraintViolation;
    }
    AppError::Sqlite(err)
}

// --- Schema Operations ---

/// Fetch the column/type map for a table via `PRAGMA table_info`.
///
/// No rows means the table does not exist.
pub fn table_info(conn: &Connection, table: &Identifier) -> Result<TableSchema> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(map_tenant_err)?;
    let mut rows = stmt.query([]).map_err(map_tenant_err)?;

    let mut schema = TableSchema::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        let declared: String = row.get(2)?;
        schema.insert(name.to_lowercase(), ColumnType::parse(&declared));
    }
    if schema.is_empty() {
        return Err(AppError::TableNotFound);
    }
    Ok(schema)
}

/// List user tables with their stored SQL and column info, skipping the
/// engine's internal `sqlite_*` tables.
pub fn list_tables(conn: &Connection) -> Result<Vec<TableInfo>> {
    let mut stmt = conn.prepare(
        "SELECT name, sql FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let entries = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut tables = Vec::with_capacity(entries.len());
    for (name, sql) in entries {
        let columns = column_info(conn, &name)?;
        tables.push(TableInfo { name, sql, columns });
    }
    Ok(tables)
}

fn column_info(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    let quoted = table.replace('"', "\"\"");
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{quoted}\")"))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                cid: row.get(0)?,
                name: row.get(1)?,
                sql_type: row.get(2)?,
                not_null: row.get::<_, i64>(3)? != 0,
                default_value: row.get(4)?,
                primary_key: row.get::<_, i64>(5)? != 0,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

/// Count the user tables in a tenant store.
pub fn count_tables(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?)
}

/// Execute a pre-assembled CREATE TABLE statement (idempotent).
pub fn create_table(conn: &Connection, create_sql: &str) -> Result<()> {
    conn.execute(create_sql, []).map_err(|err| {
        tracing::warn!("Failed CREATE TABLE: {err}\nSQL: {create_sql}");
        map_tenant_err(err)
    })?;
    Ok(())
}

/// Drop a table if it exists (idempotent).
pub fn drop_table(conn: &Connection, table: &Identifier) -> Result<()> {
    conn.execute(&format!("DROP TABLE IF EXISTS {table}"), [])
        .map_err(|err| {
            tracing::warn!("Failed DROP TABLE for '{table}': {err}");
            map_tenant_err(err)
        })?;
    Ok(())
}

/// Recover a table's declared columns from its stored CREATE TABLE text.
pub fn table_schema(conn: &Connection, table: &Identifier) -> Result<Vec<SchemaColumn>> {
    let sql: Option<String> = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    let sql = sql.ok_or(AppError::TableNotFound)?;
    Ok(parse_create_table(&sql))
}

/// Split the column list inside the outermost parentheses; the first two
/// tokens of each part are the name and type, `PRIMARY` flags the key.
fn parse_create_table(sql: &str) -> Vec<SchemaColumn> {
    let (Some(open), Some(close)) = (sql.find('('), sql.rfind(')')) else {
        return Vec::new();
    };
    let mut columns = Vec::new();
    for part in sql[open + 1..close].split(',') {
        let fields: Vec<&str> = part.split_whitespace().collect();
        if fields.len() < 2 {
            continue;
        }
        columns.push(SchemaColumn {
            name: fields[0].to_string(),
            sql_type: fields[1].to_string(),
            primary_key: fields.get(2).is_some_and(|f| *f == "PRIMARY"),
        });
    }
    columns
}

// --- Record CRUD Operations ---

/// Execute an INSERT and return the new row id.
pub fn insert_record(conn: &Connection, insert_sql: &str, args: &[SqlValue]) -> Result<i64> {
    conn.execute(insert_sql, params_from_iter(args.iter()))
        .map_err(|err| {
            tracing::warn!("Failed INSERT: {err}\nSQL: {insert_sql}");
            map_tenant_err(err)
        })?;
    Ok(conn.last_insert_rowid())
}

/// Fetch a single record by id.
pub fn get_record(
    conn: &Connection,
    select_sql: &str,
    record_id: i64,
) -> Result<Map<String, JsonValue>> {
    let mut stmt = conn.prepare(select_sql).map_err(map_tenant_err)?;
    let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let mut rows = stmt.query(params![record_id]).map_err(map_tenant_err)?;
    match rows.next()? {
        Some(row) => row_to_json(row, &column_names),
        None => Err(AppError::RecordNotFound),
    }
}

/// Execute a planned listing: total count plus one page of records.
pub fn list_records(conn: &Connection, plan: &ListPlan) -> Result<ListResult> {
    let total: i64 = conn
        .query_row(
            &plan.count_sql,
            params_from_iter(plan.filter_args.iter()),
            |row| row.get(0),
        )
        .map_err(map_tenant_err)?;

    let mut stmt = conn.prepare(&plan.select_sql).map_err(map_tenant_err)?;
    let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    let mut args = plan.filter_args.clone();
    args.push(SqlValue::Integer(plan.limit));
    args.push(SqlValue::Integer(plan.offset));

    let mut rows = stmt
        .query(params_from_iter(args.iter()))
        .map_err(map_tenant_err)?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(row_to_json(row, &column_names)?);
    }

    Ok(ListResult {
        records,
        pagination: Pagination {
            total,
            limit: plan.limit,
            offset: plan.offset,
        },
    })
}

/// Execute an UPDATE; zero affected rows means the record does not exist.
pub fn update_record(conn: &Connection, update_sql: &str, args: &[SqlValue]) -> Result<i64> {
    let affected = conn
        .execute(update_sql, params_from_iter(args.iter()))
        .map_err(|err| {
            tracing::warn!("Failed UPDATE: {err}\nSQL: {update_sql}");
            map_tenant_err(err)
        })?;
    if affected == 0 {
        return Err(AppError::RecordNotFound);
    }
    Ok(affected as i64)
}

/// Execute a DELETE by id; zero affected rows means the record does not
/// exist.
pub fn delete_record(conn: &Connection, delete_sql: &str, record_id: i64) -> Result<i64> {
    let affected = conn
        .execute(delete_sql, params![record_id])
        .map_err(map_tenant_err)?;
    if affected == 0 {
        return Err(AppError::RecordNotFound);
    }
    Ok(affected as i64)
}

fn row_to_json(row: &rusqlite::Row<'_>, columns: &[String]) -> Result<Map<String, JsonValue>> {
    let mut object = Map::new();
    for (i, name) in columns.iter().enumerate() {
        let value = match row.get_ref(i)? {
            ValueRef::Null => JsonValue::Null,
            ValueRef::Integer(v) => JsonValue::from(v),
            ValueRef::Real(v) => JsonValue::from(v),
            ValueRef::Text(v) => JsonValue::String(String::from_utf8_lossy(v).into_owned()),
            ValueRef::Blob(v) => JsonValue::String(String::from_utf8_lossy(v).into_owned()),
        };
        object.insert(name.clone(), value);
    }
    Ok(object)
}
