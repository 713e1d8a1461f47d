use std::collections::HashMap;

use rusqlite::types::Value as SqlValue;
use serde_json::Value as JsonValue;

use crate::constants::{DEFAULT_LIMIT, MAX_LIMIT};
use crate::error::{AppError, Result};
use crate::validation::{ColumnType, Identifier};

/// Query parameter names reserved for pagination, sorting, and field
/// selection; everything else is treated as a column filter.
pub const RESERVED_PARAMS: [&str; 5] = ["limit", "offset", "sort", "order", "fields"];

pub fn is_reserved_param(key: &str) -> bool {
    RESERVED_PARAMS.contains(&key.to_lowercase().as_str())
}

/// Schema snapshot keyed by lower-cased column name.
///
/// `None` marks a declared type outside the closed set (the implicit
/// `created_at TIMESTAMP`, for instance): writes to such columns are
/// accepted as-is and filters on them are skipped.
pub type TableSchema = HashMap<String, Option<ColumnType>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Parsed pagination, sorting, and field-selection options for a listing.
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub limit: i64,
    pub offset: i64,
    pub sort: Option<Identifier>,
    pub order: SortOrder,
    pub fields: Vec<Identifier>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
            sort: None,
            order: SortOrder::Asc,
            fields: Vec::new(),
        }
    }
}

impl ListOptions {
    /// Extract the reserved options from raw query parameters.
    pub fn parse(params: &[(String, String)]) -> Result<Self> {
        let mut opts = Self::default();

        for (key, value) in params {
            match key.to_lowercase().as_str() {
                "limit" => {
                    let limit: i64 = value.parse().map_err(|_| {
                        AppError::BadRequest(
                            "invalid 'limit' parameter: must be an integer".to_string(),
                        )
                    })?;
                    if limit < 1 {
                        return Err(AppError::BadRequest(
                            "invalid 'limit' parameter: must be at least 1".to_string(),
                        ));
                    }
                    if limit > MAX_LIMIT {
                        return Err(AppError::BadRequest(format!(
                            "invalid 'limit' parameter: maximum is {MAX_LIMIT}"
                        )));
                    }
                    opts.limit = limit;
                }
                "offset" => {
                    let offset: i64 = value.parse().map_err(|_| {
                        AppError::BadRequest(
                            "invalid 'offset' parameter: must be an integer".to_string(),
                        )
                    })?;
                    if offset < 0 {
                        return Err(AppError::BadRequest(
                            "invalid 'offset' parameter: must be non-negative".to_string(),
                        ));
                    }
                    opts.offset = offset;
                }
                "sort" => {
                    opts.sort = Some(Identifier::parse(value).map_err(|_| {
                        AppError::BadRequest(format!(
                            "invalid 'sort' parameter: '{value}' is not a valid column name"
                        ))
                    })?);
                }
                "order" => {
                    opts.order = match value.to_lowercase().as_str() {
                        "asc" => SortOrder::Asc,
                        "desc" => SortOrder::Desc,
                        _ => {
                            return Err(AppError::BadRequest(
                                "invalid 'order' parameter: must be 'asc' or 'desc'".to_string(),
                            ));
                        }
                    };
                }
                "fields" => {
                    for field in value.split(',') {
                        let field = field.trim();
                        if field.is_empty() {
                            continue;
                        }
                        opts.fields.push(Identifier::parse(field).map_err(|_| {
                            AppError::BadRequest(format!(
                                "invalid 'fields' parameter: '{field}' is not a valid column name"
                            ))
                        })?);
                    }
                }
                _ => {}
            }
        }

        Ok(opts)
    }
}

/// A fully planned record listing: validated SQL plus bound arguments.
#[derive(Debug)]
pub struct ListPlan {
    pub select_sql: String,
    pub count_sql: String,
    pub filter_args: Vec<SqlValue>,
    pub limit: i64,
    pub offset: i64,
}

/// Plan a filtered listing over `table`.
///
/// Filter keys must be valid identifiers present in the schema; values are
/// converted by the column's type. Filters on BLOB columns and on columns
/// outside the closed type set are skipped, matching the write-side
/// leniency for those columns.
pub fn build_list_plan(
    table: &Identifier,
    schema: &TableSchema,
    params: &[(String, String)],
    opts: &ListOptions,
) -> Result<ListPlan> {
    if let Some(sort) = &opts.sort
        && !schema.contains_key(&sort.as_str().to_lowercase())
    {
        return Err(AppError::InvalidSortColumn(format!(
            "'{sort}' not found in table schema"
        )));
    }

    let select_fields = if opts.fields.is_empty() {
        "*".to_string()
    } else {
        for field in &opts.fields {
            if !schema.contains_key(&field.as_str().to_lowercase()) {
                return Err(AppError::InvalidFieldColumn(format!(
                    "'{field}' not found in table schema"
                )));
            }
        }
        opts.fields
            .iter()
            .map(Identifier::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut where_clauses = Vec::new();
    let mut filter_args = Vec::new();

    for (key, raw) in params {
        if is_reserved_param(key) {
            continue;
        }

        let column = Identifier::parse(key).map_err(|_| {
            AppError::InvalidFilterValue(format!("invalid filter key format '{key}'"))
        })?;
        let Some(declared) = schema.get(&key.to_lowercase()) else {
            return Err(AppError::InvalidFilterValue(format!(
                "filter key '{key}' not found in table schema"
            )));
        };

        let value = match declared {
            Some(ColumnType::Integer) | Some(ColumnType::Boolean) => {
                SqlValue::Integer(raw.parse().map_err(|_| {
                    AppError::InvalidFilterValue(format!("expected an integer for column '{key}'"))
                })?)
            }
            Some(ColumnType::Real) => SqlValue::Real(raw.parse().map_err(|_| {
                AppError::InvalidFilterValue(format!("expected a number for column '{key}'"))
            })?),
            Some(ColumnType::Text) => SqlValue::Text(raw.clone()),
            Some(ColumnType::Blob) => {
                tracing::debug!("Ignoring filter on BLOB column '{column}'");
                continue;
            }
            None => {
                tracing::debug!("Ignoring filter on column '{column}' with unhandled type");
                continue;
            }
        };

        where_clauses.push(format!("{column} = ?"));
        filter_args.push(value);
    }

    let where_clause = if where_clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_clauses.join(" AND "))
    };

    let order_clause = match &opts.sort {
        Some(sort) => format!(" ORDER BY {sort} {}", opts.order.as_sql()),
        None if schema.contains_key("id") => " ORDER BY id ASC".to_string(),
        None => String::new(),
    };

    Ok(ListPlan {
        count_sql: format!("SELECT COUNT(*) FROM {table}{where_clause}"),
        select_sql: format!(
            "SELECT {select_fields} FROM {table}{where_clause}{order_clause} LIMIT ? OFFSET ?"
        ),
        filter_args,
        limit: opts.limit,
        offset: opts.offset,
    })
}

/// Validated columns and bound values for an INSERT or UPDATE.
#[derive(Debug)]
pub struct WritePlan {
    pub columns: Vec<Identifier>,
    pub args: Vec<SqlValue>,
}

/// Validate a JSON body against the table schema and coerce its values.
///
/// Writes to `id` and keys that are not valid identifiers are silently
/// skipped; unknown columns are rejected; an empty effective body is
/// rejected.
pub fn build_write_plan(
    schema: &TableSchema,
    body: &serde_json::Map<String, JsonValue>,
) -> Result<WritePlan> {
    let mut columns = Vec::new();
    let mut args = Vec::new();

    for (key, value) in body {
        let Ok(column) = Identifier::parse(key) else {
            continue;
        };
        let lower = key.to_lowercase();
        if lower == "id" {
            continue;
        }

        let Some(declared) = schema.get(&lower) else {
            return Err(AppError::BadRequest(format!(
                "column '{key}' does not exist"
            )));
        };
        if let Some(column_type) = declared
            && !column_type.accepts(value)
        {
            return Err(AppError::TypeMismatch(format!(
                "invalid data type for column '{key}': expected a value compatible with {column_type}"
            )));
        }

        columns.push(column);
        args.push(json_to_sql(value));
    }

    if columns.is_empty() {
        return Err(AppError::BadRequest(
            "no valid columns found in request body".to_string(),
        ));
    }
    Ok(WritePlan { columns, args })
}

/// Convert a JSON value to a bindable SQLite value.
///
/// Column affinity finishes the job: an integer bound to a REAL column is
/// stored as a float, an integral float bound to INTEGER as an integer.
fn json_to_sql(value: &JsonValue) -> SqlValue {
    match value {
        JsonValue::Null => SqlValue::Null,
        JsonValue::Bool(b) => SqlValue::Integer(i64::from(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                SqlValue::Null
            }
        }
        JsonValue::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

// --- SQL assembly ---

pub fn build_insert_sql(table: &Identifier, columns: &[Identifier]) -> String {
    let names = columns
        .iter()
        .map(Identifier::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!("INSERT INTO {table} ({names}) VALUES ({placeholders})")
}

pub fn build_update_sql(table: &Identifier, columns: &[Identifier]) -> String {
    let assignments = columns
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("UPDATE {table} SET {assignments} WHERE id = ?")
}

pub fn select_by_id_sql(table: &Identifier) -> String {
    format!("SELECT * FROM {table} WHERE id = ? LIMIT 1")
}

pub fn delete_by_id_sql(table: &Identifier) -> String {
    format!("DELETE FROM {table} WHERE id = ?")
}

/// Assemble the CREATE TABLE statement for a user-declared schema.
///
/// Every table gets the implicit autoincrement `id` and a `created_at`
/// timestamp default; creation is idempotent.
pub fn build_create_table_sql(table: &Identifier, columns: &[(Identifier, ColumnType)]) -> String {
    let defs = columns
        .iter()
        .map(|(name, column_type)| format!("{name} {column_type}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (id INTEGER PRIMARY KEY AUTOINCREMENT, {defs}, created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP)"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn tasks_schema() -> TableSchema {
        TableSchema::from([
            ("id".to_string(), Some(ColumnType::Integer)),
            ("description".to_string(), Some(ColumnType::Text)),
            ("priority".to_string(), Some(ColumnType::Integer)),
            ("done".to_string(), Some(ColumnType::Boolean)),
            ("score".to_string(), Some(ColumnType::Real)),
            ("payload".to_string(), Some(ColumnType::Blob)),
            ("created_at".to_string(), None),
        ])
    }

    fn table() -> Identifier {
        Identifier::parse("tasks").unwrap()
    }

    #[test]
    fn test_list_options_defaults() {
        let opts = ListOptions::parse(&[]).unwrap();
        assert_eq!(opts.limit, DEFAULT_LIMIT);
        assert_eq!(opts.offset, 0);
        assert!(opts.sort.is_none());
        assert_eq!(opts.order, SortOrder::Asc);
        assert!(opts.fields.is_empty());
    }

    #[test]
    fn test_list_options_parsing() {
        let opts = ListOptions::parse(&params(&[
            ("limit", "20"),
            ("offset", "40"),
            ("sort", "priority"),
            ("order", "DESC"),
            ("fields", "id, description"),
        ]))
        .unwrap();
        assert_eq!(opts.limit, 20);
        assert_eq!(opts.offset, 40);
        assert_eq!(opts.sort.unwrap().as_str(), "priority");
        assert_eq!(opts.order, SortOrder::Desc);
        assert_eq!(opts.fields.len(), 2);
    }

    #[test]
    fn test_list_options_rejects_bad_values() {
        assert!(ListOptions::parse(&params(&[("limit", "zero")])).is_err());
        assert!(ListOptions::parse(&params(&[("limit", "0")])).is_err());
        assert!(ListOptions::parse(&params(&[("limit", "1001")])).is_err());
        assert!(ListOptions::parse(&params(&[("offset", "-1")])).is_err());
        assert!(ListOptions::parse(&params(&[("order", "sideways")])).is_err());
        assert!(ListOptions::parse(&params(&[("sort", "no;pe")])).is_err());
        assert!(ListOptions::parse(&params(&[("fields", "a,b;c")])).is_err());
    }

    #[test]
    fn test_plan_without_filters() {
        let plan =
            build_list_plan(&table(), &tasks_schema(), &[], &ListOptions::default()).unwrap();
        assert_eq!(
            plan.select_sql,
            "SELECT * FROM tasks ORDER BY id ASC LIMIT ? OFFSET ?"
        );
        assert_eq!(plan.count_sql, "SELECT COUNT(*) FROM tasks");
        assert!(plan.filter_args.is_empty());
    }

    #[test]
    fn test_plan_with_filters_and_sort() {
        let raw = params(&[("priority", "1"), ("done", "0"), ("limit", "10")]);
        let opts = ListOptions::parse(&raw).unwrap();
        let plan = build_list_plan(&table(), &tasks_schema(), &raw, &opts).unwrap();
        assert_eq!(
            plan.select_sql,
            "SELECT * FROM tasks WHERE priority = ? AND done = ? ORDER BY id ASC LIMIT ? OFFSET ?"
        );
        assert_eq!(plan.count_sql, "SELECT COUNT(*) FROM tasks WHERE priority = ? AND done = ?");
        assert_eq!(plan.filter_args.len(), 2);
        assert_eq!(plan.limit, 10);
    }

    #[test]
    fn test_plan_explicit_sort_overrides_default() {
        let raw = params(&[("sort", "priority"), ("order", "desc")]);
        let opts = ListOptions::parse(&raw).unwrap();
        let plan = build_list_plan(&table(), &tasks_schema(), &raw, &opts).unwrap();
        assert!(plan.select_sql.contains("ORDER BY priority DESC"));
    }

    #[test]
    fn test_plan_field_selection() {
        let raw = params(&[("fields", "id,description")]);
        let opts = ListOptions::parse(&raw).unwrap();
        let plan = build_list_plan(&table(), &tasks_schema(), &raw, &opts).unwrap();
        assert!(plan.select_sql.starts_with("SELECT id, description FROM tasks"));
    }

    #[test]
    fn test_plan_rejects_unknown_columns() {
        let raw = params(&[("missing", "1")]);
        let opts = ListOptions::default();
        assert!(matches!(
            build_list_plan(&table(), &tasks_schema(), &raw, &opts),
            Err(AppError::InvalidFilterValue(_))
        ));

        let raw = params(&[("sort", "missing")]);
        let opts = ListOptions::parse(&raw).unwrap();
        assert!(matches!(
            build_list_plan(&table(), &tasks_schema(), &raw, &opts),
            Err(AppError::InvalidSortColumn(_))
        ));

        let raw = params(&[("fields", "missing")]);
        let opts = ListOptions::parse(&raw).unwrap();
        assert!(matches!(
            build_list_plan(&table(), &tasks_schema(), &raw, &opts),
            Err(AppError::InvalidFieldColumn(_))
        ));
    }

    #[test]
    fn test_plan_rejects_unparseable_filter_values() {
        let opts = ListOptions::default();
        assert!(matches!(
            build_list_plan(&table(), &tasks_schema(), &params(&[("priority", "high")]), &opts),
            Err(AppError::InvalidFilterValue(_))
        ));
        assert!(matches!(
            build_list_plan(&table(), &tasks_schema(), &params(&[("score", "fast")]), &opts),
            Err(AppError::InvalidFilterValue(_))
        ));
    }

    #[test]
    fn test_plan_skips_blob_and_unknown_type_filters() {
        let raw = params(&[("payload", "abc"), ("created_at", "2024-01-01")]);
        let plan =
            build_list_plan(&table(), &tasks_schema(), &raw, &ListOptions::default()).unwrap();
        assert!(plan.filter_args.is_empty());
        assert!(!plan.select_sql.contains("WHERE"));
    }

    #[test]
    fn test_write_plan_basic() {
        let body = json!({"description": "doc", "priority": 1, "done": false});
        let plan = build_write_plan(&tasks_schema(), body.as_object().unwrap()).unwrap();
        assert_eq!(plan.columns.len(), 3);
        assert_eq!(plan.args.len(), 3);
    }

    #[test]
    fn test_write_plan_skips_id_silently() {
        let body = json!({"id": 99, "priority": 2});
        let plan = build_write_plan(&tasks_schema(), body.as_object().unwrap()).unwrap();
        assert_eq!(plan.columns.len(), 1);
        assert_eq!(plan.columns[0].as_str(), "priority");
    }

    #[test]
    fn test_write_plan_rejects_unknown_column() {
        let body = json!({"missing": 1});
        assert!(matches!(
            build_write_plan(&tasks_schema(), body.as_object().unwrap()),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_write_plan_rejects_type_mismatch() {
        let body = json!({"priority": "high"});
        assert!(matches!(
            build_write_plan(&tasks_schema(), body.as_object().unwrap()),
            Err(AppError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_write_plan_rejects_effectively_empty_body() {
        let body = json!({"id": 1});
        assert!(matches!(
            build_write_plan(&tasks_schema(), body.as_object().unwrap()),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_sql_assembly() {
        let columns = vec![
            Identifier::parse("description").unwrap(),
            Identifier::parse("priority").unwrap(),
        ];
        assert_eq!(
            build_insert_sql(&table(), &columns),
            "INSERT INTO tasks (description, priority) VALUES (?, ?)"
        );
        assert_eq!(
            build_update_sql(&table(), &columns),
            "UPDATE tasks SET description = ?, priority = ? WHERE id = ?"
        );
        assert_eq!(select_by_id_sql(&table()), "SELECT * FROM tasks WHERE id = ? LIMIT 1");
        assert_eq!(delete_by_id_sql(&table()), "DELETE FROM tasks WHERE id = ?");
    }

    #[test]
    fn test_create_table_sql() {
        let columns = vec![
            (Identifier::parse("description").unwrap(), ColumnType::Text),
            (Identifier::parse("done").unwrap(), ColumnType::Boolean),
        ];
        assert_eq!(
            build_create_table_sql(&table(), &columns),
            "CREATE TABLE IF NOT EXISTS tasks (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             description TEXT, done BOOLEAN, created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP)"
        );
    }
}
