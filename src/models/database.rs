use serde::Serialize;

/// One database registration as presented in listings.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseSummary {
    pub database_id: i64,
    pub db_name: String,
    pub file_path: String,
    pub created_at: String,
    pub table_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}
