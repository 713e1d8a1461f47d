use serde::Serialize;

/// A registered account as stored in the metadata database.
///
/// The password hash never leaves the process; it is skipped on
/// serialization.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}
