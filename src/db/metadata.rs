use rusqlite::{Connection, ErrorCode, OptionalExtension, params};

use crate::auth;
use crate::db::{MetaDb, meta_conn};
use crate::error::{AppError, Result};
use crate::models::{DatabaseSummary, User};

/// Ensure the metadata tables exist.
///
/// `databases` and `api_keys` cascade on user deletion; `api_database_id`
/// is UNIQUE so at most one key can be bound to a database at a time.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY NOT NULL,
            username TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS databases (
            database_id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            db_name TEXT NOT NULL,
            file_path TEXT UNIQUE NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (owner_id, db_name),
            FOREIGN KEY (owner_id) REFERENCES users(user_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS api_keys (
            api_key_id INTEGER PRIMARY KEY AUTOINCREMENT,
            api_owner_id TEXT NOT NULL,
            api_database_id INTEGER UNIQUE NOT NULL,
            key TEXT UNIQUE NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (api_owner_id) REFERENCES users(user_id) ON DELETE CASCADE,
            FOREIGN KEY (api_database_id) REFERENCES databases(database_id) ON DELETE CASCADE
        );
        "#,
    )
}

fn is_unique_violation(err: &rusqlite::Error, needle: &str) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, message) => {
            e.code == ErrorCode::ConstraintViolation
                && message.as_deref().is_some_and(|m| m.contains(needle))
        }
        _ => false,
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

// --- User Operations ---

/// Insert a new user into the metadata database.
pub fn create_user(
    db: &MetaDb,
    user_id: &str,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<String> {
    let conn = meta_conn(db);
    conn.execute(
        "INSERT INTO users (user_id, username, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, username, email, password_hash],
    )
    .map_err(|err| {
        if is_unique_violation(&err, "users.email") {
            return AppError::EmailExists;
        }
        tracing::warn!("Failed to insert user {email}: {err}");
        err.into()
    })?;
    Ok(user_id.to_string())
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Retrieve a user by email address.
pub fn find_user_by_email(db: &MetaDb, email: &str) -> Result<User> {
    let conn = meta_conn(db);
    conn.query_row(
        "SELECT user_id, username, email, password_hash, created_at
         FROM users WHERE email = ?1 LIMIT 1",
        params![email],
        user_from_row,
    )
    .optional()?
    .ok_or(AppError::UserNotFound)
}

/// Retrieve a user by opaque id.
pub fn find_user_by_id(db: &MetaDb, user_id: &str) -> Result<User> {
    let conn = meta_conn(db);
    conn.query_row(
        "SELECT user_id, username, email, password_hash, created_at
         FROM users WHERE user_id = ?1 LIMIT 1",
        params![user_id],
        user_from_row,
    )
    .optional()?
    .ok_or(AppError::UserNotFound)
}

// --- Database Registration Operations ---

/// Insert a new database registration record.
pub fn register_database(db: &MetaDb, user_id: &str, db_name: &str, file_path: &str) -> Result<()> {
    let conn = meta_conn(db);
    conn.execute(
        "INSERT INTO databases (owner_id, db_name, file_path) VALUES (?1, ?2, ?3)",
        params![user_id, db_name, file_path],
    )
    .map_err(|err| {
        // UNIQUE(owner_id, db_name) or UNIQUE(file_path); both mean the
        // name is taken for this user
        if is_constraint_violation(&err) {
            tracing::warn!("Constraint violation registering '{db_name}' for user {user_id}");
            return AppError::DatabaseExists;
        }
        tracing::warn!("Failed to register database '{db_name}' for user {user_id}: {err}");
        err.into()
    })?;
    Ok(())
}

/// Retrieve the file path for a given user and database name.
pub fn find_database_path(db: &MetaDb, user_id: &str, db_name: &str) -> Result<String> {
    let conn = meta_conn(db);
    conn.query_row(
        "SELECT file_path FROM databases WHERE owner_id = ?1 AND db_name = ?2 LIMIT 1",
        params![user_id, db_name],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(AppError::DatabaseNotFound)
}

/// Retrieve the id of a database owned by a specific user.
pub fn find_database_id(db: &MetaDb, user_id: &str, db_name: &str) -> Result<i64> {
    let conn = meta_conn(db);
    conn.query_row(
        "SELECT database_id FROM databases WHERE owner_id = ?1 AND db_name = ?2 LIMIT 1",
        params![user_id, db_name],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(AppError::DatabaseNotFound)
}

/// List a user's database registrations with their bound API key, if any.
///
/// Table counts are filled in by the caller, which owns tenant access.
pub fn list_databases(db: &MetaDb, user_id: &str) -> Result<Vec<DatabaseSummary>> {
    let conn = meta_conn(db);
    let mut stmt = conn.prepare(
        "SELECT d.database_id, d.db_name, d.file_path, d.created_at, k.key
         FROM databases d
         LEFT JOIN api_keys k ON k.api_database_id = d.database_id
         WHERE d.owner_id = ?1
         ORDER BY d.db_name",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(DatabaseSummary {
            database_id: row.get(0)?,
            db_name: row.get(1)?,
            file_path: row.get(2)?,
            created_at: row.get(3)?,
            table_count: 0,
            api_key: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Remove a database registration. API keys bound to it cascade away.
pub fn delete_database_registration(db: &MetaDb, user_id: &str, db_name: &str) -> Result<()> {
    let conn = meta_conn(db);
    let affected = conn.execute(
        "DELETE FROM databases WHERE owner_id = ?1 AND db_name = ?2",
        params![user_id, db_name],
    )?;
    if affected == 0 {
        return Err(AppError::DatabaseNotFound);
    }
    Ok(())
}

// --- API Key Operations ---

/// Generate and store a new API key bound to (owner, database).
///
/// Returns the full key exactly once; a second key for the same database is
/// a conflict, not an overwrite.
pub fn store_api_key(db: &MetaDb, user_id: &str, database_id: i64) -> Result<String> {
    let key = auth::generate_api_key()?;
    let conn = meta_conn(db);
    conn.execute(
        "INSERT INTO api_keys (api_owner_id, api_database_id, key) VALUES (?1, ?2, ?3)",
        params![user_id, database_id, key],
    )
    .map_err(|err| {
        if is_constraint_violation(&err) {
            return AppError::Conflict(
                "an API key already exists for this database".to_string(),
            );
        }
        tracing::warn!("Failed to store API key for database {database_id}: {err}");
        err.into()
    })?;
    Ok(key)
}

/// Retrieve the key bound to a database, if one exists.
pub fn find_api_key_by_database(db: &MetaDb, database_id: i64) -> Result<Option<String>> {
    let conn = meta_conn(db);
    Ok(conn
        .query_row(
            "SELECT key FROM api_keys WHERE api_database_id = ?1 LIMIT 1",
            params![database_id],
            |row| row.get(0),
        )
        .optional()?)
}

/// Resolve an opaque key value to its owner and scoped database.
pub fn lookup_api_key(db: &MetaDb, key: &str) -> Result<Option<(String, i64)>> {
    let conn = meta_conn(db);
    Ok(conn
        .query_row(
            "SELECT api_owner_id, api_database_id FROM api_keys WHERE key = ?1 LIMIT 1",
            params![key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?)
}

/// Delete an API key by its opaque value.
pub fn delete_api_key(db: &MetaDb, key: &str) -> Result<()> {
    let conn = meta_conn(db);
    let affected = conn.execute("DELETE FROM api_keys WHERE key = ?1", params![key])?;
    if affected == 0 {
        return Err(AppError::ApiKeyNotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn test_db() -> MetaDb {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        init_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn seed_user(db: &MetaDb, id: &str) {
        create_user(db, id, "tester", &format!("{id}@example.com"), "hash").unwrap();
    }

    #[test]
    fn test_create_user_duplicate_email() {
        let db = test_db();
        create_user(&db, "u1", "alice1", "a@b.co", "hash").unwrap();
        let err = create_user(&db, "u2", "alice2", "a@b.co", "hash").unwrap_err();
        assert!(matches!(err, AppError::EmailExists));
    }

    #[test]
    fn test_find_user() {
        let db = test_db();
        seed_user(&db, "u1");
        let user = find_user_by_email(&db, "u1@example.com").unwrap();
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.username, "tester");
        assert_eq!(find_user_by_id(&db, "u1").unwrap().email, "u1@example.com");
        assert!(matches!(
            find_user_by_id(&db, "missing"),
            Err(AppError::UserNotFound)
        ));
    }

    #[test]
    fn test_register_database_uniqueness() {
        let db = test_db();
        seed_user(&db, "u1");
        seed_user(&db, "u2");
        register_database(&db, "u1", "appdb", "data/u1/appdb.db").unwrap();
        // same name for the same user conflicts
        let err = register_database(&db, "u1", "appdb", "data/u1/appdb2.db").unwrap_err();
        assert!(matches!(err, AppError::DatabaseExists));
        // other users can reuse the name
        register_database(&db, "u2", "appdb", "data/u2/appdb.db").unwrap();
    }

    #[test]
    fn test_database_lookup_and_delete() {
        let db = test_db();
        seed_user(&db, "u1");
        register_database(&db, "u1", "appdb", "data/u1/appdb.db").unwrap();

        assert_eq!(
            find_database_path(&db, "u1", "appdb").unwrap(),
            "data/u1/appdb.db"
        );
        let id = find_database_id(&db, "u1", "appdb").unwrap();
        assert!(id > 0);

        delete_database_registration(&db, "u1", "appdb").unwrap();
        assert!(matches!(
            find_database_path(&db, "u1", "appdb"),
            Err(AppError::DatabaseNotFound)
        ));
        assert!(matches!(
            delete_database_registration(&db, "u1", "appdb"),
            Err(AppError::DatabaseNotFound)
        ));
    }

    #[test]
    fn test_api_key_single_per_database() {
        let db = test_db();
        seed_user(&db, "u1");
        register_database(&db, "u1", "appdb", "data/u1/appdb.db").unwrap();
        let id = find_database_id(&db, "u1", "appdb").unwrap();

        let key = store_api_key(&db, "u1", id).unwrap();
        assert!(key.starts_with("neb_"));
        assert!(matches!(
            store_api_key(&db, "u1", id),
            Err(AppError::Conflict(_))
        ));

        let (owner, scoped) = lookup_api_key(&db, &key).unwrap().unwrap();
        assert_eq!(owner, "u1");
        assert_eq!(scoped, id);
        assert_eq!(find_api_key_by_database(&db, id).unwrap(), Some(key.clone()));

        delete_api_key(&db, &key).unwrap();
        assert!(lookup_api_key(&db, &key).unwrap().is_none());
        assert!(matches!(
            delete_api_key(&db, &key),
            Err(AppError::ApiKeyNotFound)
        ));
    }

    #[test]
    fn test_user_deletion_cascades() {
        let db = test_db();
        seed_user(&db, "u1");
        register_database(&db, "u1", "appdb", "data/u1/appdb.db").unwrap();
        let id = find_database_id(&db, "u1", "appdb").unwrap();
        let key = store_api_key(&db, "u1", id).unwrap();

        {
            let conn = meta_conn(&db);
            conn.execute("DELETE FROM users WHERE user_id = ?1", params!["u1"])
                .unwrap();
        }

        assert!(matches!(
            find_database_path(&db, "u1", "appdb"),
            Err(AppError::DatabaseNotFound)
        ));
        assert!(lookup_api_key(&db, &key).unwrap().is_none());
    }

    #[test]
    fn test_list_databases_includes_key() {
        let db = test_db();
        seed_user(&db, "u1");
        register_database(&db, "u1", "appdb", "data/u1/appdb.db").unwrap();
        register_database(&db, "u1", "other", "data/u1/other.db").unwrap();
        let id = find_database_id(&db, "u1", "appdb").unwrap();
        let key = store_api_key(&db, "u1", id).unwrap();

        let summaries = list_databases(&db, "u1").unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].db_name, "appdb");
        assert_eq!(summaries[0].api_key.as_deref(), Some(key.as_str()));
        assert_eq!(summaries[1].db_name, "other");
        assert!(summaries[1].api_key.is_none());
    }
}
