pub mod metadata;
pub mod tenant;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;

use crate::constants::BUSY_TIMEOUT_MS;
use crate::error::{AppError, Result};
use crate::validation::Identifier;

/// Shared handle to the metadata store.
///
/// SQLite serializes writers; readers proceed under WAL. The mutex keeps a
/// single connection safe to share across handler tasks.
pub type MetaDb = Arc<Mutex<Connection>>;

/// Lock the metadata connection, recovering from a poisoned mutex.
pub(crate) fn meta_conn(db: &MetaDb) -> MutexGuard<'_, Connection> {
    db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.query_row("PRAGMA journal_mode = WAL", [], |_row| Ok(()))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Open the metadata store, creating the data directory and the schema on
/// first run.
pub fn open_metadata(directory: &Path, file_name: &str) -> Result<MetaDb> {
    std::fs::create_dir_all(directory).map_err(|err| {
        tracing::error!("Failed to create data directory {directory:?}: {err}");
        err
    })?;

    let path = directory.join(file_name);
    tracing::info!("Opening metadata database at {path:?}");

    let conn = Connection::open(&path)?;
    apply_pragmas(&conn)?;
    metadata::init_schema(&conn)?;

    tracing::info!("Metadata database initialized");
    Ok(Arc::new(Mutex::new(conn)))
}

/// Build the on-disk location of a tenant database file.
///
/// Files live at `<root>/<user_id>/<db_name>.db`. The identifier character
/// set already forbids traversal, but the resolved path is still asserted
/// to stay inside the storage root before any open or unlink.
pub fn tenant_db_path(root: &Path, user_id: &str, db_name: &Identifier) -> Result<PathBuf> {
    let path = root.join(user_id).join(format!("{db_name}.db"));
    if !path.starts_with(root) {
        tracing::error!("Tenant path {path:?} escapes storage root {root:?}");
        return Err(AppError::Internal("invalid database path".to_string()));
    }
    Ok(path)
}

/// Open a tenant database file for the duration of one request.
///
/// The returned connection applies the same pragmas as the metadata store
/// and is released when it goes out of scope, on every exit path.
pub fn open_tenant(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(|err| {
        tracing::warn!("Failed to open tenant database {path:?}: {err}");
        err
    })?;
    apply_pragmas(&conn)?;
    Ok(conn)
}
