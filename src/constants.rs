/// Prefix carried by every issued API key
pub const API_KEY_PREFIX: &str = "neb_";

/// Length in bytes of the random secret part of an API key
pub const API_KEY_SECRET_LEN: usize = 32;

/// Issuer claim stamped into every bearer token
pub const JWT_ISSUER: &str = "nebula-backend";

/// Default page size for record listings
pub const DEFAULT_LIMIT: i64 = 100;

/// Hard ceiling for the `limit` query parameter
pub const MAX_LIMIT: i64 = 1000;

/// Maximum length of a database, table, or column identifier
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Busy timeout applied to every SQLite connection
pub const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Minimum username length accepted at signup
pub const MIN_USERNAME_LEN: usize = 6;

/// Minimum password length accepted at signup
pub const MIN_PASSWORD_LEN: usize = 8;
