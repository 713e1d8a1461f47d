use std::fmt;

use serde_json::Value;

use crate::constants::MAX_IDENTIFIER_LEN;
use crate::error::AppError;

/// Check if a string is a valid identifier (database, table, or column name).
///
/// Identifiers are alphanumeric plus underscore, 1 to 64 characters. Every
/// name that ends up interpolated into SQL must pass this check first.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// A user-supplied name proven safe for SQL identifier positions.
///
/// The only constructor is [`Identifier::parse`], so SQL assembly functions
/// that take an `Identifier` cannot receive an unvalidated string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(name: &str) -> Result<Self, AppError> {
        if is_valid_identifier(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(AppError::BadRequest(format!(
                "invalid name '{name}': use only alphanumeric characters and underscores (a-z, A-Z, 0-9, _), max length {MAX_IDENTIFIER_LEN}"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Column types accepted for user-declared columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Blob,
    Boolean,
}

impl ColumnType {
    /// Normalize a declared type name, accepting only the closed set.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "TEXT" => Some(Self::Text),
            "INTEGER" => Some(Self::Integer),
            "REAL" => Some(Self::Real),
            "BLOB" => Some(Self::Blob),
            "BOOLEAN" => Some(Self::Boolean),
            _ => None,
        }
    }

    /// Canonical upper-case SQL spelling.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Blob => "BLOB",
            Self::Boolean => "BOOLEAN",
        }
    }

    /// Whether a JSON value may be written to a column of this type.
    ///
    /// INTEGER also takes floats with an integral value, BOOLEAN takes the
    /// numbers 0 and 1, and BLOB leniently takes any string. Null is always
    /// accepted.
    pub fn accepts(self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            Self::Integer => match value {
                Value::Number(n) => {
                    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.floor() == f)
                }
                _ => false,
            },
            Self::Real => value.is_number(),
            Self::Text | Self::Blob => value.is_string(),
            Self::Boolean => match value {
                Value::Bool(_) => true,
                Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0 || f == 1.0),
                _ => false,
            },
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Minimal email shape check for signup
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
