use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application error type
///
/// Every failure that can cross a handler boundary is one of these kinds;
/// `IntoResponse` maps each kind to its stable HTTP status and public
/// message.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("user not found")]
    UserNotFound,

    #[error("database not found or not registered")]
    DatabaseNotFound,

    #[error("record not found")]
    RecordNotFound,

    #[error("table not found")]
    TableNotFound,

    #[error("api key not found for this database")]
    ApiKeyNotFound,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("malformed token")]
    TokenMalformed,

    #[error("token is expired or not valid yet")]
    TokenExpired,

    #[error("invalid token claims")]
    TokenClaimsInvalid,

    #[error("invalid token")]
    TokenInvalid,

    #[error("unexpected token signing method")]
    UnexpectedSigningMethod,

    #[error("authorization required")]
    Unauthorized,

    #[error("credential is not valid for this database")]
    Forbidden,

    #[error("email already exists")]
    EmailExists,

    #[error("database name already exists for this user")]
    DatabaseExists,

    #[error("constraint violation")]
    ConstraintViolation,

    #[error("{0}")]
    Conflict(String),

    #[error("column not found")]
    ColumnNotFound,

    #[error("{0}")]
    TypeMismatch(String),

    #[error("invalid filter: {0}")]
    InvalidFilterValue(String),

    #[error("invalid sort column: {0}")]
    InvalidSortColumn(String),

    #[error("invalid field column: {0}")]
    InvalidFieldColumn(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("too many requests")]
    RateLimited,

    #[error("failed to generate api key")]
    KeyGeneration,

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::UserNotFound
            | AppError::DatabaseNotFound
            | AppError::RecordNotFound
            | AppError::TableNotFound
            | AppError::ApiKeyNotFound => (StatusCode::NOT_FOUND, self.to_string()),

            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid email or password.".to_string(),
            ),
            AppError::TokenMalformed
            | AppError::TokenInvalid
            | AppError::TokenClaimsInvalid
            | AppError::UnexpectedSigningMethod => (
                StatusCode::UNAUTHORIZED,
                "Invalid or malformed authentication token.".to_string(),
            ),
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "Authentication token has expired.".to_string(),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authorization required.".to_string(),
            ),

            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),

            AppError::EmailExists
            | AppError::DatabaseExists
            | AppError::ConstraintViolation
            | AppError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),

            AppError::ColumnNotFound
            | AppError::TypeMismatch(_)
            | AppError::InvalidFilterValue(_)
            | AppError::InvalidSortColumn(_)
            | AppError::InvalidFieldColumn(_)
            | AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),

            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Please wait.".to_string(),
            ),

            AppError::Sqlite(err) => {
                tracing::error!("Database error: {err:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected internal server error occurred.".to_string(),
                )
            }
            AppError::Io(err) => {
                tracing::error!("IO error: {err:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected internal server error occurred.".to_string(),
                )
            }
            AppError::KeyGeneration | AppError::Internal(_) => {
                tracing::error!("Internal error: {self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected internal server error occurred.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Result type alias for application results
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_not_found_kinds() {
        assert_eq!(status_of(AppError::UserNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::DatabaseNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::RecordNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::TableNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::ApiKeyNotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_auth_kinds() {
        assert_eq!(
            status_of(AppError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(AppError::TokenExpired), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(AppError::UnexpectedSigningMethod),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(AppError::Forbidden), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_conflict_and_bad_request_kinds() {
        assert_eq!(status_of(AppError::EmailExists), StatusCode::CONFLICT);
        assert_eq!(status_of(AppError::DatabaseExists), StatusCode::CONFLICT);
        assert_eq!(
            status_of(AppError::TypeMismatch("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::InvalidFilterValue("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_internal_kinds_hide_details() {
        let response = AppError::Internal("secret detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
