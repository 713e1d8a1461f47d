use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::AppState;
use crate::auth;
use crate::constants::API_KEY_PREFIX;
use crate::db::metadata;
use crate::error::{AppError, Result};
use crate::validation::Identifier;

/// Identity attached to a request by the combined authorizer.
///
/// `db_scope` is the database id an API key is bound to; bearer tokens
/// carry no scope and may address any of the user's databases.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub db_scope: Option<i64>,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let (scheme, credentials) = split_auth_header(parts)?;

        match scheme.to_lowercase().as_str() {
            "bearer" => {
                let user_id = auth::validate_token(&credentials, &state.config.jwt_secret)?;
                Ok(AuthContext {
                    user_id,
                    db_scope: None,
                })
            }
            "apikey" => {
                if !credentials.starts_with(API_KEY_PREFIX) {
                    return Err(AppError::TokenMalformed);
                }
                let (user_id, database_id) = metadata::lookup_api_key(&state.meta, &credentials)?
                    .ok_or(AppError::Unauthorized)?;
                Ok(AuthContext {
                    user_id,
                    db_scope: Some(database_id),
                })
            }
            _ => Err(AppError::TokenMalformed),
        }
    }
}

impl AuthContext {
    /// Resolve the request's target database and enforce the credential's
    /// scope before any tenant storage is touched.
    ///
    /// Returns the database id and its file path.
    pub fn resolve_database(
        &self,
        state: &AppState,
        db_name: &Identifier,
    ) -> Result<(i64, String)> {
        let database_id = metadata::find_database_id(&state.meta, &self.user_id, db_name.as_str())?;

        if let Some(scope) = self.db_scope
            && scope != database_id
        {
            tracing::warn!(
                "User {} key scoped to database {scope} attempted access to '{db_name}' ({database_id})",
                self.user_id
            );
            return Err(AppError::Forbidden);
        }

        let file_path = metadata::find_database_path(&state.meta, &self.user_id, db_name.as_str())?;
        Ok((database_id, file_path))
    }
}

/// Bearer-only identity for account-scope routes such as API key
/// management.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let (scheme, credentials) = split_auth_header(parts)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(AppError::TokenMalformed);
        }
        let user_id = auth::validate_token(&credentials, &state.config.jwt_secret)?;
        Ok(AuthUser { user_id })
    }
}

fn split_auth_header(parts: &Parts) -> Result<(String, String)> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let (scheme, credentials) = header.split_once(' ').ok_or(AppError::TokenMalformed)?;
    if credentials.is_empty() {
        return Err(AppError::TokenMalformed);
    }
    Ok((scheme.to_string(), credentials.to_string()))
}
