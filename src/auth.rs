use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::constants::{API_KEY_PREFIX, API_KEY_SECRET_LEN, JWT_ISSUER};
use crate::error::{AppError, Result};

/// Claims carried by a bearer token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
}

// --- Password Utilities ---

/// Generate a bcrypt hash for the given password
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|err| {
        tracing::error!("Failed to hash password: {err}");
        AppError::Internal("failed to process password".to_string())
    })
}

/// Compare a plaintext password with a stored bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(matches) => matches,
        Err(err) => {
            tracing::warn!("Unexpected error comparing password hash: {err}");
            false
        }
    }
}

// --- JWT Utilities ---

/// Create a signed bearer token for a user
pub fn generate_token(
    user_id: &str,
    secret: &str,
    expiration: chrono::Duration,
) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        user_id: user_id.to_string(),
        iat: now.timestamp(),
        nbf: now.timestamp(),
        exp: (now + expiration).timestamp(),
        iss: JWT_ISSUER.to_string(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| {
        tracing::error!("Failed to sign token for user {user_id}: {err}");
        AppError::Internal("failed to generate token".to_string())
    })
}

/// Parse and validate a bearer token, returning the user id.
///
/// Only HMAC-SHA-256 tokens are accepted; `exp`, `nbf`, and the issuer are
/// all enforced.
pub fn validate_token(token: &str, secret: &str) -> Result<String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[JWT_ISSUER]);
    validation.validate_nbf = true;
    validation.set_required_spec_claims(&["exp", "nbf", "iss"]);

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|err| {
        tracing::debug!("Token validation failed: {err}");
        match err.kind() {
            ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => AppError::TokenExpired,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                AppError::UnexpectedSigningMethod
            }
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => AppError::TokenMalformed,
            ErrorKind::InvalidIssuer | ErrorKind::MissingRequiredClaim(_) => {
                AppError::TokenClaimsInvalid
            }
            _ => AppError::TokenInvalid,
        }
    })?;

    if data.claims.user_id.is_empty() {
        return Err(AppError::TokenClaimsInvalid);
    }
    Ok(data.claims.user_id)
}

// --- API Key Utilities ---

/// Generate a fresh opaque API key: `neb_` + base64url of 32 random bytes.
///
/// The value is returned to the caller exactly once after it is stored.
pub fn generate_api_key() -> Result<String> {
    let mut bytes = [0u8; API_KEY_SECRET_LEN];
    OsRng.try_fill_bytes(&mut bytes).map_err(|err| {
        tracing::error!("Failed to read random bytes for API key: {err}");
        AppError::KeyGeneration
    })?;
    Ok(format!("{API_KEY_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-signing-secret";

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("passw0rd!").unwrap();
        assert_ne!(hash, "passw0rd!");
        assert!(verify_password("passw0rd!", &hash));
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn test_verify_password_garbage_hash() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }

    #[test]
    fn test_token_round_trip() {
        let token = generate_token("user-123", SECRET, chrono::Duration::hours(1)).unwrap();
        let user_id = validate_token(&token, SECRET).unwrap();
        assert_eq!(user_id, "user-123");
    }

    #[test]
    fn test_expired_token() {
        let token = generate_token("user-123", SECRET, chrono::Duration::hours(-1)).unwrap();
        assert!(matches!(
            validate_token(&token, SECRET),
            Err(AppError::TokenExpired)
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let token = generate_token("user-123", SECRET, chrono::Duration::hours(1)).unwrap();
        assert!(matches!(
            validate_token(&token, "other-secret"),
            Err(AppError::TokenInvalid)
        ));
    }

    #[test]
    fn test_malformed_token() {
        assert!(matches!(
            validate_token("not.a.token", SECRET),
            Err(AppError::TokenMalformed)
        ));
        assert!(matches!(
            validate_token("", SECRET),
            Err(AppError::TokenMalformed)
        ));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let now = Utc::now();
        let claims = Claims {
            user_id: "user-123".to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + chrono::Duration::hours(1)).timestamp(),
            iss: "someone-else".to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            validate_token(&token, SECRET),
            Err(AppError::TokenClaimsInvalid)
        ));
    }

    #[test]
    fn test_api_key_shape() {
        let key = generate_api_key().unwrap();
        assert!(key.starts_with(API_KEY_PREFIX));
        // 32 bytes base64url without padding is 43 characters
        assert_eq!(key.len(), API_KEY_PREFIX.len() + 43);
        assert_ne!(key, generate_api_key().unwrap());
    }
}
