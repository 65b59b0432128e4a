/// Authentication extractors and utilities
///
/// The moderation core trusts the `admin_id` it is handed; this module is the
/// boundary that produces it from a bearer token.
use crate::{
    admin::AdminActor,
    api::middleware::{client_ip, extract_bearer_token},
    context::AppContext,
    error::{AdminError, AdminResult},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by an admin token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminClaims {
    pub admin_id: String,
    pub exp: i64,
}

/// Hash a password with Argon2id and a random salt
pub fn hash_password(password: &str) -> AdminResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AdminError::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored hash; malformed hashes never match
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Mint an HS256 token for an admin
pub fn issue_token(admin_id: &str, jwt_secret: &str, ttl_hours: i64) -> AdminResult<String> {
    let claims = AdminClaims {
        admin_id: admin_id.to_string(),
        exp: (Utc::now() + Duration::hours(ttl_hours)).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| AdminError::Internal(format!("Failed to sign token: {}", e)))
}

/// Verify a token's signature and expiry
pub fn verify_token(token: &str, jwt_secret: &str) -> AdminResult<AdminClaims> {
    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);

    decode::<AdminClaims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::warn!("JWT verification failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AdminError::Unauthorized("Token has expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AdminError::Unauthorized("Invalid token signature".to_string())
                }
                _ => AdminError::Unauthorized("Token is invalid".to_string()),
            }
        })
}

/// Admin authentication context - requires a valid token for an existing admin
#[derive(Debug, Clone)]
pub struct AdminAuthContext {
    pub actor: AdminActor,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = AdminError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| AdminError::Unauthorized("Token is missing".to_string()))?;

        let claims = verify_token(&token, &state.config.authentication.jwt_secret)?;

        // Tokens outlive deleted accounts
        state.admins.profile(&claims.admin_id).await.map_err(|e| match e {
            AdminError::NotFound(_) => AdminError::Unauthorized("Invalid admin".to_string()),
            other => other,
        })?;

        let actor = AdminActor::new(claims.admin_id).with_ip(client_ip(parts));
        tracing::debug!("Authenticated admin {}", actor.admin_id);

        Ok(AdminAuthContext { actor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-that-is-at-least-32-chars";

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-hash"));
    }

    #[test]
    fn test_token_roundtrip() {
        let token = issue_token("admin-1", SECRET, 24).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.admin_id, "admin-1");
    }

    #[test]
    fn test_token_rejections() {
        let token = issue_token("admin-1", SECRET, 24).unwrap();
        assert!(matches!(
            verify_token(&token, "another-secret-key-of-sufficient-len"),
            Err(AdminError::Unauthorized(_))
        ));

        let expired = issue_token("admin-1", SECRET, -2).unwrap();
        assert!(matches!(
            verify_token(&expired, SECRET),
            Err(AdminError::Unauthorized(_))
        ));
    }
}
