//! Access-token (JWT) minting and verification, plus opaque email-verification tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// ---------------------------------------------------------------------------
// Opaque token helpers
// ---------------------------------------------------------------------------

/// Generate an opaque random token with the given prefix and byte length.
pub fn generate_opaque_token(prefix: &str, bytes: usize) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use rand::Rng;
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(&mut buf[..]);
    format!("{}_{}", prefix, URL_SAFE_NO_PAD.encode(&buf))
}

/// Generate an email-verification token (opaque, `vt_` prefix).
pub fn generate_verification_token() -> String {
    generate_opaque_token(board_common::id::prefix::VERIFY_TOKEN, 32)
}

// ---------------------------------------------------------------------------
// Access token (JWT signed with HS256)
// ---------------------------------------------------------------------------

/// Access-token TTL in days.
pub const ACCESS_TOKEN_TTL_DAYS: i64 = 7;

/// Claims embedded in the access token JWT.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject — the user's prefixed ULID.
    pub sub: String,
    /// Email the account was registered with.
    pub email: String,
    /// Expiration (unix timestamp).
    pub exp: i64,
    /// Issued-at (unix timestamp).
    pub iat: i64,
}

/// Mint a signed access token for a verified account.
pub fn mint_access_token(secret: &str, user_id: &str, email: &str) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = AccessClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        exp: (now + Duration::days(ACCESS_TOKEN_TTL_DAYS)).timestamp(),
        iat: now.timestamp(),
    };

    let header = Header::new(Algorithm::HS256);
    jsonwebtoken::encode(&header, &claims, &EncodingKey::from_secret(secret.as_bytes())).map_err(
        |e| {
            tracing::error!(?e, "failed to sign access token");
            ApiError::internal("Failed to issue token")
        },
    )
}

/// Verify an access token and return its claims, or `None` if the token is
/// invalid or expired. Callers treat `None` as an unauthenticated request.
pub fn verify_access_token(secret: &str, token: &str) -> Option<AccessClaims> {
    let validation = Validation::new(Algorithm::HS256);
    jsonwebtoken::decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-not-for-production";

    #[test]
    fn access_token_round_trips() {
        let token = mint_access_token(SECRET, "usr_01ABC", "ada@college.edu").unwrap();
        let claims = verify_access_token(SECRET, &token).expect("token should verify");
        assert_eq!(claims.sub, "usr_01ABC");
        assert_eq!(claims.email, "ada@college.edu");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint_access_token(SECRET, "usr_01ABC", "ada@college.edu").unwrap();
        assert!(verify_access_token("another-secret", &token).is_none());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verify_access_token(SECRET, "not-a-jwt").is_none());
    }

    #[test]
    fn verification_tokens_are_prefixed_and_unique() {
        let a = generate_verification_token();
        let b = generate_verification_token();
        assert!(a.starts_with("vt_"));
        assert_ne!(a, b);
    }
}
