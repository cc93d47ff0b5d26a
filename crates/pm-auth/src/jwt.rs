//! JWT token codec
//!
//! Tokens are compact HS512-signed strings carrying the subject (email),
//! issued-at, expiry and a claim set with at least `userId` and `role`.
//! `decode` verifies signature and structure only; expiry is a separate,
//! explicit check so callers that only need the claimed identity can still
//! read an expired token.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use pm_core::PmError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum signing key length in bytes (HMAC-SHA512 block discipline)
const MIN_SECRET_LEN: usize = 64;

/// Token errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid token: {0}")]
    Invalid(String),
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

impl From<TokenError> for PmError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid(_) => PmError::InvalidToken,
            TokenError::Encoding(msg) => PmError::Internal(msg),
        }
    }
}

/// Custom claims embedded at token issuance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimSet {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub role: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    /// Open mapping for any further scalar claims
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Full decoded token payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's email
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    #[serde(flatten)]
    pub claims: ClaimSet,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Expiry check against the current time
    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}

/// Codec producing and consuming signed tokens.
///
/// The signing key is process-wide, read-only shared state after startup;
/// issuing and decoding are pure and safe from any number of concurrent
/// requests.
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The signing keys are secret material and deliberately not printed
        f.debug_struct("JwtCodec").finish_non_exhaustive()
    }
}

impl JwtCodec {
    /// Create a codec from the process-wide secret.
    ///
    /// Fails with a configuration error if the key is absent or too short
    /// for HMAC-SHA512.
    pub fn new(secret: &str) -> Result<Self, PmError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(PmError::Config(format!(
                "JWT secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// Issue a signed token for `subject` with the given claims and TTL.
    ///
    /// A non-positive TTL produces an immediately expired token; issuance
    /// itself still succeeds.
    pub fn issue(&self, subject: &str, claims: ClaimSet, ttl_secs: i64) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let payload = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now + ttl_secs,
            claims,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS512), &payload, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify signature and structure, returning the decoded claims.
    ///
    /// Deliberately does NOT reject expired tokens; call
    /// [`Claims::is_expired`] (or [`JwtCodec::is_expired`]) where expiry
    /// matters. A wrong algorithm, a bad signature or a malformed structure
    /// all fail with `TokenError::Invalid`.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.validate_exp = false;

        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }

    /// Decode and check expiry in one step
    pub fn is_expired(&self, token: &str) -> Result<bool, TokenError> {
        Ok(self.decode(token)?.is_expired())
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn extract_bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        let token = token.trim();
        (!token.is_empty()).then_some(token)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_secret() -> String {
        "0123456789abcdef".repeat(4)
    }

    fn codec() -> JwtCodec {
        JwtCodec::new(&test_secret()).unwrap()
    }

    fn claim_set(user_id: i64) -> ClaimSet {
        ClaimSet {
            user_id,
            role: "USER".into(),
            full_name: "Test User".into(),
            extra: HashMap::new(),
        }
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = JwtCodec::new("too-short").unwrap_err();
        assert!(matches!(err, PmError::Config(_)));
    }

    #[test]
    fn test_issue_decode_round_trip() {
        let codec = codec();
        let mut claims = claim_set(42);
        claims
            .extra
            .insert("tenant".into(), serde_json::json!("acme"));

        let token = codec.issue("a@x.com", claims, 3600).unwrap();
        let decoded = codec.decode(&token).unwrap();

        assert_eq!(decoded.sub, "a@x.com");
        assert_eq!(decoded.claims.user_id, 42);
        assert_eq!(decoded.claims.role, "USER");
        assert_eq!(decoded.claims.full_name, "Test User");
        assert_eq!(
            decoded.claims.extra.get("tenant"),
            Some(&serde_json::json!("acme"))
        );
        assert!(!decoded.is_expired());
        assert!(decoded.exp > decoded.iat);
    }

    #[test]
    fn test_zero_ttl_is_expired_immediately() {
        let codec = codec();
        let token = codec.issue("a@x.com", claim_set(1), 0).unwrap();
        assert!(codec.is_expired(&token).unwrap());

        let token = codec.issue("a@x.com", claim_set(1), -60).unwrap();
        assert!(codec.is_expired(&token).unwrap());
    }

    #[test]
    fn test_decode_does_not_reject_expired() {
        let codec = codec();
        let token = codec.issue("late@x.com", claim_set(7), -3600).unwrap();

        // Identity is still readable from an expired token
        let decoded = codec.decode(&token).unwrap();
        assert_eq!(decoded.sub, "late@x.com");
        assert!(decoded.is_expired());
    }

    #[test]
    fn test_wrong_key_fails() {
        let codec = codec();
        let other = JwtCodec::new(&"fedcba9876543210".repeat(4)).unwrap();

        let token = codec.issue("a@x.com", claim_set(1), 3600).unwrap();
        assert!(matches!(other.decode(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_tampered_token_fails() {
        let codec = codec();
        let token = codec.issue("a@x.com", claim_set(1), 3600).unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('A') { 'B' } else { 'A' });

        assert!(codec.decode(&tampered).is_err());
        assert!(codec.decode("garbage").is_err());
        assert!(codec.decode("a.b.c").is_err());
    }

    #[test]
    fn test_wrong_algorithm_rejected() {
        // Token signed with HS256 must not pass an HS512 codec
        let claims = Claims {
            sub: "a@x.com".into(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 3600,
            claims: claim_set(1),
        };
        let hs256 = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(test_secret().as_bytes()),
        )
        .unwrap();

        assert!(matches!(codec().decode(&hs256), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("Basic abc123"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("abc123"), None);
    }
}
