//! Compact signed bearer tokens.
//!
//! Format: `base64url(claims JSON) . base64url(sha256(claims JSON || secret))`.
//! Claims carry the user id, role, and issue/expiry timestamps. Verification
//! recomputes the signature over the decoded claims bytes, so any tampering
//! with either part invalidates the token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{Actor, Role, User};

/// Token verification failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("token signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i64,
    role: Role,
    iat: i64,
    exp: i64,
}

/// Mints and verifies bearer tokens with a shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: String,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Issue a token for the given user.
    pub fn mint(&self, user: &User) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        // Claims are a plain serde struct; serialization cannot fail.
        let body = serde_json::to_vec(&claims).unwrap_or_default();
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&body),
            self.sign(&body)
        )
    }

    /// Check signature and expiry, returning the authenticated actor.
    pub fn verify(&self, token: &str) -> Result<Actor, TokenError> {
        let (body_b64, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let body = URL_SAFE_NO_PAD
            .decode(body_b64)
            .map_err(|_| TokenError::Malformed)?;

        if self.sign(&body) != signature {
            return Err(TokenError::BadSignature);
        }

        let claims: Claims =
            serde_json::from_slice(&body).map_err(|_| TokenError::Malformed)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(Actor {
            user_id: claims.sub,
            role: claims.role,
        })
    }

    fn sign(&self, body: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(body);
        hasher.update(self.secret.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}
