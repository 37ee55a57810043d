use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default lifetime of an inter-node token
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum TokenError {
    /// Malformed, badly signed or expired; callers never learn which.
    #[error("Token rejected")]
    Rejected,
    #[error("Token lifetime of {0:?} does not fit an expiry timestamp")]
    Lifetime(Duration),
    #[error("Failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Claims carried by an inter-node token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterNodeClaims {
    /// Expiry as seconds since the Unix epoch
    pub exp: i64,
    /// Name of the node the token was issued for
    pub node: String,
}

/// Issues and verifies HS256-signed node-to-node tokens over a shared secret.
pub struct TokenAuthority {
    decoding: DecodingKey,
    encoding: EncodingKey,
    ttl: Duration,
}

impl TokenAuthority {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, node_name: &str) -> Result<String, TokenError> {
        self.issue_at(node_name, Utc::now())
    }

    pub fn issue_at(&self, node_name: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|ttl| now.timestamp().checked_add(ttl))
            .ok_or(TokenError::Lifetime(self.ttl))?;
        let claims = InterNodeClaims {
            exp,
            node: node_name.to_string(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<InterNodeClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Check signature and expiry against `now`.
    ///
    /// A token is valid strictly before its `exp` second; expiry is checked
    /// here rather than by jsonwebtoken so it runs against the given clock
    /// without leeway.
    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<InterNodeClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<InterNodeClaims>(token, &self.decoding, &validation).map_err(|e| {
            tracing::debug!(error = %e, "Inter-node token failed verification");
            TokenError::Rejected
        })?;

        if now.timestamp() >= data.claims.exp {
            tracing::debug!(
                node = %data.claims.node,
                exp = data.claims.exp,
                "Inter-node token expired"
            );
            return Err(TokenError::Rejected);
        }

        Ok(data.claims)
    }
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("ttl", &self.ttl)
            .finish()
    }
}
