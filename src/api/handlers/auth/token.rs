//! Session token minting and verification.
//!
//! Tokens are compact HS256 JWS strings with `{sub, roles, iat, exp}` claims.
//! The algorithm is fixed here and never read from the token header, and
//! expiry is checked against the caller-supplied clock with zero leeway so
//! a token is dead at the exact second `exp` is reached.

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;

use crate::store::Role;

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token is malformed")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token algorithm is not supported")]
    Unsupported,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    roles: Vec<String>,
    iat: i64,
    exp: i64,
}

/// A freshly minted token and its lifetime.
#[derive(Clone, Debug)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in_ms: u64,
    pub expires_at: DateTime<Utc>,
}

/// Claims recovered from a token that passed signature and expiry checks.
///
/// `roles` reflects what was true at issue time only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedToken {
    pub username: String,
    pub roles: Vec<Role>,
    pub issued_at: i64,
    pub expires_at: i64,
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_ms: u64,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &ALGORITHM)
            .field("ttl_ms", &self.ttl_ms)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &[u8], ttl_ms: u64) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        // Expiry is compared against the injected clock in `verify`.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl_ms,
        }
    }

    #[must_use]
    pub const fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// Mint a token for `username` valid from `now` for the configured TTL.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if the TTL overflows or encoding fails.
    pub fn issue(
        &self,
        username: &str,
        roles: &[Role],
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let ttl = i64::try_from(self.ttl_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .ok_or_else(|| TokenError::Signing("token ttl out of range".to_string()))?;
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Signing("token expiry out of range".to_string()))?;

        // `exp` has whole-second precision; round up so a sub-second
        // remainder never lands the expiry at or before `now`.
        let exp = expires_at.timestamp() + i64::from(expires_at.timestamp_subsec_nanos() > 0);

        let claims = Claims {
            sub: username.to_string(),
            roles: roles.iter().map(|role| role.as_str().to_string()).collect(),
            iat: now.timestamp(),
            exp,
        };

        let token = jsonwebtoken::encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_in_ms: self.ttl_ms,
            expires_at,
        })
    }

    /// Check signature, algorithm and expiry of `token` at instant `now`.
    ///
    /// # Errors
    /// Returns the `TokenError` variant describing the first failed check.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedToken, TokenError> {
        let header = jsonwebtoken::decode_header(token).map_err(|_| TokenError::Malformed)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::Unsupported);
        }

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    TokenError::Unsupported
                }
                _ => TokenError::Malformed,
            })?;
        let claims = data.claims;

        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        let roles = claims
            .roles
            .iter()
            .filter_map(|label| match label.parse::<Role>() {
                Ok(role) => Some(role),
                Err(err) => {
                    warn!("Ignoring role claim: {err}");
                    None
                }
            })
            .collect();

        Ok(VerifiedToken {
            username: claims.sub,
            roles,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }
}
