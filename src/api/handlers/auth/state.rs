//! Auth state and configuration.

use anyhow::{Result, bail};
use secrecy::{ExposeSecret, SecretSlice};
use std::fmt;

use super::{password::hash_password, token::TokenService};

pub const DEFAULT_TOKEN_TTL_MS: u64 = 86_400_000;
pub const MIN_SECRET_BYTES: usize = 32;
/// Claims carry whole seconds; shorter lifetimes could expire on issue.
pub const MIN_TOKEN_TTL_MS: u64 = 1_000;

pub struct AuthConfig {
    jwt_secret: SecretSlice<u8>,
    token_ttl_ms: u64,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"***")
            .field("token_ttl_ms", &self.token_ttl_ms)
            .finish()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretSlice<u8>) -> Self {
        Self {
            jwt_secret,
            token_ttl_ms: DEFAULT_TOKEN_TTL_MS,
        }
    }

    #[must_use]
    pub fn with_token_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.token_ttl_ms = ttl_ms;
        self
    }

    #[must_use]
    pub fn token_ttl_ms(&self) -> u64 {
        self.token_ttl_ms
    }
}

/// Long-lived auth material shared by every request.
pub struct AuthState {
    tokens: TokenService,
    dummy_hash: String,
}

impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthState")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl AuthState {
    /// Build the signing keys and the hash used to equalize login timing.
    ///
    /// # Errors
    /// Returns an error if the secret is shorter than [`MIN_SECRET_BYTES`],
    /// the TTL is below [`MIN_TOKEN_TTL_MS`], or the dummy hash cannot be
    /// computed.
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let secret = config.jwt_secret.expose_secret();
        if secret.len() < MIN_SECRET_BYTES {
            bail!(
                "JWT secret must decode to at least {MIN_SECRET_BYTES} bytes, got {}",
                secret.len()
            );
        }
        if config.token_ttl_ms < MIN_TOKEN_TTL_MS {
            bail!(
                "JWT expiration must be at least {MIN_TOKEN_TTL_MS} ms, got {}",
                config.token_ttl_ms
            );
        }

        Ok(Self {
            tokens: TokenService::new(secret, config.token_ttl_ms),
            dummy_hash: hash_password("roster-login-timing-equalizer")?,
        })
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Valid hash that no real account uses; verified against when the
    /// username does not resolve.
    pub(super) fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }
}
