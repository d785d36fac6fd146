use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::api::handlers::auth::DEFAULT_TOKEN_TTL_MS;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_JWT_EXPIRATION_MS: &str = "jwt-expiration-ms";
pub const ARG_FRONTEND_ORIGIN: &str = "frontend-origin";

#[derive(Debug)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub token_ttl_ms: u64,
    pub frontend_origin: String,
}

impl Options {
    /// Read the session and CORS settings from validated matches.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --jwt-secret")?;
        let token_ttl_ms = matches
            .get_one::<u64>(ARG_JWT_EXPIRATION_MS)
            .copied()
            .unwrap_or(DEFAULT_TOKEN_TTL_MS);
        let frontend_origin = matches
            .get_one::<String>(ARG_FRONTEND_ORIGIN)
            .cloned()
            .unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            jwt_secret,
            token_ttl_ms,
            frontend_origin,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Base64-encoded HMAC secret for session tokens (at least 32 bytes decoded)")
                .env("ROSTER_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_JWT_EXPIRATION_MS)
                .long(ARG_JWT_EXPIRATION_MS)
                .help("Session token lifetime in milliseconds (at least 1000)")
                .env("ROSTER_JWT_EXPIRATION_MS")
                .default_value("86400000")
                .value_parser(clap::value_parser!(u64).range(1_000..)),
        )
        .arg(
            Arg::new(ARG_FRONTEND_ORIGIN)
                .long(ARG_FRONTEND_ORIGIN)
                .help("Browser origin allowed by CORS")
                .env("ROSTER_FRONTEND_ORIGIN")
                .default_value("http://localhost:3000"),
        )
}
