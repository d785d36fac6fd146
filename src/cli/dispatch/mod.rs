//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action the binary executes.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_DSN, ARG_PORT, ARG_SKIP_SEED, auth};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .map(|dsn| dsn.trim().to_string())
        .filter(|dsn| !dsn.is_empty());
    let skip_seed = matches.get_flag(ARG_SKIP_SEED);

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret: auth_opts.jwt_secret,
        token_ttl_ms: auth_opts.token_ttl_ms,
        frontend_origin: auth_opts.frontend_origin,
        skip_seed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn server_action_carries_configuration() {
        temp_env::with_vars(
            [
                ("ROSTER_JWT_SECRET", Some("c2VjcmV0")),
                ("ROSTER_DSN", Some("  ")),
                ("ROSTER_PORT", None),
                ("ROSTER_SKIP_SEED", None),
                ("ROSTER_JWT_EXPIRATION_MS", Some("1000")),
                ("ROSTER_FRONTEND_ORIGIN", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["roster"]);
                let Ok(Action::Server(args)) = handler(&matches) else {
                    panic!("expected a server action");
                };
                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn, None);
                assert!(!args.skip_seed);
                assert_eq!(args.token_ttl_ms, 1000);
                assert_eq!(args.frontend_origin, "http://localhost:3000");
                assert_eq!(args.jwt_secret.expose_secret(), "c2VjcmV0");
            },
        );
    }

    #[test]
    fn debug_output_hides_secret() {
        temp_env::with_vars([("ROSTER_JWT_SECRET", Some("c2VjcmV0"))], || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["roster"]);
            let rendered = format!("{:?}", handler(&matches).ok());
            assert!(rendered.contains("Server"));
            assert!(!rendered.contains("c2VjcmV0"));
        });
    }
}
