use crate::{
    api::{
        self,
        handlers::auth::{AuthConfig, AuthState},
    },
    store::{SharedStore, memory::MemoryStore, postgres::PostgresStore, seed::seed},
};
use anyhow::{Context, Result, anyhow};
use base64ct::{Base64, Encoding};
use secrecy::{ExposeSecret, SecretSlice, SecretString};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub jwt_secret: SecretString,
    pub token_ttl_ms: u64,
    pub frontend_origin: String,
    pub skip_seed: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the signing secret is unusable, the database cannot be
/// reached, seeding fails, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let secret = decode_secret(&args.jwt_secret)?;
    let auth_config = AuthConfig::new(secret).with_token_ttl_ms(args.token_ttl_ms);
    let auth_state = Arc::new(AuthState::new(&auth_config)?);

    let store: SharedStore = if let Some(dsn) = &args.dsn {
        Arc::new(
            PostgresStore::connect(dsn)
                .await
                .context("Failed to connect to database")?,
        )
    } else {
        warn!("No database configured; records are kept in memory and lost on exit");
        Arc::new(MemoryStore::new())
    };

    if args.skip_seed {
        info!("Bootstrap seeding skipped");
    } else {
        let report = seed(store.as_ref()).await.context("Bootstrap seeding failed")?;
        if !report.users_created.is_empty() {
            info!(users = ?report.users_created, "Default accounts created");
        }
    }

    api::new(args.port, store, auth_state, &args.frontend_origin).await
}

/// Decode the base64 signing secret into raw key bytes.
fn decode_secret(encoded: &SecretString) -> Result<SecretSlice<u8>> {
    let bytes = Base64::decode_vec(encoded.expose_secret().trim())
        .map_err(|_| anyhow!("JWT secret must be valid base64"))?;
    Ok(SecretSlice::from(bytes))
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        (
            "store",
            args.dsn
                .as_deref()
                .map_or_else(|| "memory".to_string(), redact_dsn),
        ),
        ("token_ttl_ms", args.token_ttl_ms.to_string()),
        ("frontend_origin", args.frontend_origin.clone()),
        ("skip_seed", args.skip_seed.to_string()),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "roster {} - {}\n\n{title}:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> String {
    hash.trim().chars().take(7).collect()
}
