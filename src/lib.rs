//! # Roster (Student Records API)
//!
//! `roster` serves student and user records over a small REST API. Callers
//! authenticate once with a username and password and receive a signed bearer
//! token; every later request presents that token.
//!
//! ## Authentication
//!
//! Sessions are stateless HS256 JWTs carrying the username and role claims.
//! The server keeps no session table. On each request the token is verified
//! and the identity is re-read from the store, so disabling an account or
//! changing its roles takes effect on the next request even while older
//! tokens are still unexpired.
//!
//! ## Authorization
//!
//! Access is role based (`ROLE_ADMIN`, `ROLE_TEACHER`) and decided by a fixed
//! rule table keyed on HTTP method and path prefix. Missing or invalid
//! credentials return `401 Unauthorized`; a valid identity without a matching
//! role returns `403 Forbidden`.

pub mod api;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
