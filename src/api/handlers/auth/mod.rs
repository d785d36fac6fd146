//! Authentication and authorization.
//!
//! Sessions are stateless HS256 bearer tokens minted by [`login::login`].
//! Two middlewares run in front of every route:
//!
//! 1. [`filter::authenticate`] turns a valid token into a request-scoped
//!    [`Principal`], re-reading the account from the store each time.
//! 2. [`policy::authorize`] checks the route's rule against that principal
//!    and answers 401 or 403 before any handler runs.
//!
//! ## Signing secret
//!
//! The HMAC secret is supplied base64-encoded and must decode to at least 32
//! bytes. Every instance behind a load balancer needs the same secret.
//!
//! > **Warning:** Rotating the secret invalidates all outstanding tokens.

pub mod filter;
pub mod login;
pub mod password;
pub mod policy;
pub mod principal;
mod state;
pub mod token;

pub use principal::Principal;
pub use state::{AuthConfig, AuthState, DEFAULT_TOKEN_TTL_MS, MIN_SECRET_BYTES, MIN_TOKEN_TTL_MS};
pub use token::{IssuedToken, TokenError, TokenService, VerifiedToken};
