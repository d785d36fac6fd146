//! Route authorization.
//!
//! A fixed table maps `(method, path pattern)` to the access a route needs.
//! When several rules match, the most specific wins: a rule naming the
//! method beats a method wildcard, then the longer pattern beats the shorter.
//! Equal specificity resolves to the earlier entry. Requests no rule covers
//! only need an authenticated caller. `HEAD` runs the `GET` handler, so it
//! is held to the `GET` rule.

use axum::{
    extract::Request,
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::principal::Principal;
use crate::api::error::{AUTHENTICATION_REQUIRED, ApiError};
use crate::store::Role;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Other,
}

impl HttpVerb {
    #[must_use]
    pub fn from_method(method: &Method) -> Self {
        match *method {
            Method::GET => Self::Get,
            Method::POST => Self::Post,
            Method::PUT => Self::Put,
            Method::PATCH => Self::Patch,
            Method::DELETE => Self::Delete,
            Method::HEAD => Self::Head,
            Method::OPTIONS => Self::Options,
            _ => Self::Other,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodMatch {
    Any,
    Only(HttpVerb),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathPattern {
    Exact(&'static str),
    /// Matches the base itself and anything below it at a `/` boundary.
    Prefix(&'static str),
}

impl PathPattern {
    #[must_use]
    pub fn matches(self, path: &str) -> bool {
        match self {
            Self::Exact(expected) => path == expected,
            Self::Prefix(base) => path
                .strip_prefix(base)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
        }
    }

    const fn len(self) -> usize {
        match self {
            Self::Exact(p) | Self::Prefix(p) => p.len(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Public,
    Roles(&'static [Role]),
    Authenticated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rule {
    pub method: MethodMatch,
    pub pattern: PathPattern,
    pub access: Access,
}

impl Rule {
    fn matches(&self, verb: HttpVerb, path: &str) -> bool {
        let method_ok = match self.method {
            MethodMatch::Any => true,
            MethodMatch::Only(HttpVerb::Get) => matches!(verb, HttpVerb::Get | HttpVerb::Head),
            MethodMatch::Only(expected) => expected == verb,
        };
        method_ok && self.pattern.matches(path)
    }

    fn specificity(&self) -> (bool, usize) {
        (
            matches!(self.method, MethodMatch::Only(_)),
            self.pattern.len(),
        )
    }
}

const ADMIN: &[Role] = &[Role::Admin];
const STAFF: &[Role] = &[Role::Admin, Role::Teacher];

pub const RULES: &[Rule] = &[
    Rule {
        method: MethodMatch::Any,
        pattern: PathPattern::Prefix("/api/auth"),
        access: Access::Public,
    },
    Rule {
        method: MethodMatch::Any,
        pattern: PathPattern::Exact("/health"),
        access: Access::Public,
    },
    Rule {
        method: MethodMatch::Any,
        pattern: PathPattern::Exact("/api-docs/openapi.json"),
        access: Access::Public,
    },
    Rule {
        method: MethodMatch::Only(HttpVerb::Delete),
        pattern: PathPattern::Prefix("/api/students"),
        access: Access::Roles(ADMIN),
    },
    Rule {
        method: MethodMatch::Only(HttpVerb::Post),
        pattern: PathPattern::Prefix("/api/students"),
        access: Access::Roles(ADMIN),
    },
    Rule {
        method: MethodMatch::Only(HttpVerb::Get),
        pattern: PathPattern::Prefix("/api/students"),
        access: Access::Roles(STAFF),
    },
    Rule {
        method: MethodMatch::Only(HttpVerb::Put),
        pattern: PathPattern::Prefix("/api/students"),
        access: Access::Roles(STAFF),
    },
    Rule {
        method: MethodMatch::Any,
        pattern: PathPattern::Prefix("/api/users"),
        access: Access::Roles(ADMIN),
    },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Denial {
    Unauthenticated,
    Forbidden,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

/// Most specific rule of `rules` covering the request, if any.
#[must_use]
pub fn select_rule<'a>(rules: &'a [Rule], method: &Method, path: &str) -> Option<&'a Rule> {
    let verb = HttpVerb::from_method(method);
    rules
        .iter()
        .filter(|rule| rule.matches(verb, path))
        .fold(None, |best: Option<&Rule>, rule| match best {
            Some(current) if current.specificity() >= rule.specificity() => Some(current),
            _ => Some(rule),
        })
}

/// Access required for a request under the built-in table.
#[must_use]
pub fn required_access(method: &Method, path: &str) -> Access {
    select_rule(RULES, method, path).map_or(Access::Authenticated, |rule| rule.access)
}

/// Decide whether `principal` may perform `method` on `path`.
#[must_use]
pub fn evaluate(method: &Method, path: &str, principal: Option<&Principal>) -> Decision {
    match (required_access(method, path), principal) {
        (Access::Public, _) => Decision::Allow,
        (_, None) => Decision::Deny(Denial::Unauthenticated),
        (Access::Authenticated, Some(_)) => Decision::Allow,
        (Access::Roles(allowed), Some(principal)) => {
            if principal.has_any_role(allowed) {
                Decision::Allow
            } else {
                Decision::Deny(Denial::Forbidden)
            }
        }
    }
}

/// Middleware enforcing [`evaluate`] before any handler runs.
pub async fn authorize(request: Request, next: Next) -> Response {
    let decision = evaluate(
        request.method(),
        request.uri().path(),
        request.extensions().get::<Principal>(),
    );

    match decision {
        Decision::Allow => next.run(request).await,
        Decision::Deny(Denial::Unauthenticated) => {
            debug!(
                method = %request.method(),
                path = request.uri().path(),
                "Rejected unauthenticated request"
            );
            ApiError::Unauthenticated(AUTHENTICATION_REQUIRED).into_response()
        }
        Decision::Deny(Denial::Forbidden) => {
            debug!(
                method = %request.method(),
                path = request.uri().path(),
                "Rejected request lacking a permitted role"
            );
            ApiError::Forbidden.into_response()
        }
    }
}
