//! Route table and navigation guard.
//!
//! [`decide`] is the pure decision over a route's flags and the current
//! authentication status. [`NavigationGuard`] wraps it, restoring the session
//! first so the very first navigation after a cold start sees the persisted
//! session.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::auth::SessionManager;

pub const HOME_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const REDIRECT_PARAM: &str = "redirect";

/// Per-route navigation requirements. Absent flags are `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub requires_guest: bool,
}

impl RouteMeta {
    pub const PUBLIC: RouteMeta = RouteMeta {
        requires_auth: false,
        requires_guest: false,
    };
    pub const AUTH: RouteMeta = RouteMeta {
        requires_auth: true,
        requires_guest: false,
    };
    pub const GUEST: RouteMeta = RouteMeta {
        requires_auth: false,
        requires_guest: true,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: &'static str,
    /// Segments starting with `:` capture a parameter
    pub pattern: &'static str,
    pub meta: RouteMeta,
}

pub fn default_routes() -> Vec<Route> {
    vec![
        Route {
            name: "home",
            pattern: "/",
            meta: RouteMeta::AUTH,
        },
        Route {
            name: "login",
            pattern: "/login",
            meta: RouteMeta::GUEST,
        },
        Route {
            name: "register",
            pattern: "/register",
            meta: RouteMeta::GUEST,
        },
        Route {
            name: "collection",
            pattern: "/collections/:collectionName",
            meta: RouteMeta::AUTH,
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub name: &'static str,
    pub meta: RouteMeta,
    pub params: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    /// Carries the originally requested path so login can return there
    RedirectToLogin { redirect: String },
    RedirectToHome,
}

impl GuardOutcome {
    /// Where the navigation should end up, given the requested path.
    pub fn location(&self, requested: &str) -> String {
        match self {
            GuardOutcome::Allow => requested.to_string(),
            GuardOutcome::RedirectToLogin { redirect } => format!(
                "{}?{}={}",
                LOGIN_PATH,
                REDIRECT_PARAM,
                urlencoding::encode(redirect)
            ),
            GuardOutcome::RedirectToHome => HOME_PATH.to_string(),
        }
    }
}

/// Decide a navigation from the target's flags and the authentication status.
pub fn decide(meta: RouteMeta, authenticated: bool, requested_path: &str) -> GuardOutcome {
    if meta.requires_auth && !authenticated {
        return GuardOutcome::RedirectToLogin {
            redirect: requested_path.to_string(),
        };
    }
    if meta.requires_guest && authenticated {
        return GuardOutcome::RedirectToHome;
    }
    GuardOutcome::Allow
}

/// Extract the post-login return path from a query string such as
/// `redirect=%2Fcollections%2Fproducts`. Only same-site absolute paths are
/// accepted.
pub fn return_path_from(query: &str) -> Option<String> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == REDIRECT_PARAM)
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|decoded| decoded.into_owned())
        .filter(|path| path.starts_with('/') && !path.starts_with("//"))
}

fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path, None),
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<Route>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(default_routes())
    }
}

impl Router {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Match a path (query string ignored) against the table.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch> {
        let (path, _) = split_path(path);
        let wanted = segments(path);

        self.routes.iter().find_map(|route| {
            let pattern = segments(route.pattern);
            if pattern.len() != wanted.len() {
                return None;
            }

            let mut params = HashMap::new();
            for (expected, actual) in pattern.iter().zip(&wanted) {
                if let Some(name) = expected.strip_prefix(':') {
                    let value = urlencoding::decode(actual).ok()?;
                    params.insert(name.to_string(), value.into_owned());
                } else if expected != actual {
                    return None;
                }
            }

            Some(RouteMatch {
                name: route.name,
                meta: route.meta,
                params,
            })
        })
    }

    /// Flags for a path. Unknown paths carry none.
    pub fn meta_for(&self, path: &str) -> RouteMeta {
        self.resolve(path).map(|m| m.meta).unwrap_or_default()
    }
}

/// Evaluated before every route transition.
pub struct NavigationGuard {
    router: Router,
    session: Arc<SessionManager>,
}

impl NavigationGuard {
    pub fn new(router: Router, session: Arc<SessionManager>) -> Self {
        Self { router, session }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub async fn before_each(&self, to: &str) -> GuardOutcome {
        let meta = self.router.meta_for(to);
        let authenticated = self.session.check_auth().await;
        let outcome = decide(meta, authenticated, to);
        debug!(path = to, authenticated, outcome = ?outcome, "Navigation guard");
        outcome
    }
}
