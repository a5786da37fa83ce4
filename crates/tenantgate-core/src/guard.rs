//! Route-level navigation guard.
//!
//! Routes carry a `requires_auth` flag. A protected route is only reachable
//! while a token is present; anything else goes back to the login route.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{Clock, Session, SystemClock, TokenInspector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "snake_case")]
pub enum NavigationDecision {
    Allow,
    RedirectToLogin,
}

/// Redirect iff the target requires auth and no token is present.
pub fn decide(requires_auth: bool, token_present: bool) -> NavigationDecision {
    if requires_auth && !token_present {
        NavigationDecision::RedirectToLogin
    } else {
        NavigationDecision::Allow
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub name: String,
    pub requires_auth: bool,
}

impl Route {
    pub fn public(path: &str, name: &str) -> Self {
        Self {
            path: normalize(path),
            name: name.to_string(),
            requires_auth: false,
        }
    }

    pub fn protected(path: &str, name: &str) -> Self {
        Self {
            path: normalize(path),
            name: name.to_string(),
            requires_auth: true,
        }
    }

    /// Exact match, or `path` is nested below this route
    fn matches(&self, path: &str) -> bool {
        path == self.path
            || (self.path != "/"
                && path.len() > self.path.len()
                && path.starts_with(&self.path)
                && path.as_bytes()[self.path.len()] == b'/')
    }
}

/// Strip query, fragment and trailing slash; ensure a leading slash.
fn normalize(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_matches('/');
    format!("/{}", trimmed)
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
    login_path: String,
}

impl RouteTable {
    pub fn new(login: Route) -> Self {
        let login_path = login.path.clone();
        Self {
            routes: vec![login],
            login_path,
        }
    }

    /// Login at `/` and the protected `/dashboard`, as in the resident app.
    pub fn community_default() -> Self {
        Self::new(Route::public("/", "login")).with_route(Route::protected("/dashboard", "dashboard"))
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Every registered route matching `path`, outermost first
    pub fn matched(&self, path: &str) -> Vec<&Route> {
        let path = normalize(path);
        let mut matched: Vec<&Route> = self.routes.iter().filter(|r| r.matches(&path)).collect();
        matched.sort_by_key(|r| r.path.len());
        matched
    }

    /// Most specific route for `path`
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        self.matched(path).pop()
    }

    /// Auth requirement inherited from any matched route
    pub fn requires_auth(&self, path: &str) -> bool {
        self.matched(path).iter().any(|r| r.requires_auth)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardPolicy {
    /// Token presence alone gates navigation
    #[default]
    PresenceOnly,
    /// Also treat an already-expired token as absent
    RejectExpired,
}

pub struct NavigationGuard<C: Clock = SystemClock> {
    session: Session,
    routes: RouteTable,
    policy: GuardPolicy,
    inspector: TokenInspector<C>,
}

impl NavigationGuard<SystemClock> {
    pub fn new(session: Session, routes: RouteTable) -> Self {
        Self::with_inspector(session, routes, TokenInspector::new())
    }
}

impl<C: Clock> NavigationGuard<C> {
    pub fn with_inspector(session: Session, routes: RouteTable, inspector: TokenInspector<C>) -> Self {
        Self {
            session,
            routes,
            policy: GuardPolicy::default(),
            inspector,
        }
    }

    pub fn with_policy(mut self, policy: GuardPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn login_path(&self) -> &str {
        self.routes.login_path()
    }

    pub fn check(&self, path: &str) -> NavigationDecision {
        if self.routes.resolve(path).is_none() {
            debug!(path = %path, "No route matched, redirecting to login");
            return NavigationDecision::RedirectToLogin;
        }

        let requires_auth = self.routes.requires_auth(path);
        let decision = decide(requires_auth, self.token_present());
        debug!(path = %path, requires_auth, ?decision, "Navigation checked");
        decision
    }

    fn token_present(&self) -> bool {
        match self.policy {
            GuardPolicy::PresenceOnly => self.session.has_token(),
            GuardPolicy::RejectExpired => match self.session.token() {
                Ok(Some(token)) => !self.inspector.is_expired(&token),
                Ok(None) => false,
                Err(e) => {
                    warn!(error = %e, "Failed to read token store, treating session as anonymous");
                    false
                }
            },
        }
    }
}
