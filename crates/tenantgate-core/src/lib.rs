//! Client-side session management for the property-management clients.
//!
//! - `auth`: token storage, the shared `Session`, and unverified claim inspection
//! - `api`: the `SessionGateway` that attaches bearer tokens and reacts to 401s
//! - `guard`: the navigation guard deciding between a route and the login page
//! - `config`: persisted client configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;

pub use api::{ErrorKind, GatewayError, LoginRequest, LoginResponse, SessionGateway};
pub use auth::{Session, SessionState, TokenInspector, TokenStore};
pub use config::Config;
pub use guard::{decide, GuardPolicy, NavigationDecision, NavigationGuard, Route, RouteTable};
