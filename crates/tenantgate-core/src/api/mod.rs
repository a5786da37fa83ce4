//! REST API gateway module for the property-management backend.
//!
//! This module provides the `SessionGateway` for sending requests that carry
//! the session's bearer token, and `GatewayError` describing how they fail.
//!
//! A 401 response is the only signal that clears the stored token.

pub mod error;
pub mod gateway;

pub use error::{ErrorKind, GatewayError};
pub use gateway::{LoginRequest, LoginResponse, SessionGateway};
