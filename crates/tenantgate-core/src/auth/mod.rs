//! Authentication module for managing the client session and its token.
//!
//! This module provides:
//! - `TokenStore`: Durable storage for a single bearer token (keychain, file, memory)
//! - `Session`: Shared session handle with the Anonymous/Authenticated lifecycle
//! - `TokenInspector`: Unverified claim decoding and expiry checks
//!
//! All surfaces share one storage key, `auth_token`.

pub mod claims;
pub mod session;
pub mod store;

pub use claims::{decode, Claims, Clock, DecodeError, SystemClock, TokenInspector};
pub use session::{Session, SessionState};
pub use store::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore, TOKEN_STORAGE_KEY};
