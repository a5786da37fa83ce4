//! Unverified decoding of bearer token claims.
//!
//! Tokens are treated as three dot-separated base64url segments. Only the
//! payload segment is read; signatures are never checked here.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

/// Default window for "expiring soon" checks.
pub const DEFAULT_EXPIRY_THRESHOLD_MINUTES: i64 = 5;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed token: expected 3 segments, got {segments}")]
    Malformed { segments: usize },

    #[error("Payload is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload is not a JSON object")]
    NotARecord,
}

/// Claims decoded from a token payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Expiry (`exp`) in seconds since epoch
    pub fn expires_at(&self) -> Option<i64> {
        self.numeric_date("exp")
    }

    /// Issue time (`iat`) in seconds since epoch
    pub fn issued_at(&self) -> Option<i64> {
        self.numeric_date("iat")
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    // NumericDate may carry a fractional part.
    fn numeric_date(&self, key: &str) -> Option<i64> {
        let value = self.0.get(key)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f.trunc() as i64))
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Decode the payload segment of a token without verifying it.
///
/// Failures are logged and returned; this never panics on bad input.
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    decode_payload(token).inspect_err(|e| warn!(error = %e, "Failed to decode token claims"))
}

fn decode_payload(token: &str) -> Result<Claims, DecodeError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 || segments[1].is_empty() {
        return Err(DecodeError::Malformed {
            segments: segments.len(),
        });
    }

    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(payload)?;
    match serde_json::from_slice::<Value>(&bytes)? {
        Value::Object(map) => Ok(Claims(map)),
        _ => Err(DecodeError::NotARecord),
    }
}

/// Source of wall-clock time, injectable for tests.
pub trait Clock: Send + Sync {
    /// Current Unix timestamp in seconds
    fn now_unix(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Reports token freshness from its `exp` claim.
///
/// Unparseable tokens and tokens without `exp` are reported as not expiring,
/// so a bad payload never forces a logout on its own.
#[derive(Debug, Clone, Default)]
pub struct TokenInspector<C: Clock = SystemClock> {
    clock: C,
}

impl TokenInspector<SystemClock> {
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl<C: Clock> TokenInspector<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// True iff the token has an `exp` and `exp - now < threshold`
    pub fn is_expiring_within(&self, token: &str, threshold: Duration) -> bool {
        match self.remaining_secs(token) {
            Some(remaining) => remaining < i128::from(threshold.num_seconds()),
            None => false,
        }
    }

    pub fn is_expired(&self, token: &str) -> bool {
        self.is_expiring_within(token, Duration::zero())
    }

    /// Time left until `exp`, negative once expired.
    ///
    /// Saturates at the largest span `Duration` can hold.
    pub fn expires_in(&self, token: &str) -> Option<Duration> {
        let remaining = self.remaining_secs(token)?;
        let clamped = remaining.clamp(-i128::from(MAX_DELTA_SECS), i128::from(MAX_DELTA_SECS));
        Duration::try_seconds(i64::try_from(clamped).ok()?)
    }

    // Widened so extreme `exp` values cannot overflow.
    fn remaining_secs(&self, token: &str) -> Option<i128> {
        let exp = decode(token).ok()?.expires_at()?;
        Some(i128::from(exp) - i128::from(self.clock.now_unix()))
    }
}

/// Largest whole-second span representable as a `Duration`.
const MAX_DELTA_SECS: i64 = i64::MAX / 1000;
