use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Unauthorized - session cleared, please log in again")]
    Unauthorized,

    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Token store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Coarse failure classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 401; the session has already been cleared
    AuthRejection,
    Timeout,
    Network,
    /// Any other non-success status
    Status,
    InvalidResponse,
    Store,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl GatewayError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => GatewayError::Unauthorized,
            403 => GatewayError::AccessDenied(truncated),
            404 => GatewayError::NotFound(truncated),
            429 => GatewayError::RateLimited,
            500..=599 => GatewayError::ServerError(truncated),
            _ => GatewayError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(err)
        } else if err.is_decode() {
            GatewayError::InvalidResponse(err.to_string())
        } else {
            GatewayError::Network(err)
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Unauthorized => ErrorKind::AuthRejection,
            GatewayError::Timeout(_) => ErrorKind::Timeout,
            GatewayError::Network(_) => ErrorKind::Network,
            GatewayError::AccessDenied(_)
            | GatewayError::NotFound(_)
            | GatewayError::RateLimited
            | GatewayError::ServerError(_) => ErrorKind::Status,
            GatewayError::InvalidResponse(_) => ErrorKind::InvalidResponse,
            GatewayError::Store(_) => ErrorKind::Store,
        }
    }

    /// Whether the caller should send the user back to login
    pub fn is_auth_rejection(&self) -> bool {
        self.kind() == ErrorKind::AuthRejection
    }
}
