//! Error types for Cellar.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Common error type for Cellar.
#[derive(Error, Debug)]
pub enum CellarError {
    /// The request never produced an HTTP response (connect, DNS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    ///
    /// `message` and `code` are taken from the response body when the
    /// server provided them.
    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("request failed"))]
    Http {
        /// Response status code.
        status: u16,
        /// Human-readable message from the body, if any.
        message: Option<String>,
        /// Machine-readable discriminator from the body, if any.
        code: Option<String>,
    },

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for local input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The operation requires a logged-in session.
    #[error("not logged in")]
    NotLoggedIn,
}

impl CellarError {
    /// Build an HTTP error from a status and the raw response body.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let (message, code) = parse_error_body(body);
        CellarError::Http {
            status: status.as_u16(),
            message,
            code,
        }
    }

    /// HTTP status code, if this is an HTTP error.
    pub fn status(&self) -> Option<u16> {
        match self {
            CellarError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the server rejected the request with 403.
    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(StatusCode::FORBIDDEN.as_u16())
    }

    /// Check if the server rejected the request with 409.
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(StatusCode::CONFLICT.as_u16())
    }

    /// Message supplied by the server, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            CellarError::Http { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Discriminator supplied by the server, if any.
    ///
    /// Falls back to the message when the body carried no separate code.
    pub fn discriminator(&self) -> Option<&str> {
        match self {
            CellarError::Http { code, message, .. } => code.as_deref().or(message.as_deref()),
            _ => None,
        }
    }
}

/// Extract `(message, code)` from an error body.
///
/// Accepts `{"message": .., "code": ..}`, `{"error": {"message": .., "code": ..}}`,
/// a bare JSON string, or plain text.
fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, None);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => {
            let source = match map.get("error") {
                Some(Value::Object(inner)) => inner,
                _ => &map,
            };
            let field = |name: &str| {
                source
                    .get(name)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };
            let message = field("message").or_else(|| match map.get("error") {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                _ => None,
            });
            (message, field("code"))
        }
        Ok(Value::String(s)) => (Some(s), None),
        Ok(_) => (None, None),
        // Plain text; HTML error pages and long dumps are not messages.
        Err(_) if trimmed.starts_with('<') || trimmed.chars().count() > MAX_TEXT_MESSAGE => {
            (None, None)
        }
        Err(_) => (Some(trimmed.to_string()), None),
    }
}

/// Longest plain-text body accepted as a server message.
const MAX_TEXT_MESSAGE: usize = 200;

impl From<reqwest::Error> for CellarError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            CellarError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            CellarError::Http {
                status: status.as_u16(),
                message: None,
                code: None,
            }
        } else {
            CellarError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for CellarError {
    fn from(e: serde_json::Error) -> Self {
        CellarError::Decode(e.to_string())
    }
}

/// Result type alias for Cellar operations.
pub type Result<T> = std::result::Result<T, CellarError>;
