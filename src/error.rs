use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Main error type for the Murmur relay service
#[derive(Debug)]
pub enum RelayError {
    /// Configuration or CLI argument errors
    Config(String),

    /// System I/O errors
    Io(std::io::Error),

    /// Serialization/deserialization errors
    Serialization(serde_json::Error),

    /// The event loop owning relay state is no longer running
    Hub(String),
}

/// Why a single connection's event did not produce a broadcast.
///
/// These never escape the relay: each one is either dropped silently or
/// turned into a private `error` notice for the sender.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// Payload was not an object with a non-empty string `text`
    MalformedInput,

    /// Message from a connection that is not registered
    UnregisteredSender,

    /// Admission window is exhausted for this connection
    RateLimitExceeded,

    /// Text is longer than the configured maximum
    MessageTooLong,

    /// Disconnect for a connection that never completed registration
    UnregisteredDisconnect,
}

impl Rejection {
    /// Notice sent back to the sender, if this rejection is sender-actionable
    pub fn user_message(&self, max_text_chars: usize) -> Option<String> {
        match self {
            Rejection::RateLimitExceeded => {
                Some("Message rate limit exceeded. Please wait.".to_string())
            }
            Rejection::MessageTooLong => Some(format!(
                "Message too long (max {} characters)",
                max_text_chars
            )),
            Rejection::MalformedInput
            | Rejection::UnregisteredSender
            | Rejection::UnregisteredDisconnect => None,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Rejection::MalformedInput => "malformed_input",
            Rejection::UnregisteredSender => "unregistered_sender",
            Rejection::RateLimitExceeded => "rate_limit_exceeded",
            Rejection::MessageTooLong => "message_too_long",
            Rejection::UnregisteredDisconnect => "unregistered_disconnect",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.error_type())
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Config(msg) => write!(f, "Configuration error: {}", msg),
            RelayError::Io(err) => write!(f, "I/O error: {}", err),
            RelayError::Serialization(err) => write!(f, "Serialization error: {}", err),
            RelayError::Hub(msg) => write!(f, "Hub error: {}", msg),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Io(err) => Some(err),
            RelayError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Config(_) => StatusCode::BAD_REQUEST,
            RelayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Hub(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            RelayError::Config(_) => "configuration_error",
            RelayError::Io(_) => "io_error",
            RelayError::Serialization(_) => "serialization_error",
            RelayError::Hub(_) => "hub_error",
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            RelayError::Config(msg) => format!("Configuration error: {}", msg),
            RelayError::Io(_) => "Internal server error. Please try again later.".to_string(),
            RelayError::Serialization(_) => "Data processing error.".to_string(),
            RelayError::Hub(_) => {
                "Service temporarily unavailable. Please try again later.".to_string()
            }
        }
    }
}

// Axum IntoResponse implementation for HTTP error responses
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_response = json!({
            "error": {
                "code": status_code.as_u16(),
                "message": self.user_message(),
                "type": self.error_type(),
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

// Conversions from common error types
impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::Io(err)
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization(err)
    }
}

impl From<std::net::AddrParseError> for RelayError {
    fn from(err: std::net::AddrParseError) -> Self {
        RelayError::Config(format!("Invalid listen address: {}", err))
    }
}

// Helper macros for common error construction patterns
#[macro_export]
macro_rules! hub_error {
    ($msg:expr) => {
        $crate::error::RelayError::Hub($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::RelayError::Hub(format!($fmt, $($arg)*))
    };
}
