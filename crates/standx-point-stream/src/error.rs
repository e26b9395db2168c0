/*
[INPUT]:  Error sources (dialing, auth handshake, frame decoding, writes, configuration)
[OUTPUT]: Structured error types with retry and misuse hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use thiserror::Error;

/// Main error type for the streaming client
#[derive(Error, Debug)]
pub enum StreamError {
    /// Every dial attempt in a bounded round failed
    #[error("Dial failed after {attempts} attempt(s): {message}")]
    Dial { attempts: u32, message: String },

    /// Auth handshake was rejected, timed out, or could not be signed
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// Inbound frame could not be decoded
    #[error("Failed to decode frame: {message}")]
    Decode { message: String },

    /// Write attempted while no socket is attached
    #[error("WebSocket not connected")]
    NotConnected,

    /// Underlying transport rejected an outbound frame
    #[error("WebSocket write failed: {0}")]
    Write(String),

    /// Some topics could not be re-sent after a (re)connect
    #[error(
        "Resubscribe failed for {} topic(s): {}",
        .failed.len(),
        describe_failures(.failed)
    )]
    Resubscribe { failed: Vec<(String, String)> },

    /// `open()` called while already open or connecting
    #[error("Stream client already open")]
    AlreadyOpen,

    /// Client lifetime has ended
    #[error("Stream client closed")]
    Closed,

    /// WebSocket protocol or handshake error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Inbound frame exceeded the configured limit
    #[error("Frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    /// Operation did not complete in time
    #[error("Timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    /// Check if the failure is transient and worth another connection attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StreamError::Dial { .. }
                | StreamError::Auth { .. }
                | StreamError::Decode { .. }
                | StreamError::NotConnected
                | StreamError::Write(_)
                | StreamError::Resubscribe { .. }
                | StreamError::WebSocket(_)
                | StreamError::FrameTooLarge { .. }
                | StreamError::Timeout { .. }
        )
    }

    /// Check if the error was caused by calling the API in the wrong state
    pub fn is_caller_misuse(&self) -> bool {
        matches!(self, StreamError::AlreadyOpen | StreamError::Closed)
    }

    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        matches!(self, StreamError::Auth { .. })
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        StreamError::Decode {
            message: message.into(),
        }
    }

    pub(crate) fn auth(message: impl Into<String>) -> Self {
        StreamError::Auth {
            message: message.into(),
        }
    }
}

fn describe_failures(failed: &[(String, String)]) -> String {
    failed
        .iter()
        .map(|(topic, reason)| format!("{topic} ({reason})"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for streaming operations
pub type Result<T> = std::result::Result<T, StreamError>;
