//! Error handling for the camera client and viewer core

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network unreachable, timeout, malformed HTTP
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Camera returned an error payload for a known command
    #[error("Protocol error {code}: {message}")]
    Protocol { code: String, message: String },

    /// Session was evicted by the camera; caller must update() or connect()
    #[error("Session expired")]
    SessionExpired,

    /// No session established yet
    #[error("Not connected")]
    NotConnected,

    /// Capture did not complete within the polling budget
    #[error("Poll timed out after {waited_secs:.1}s")]
    PollTimeout { waited_secs: f64 },

    /// Metadata or response body malformed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Operation canceled before completion
    #[error("Canceled")]
    Canceled,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Map a camera error payload to the client taxonomy.
    ///
    /// Session eviction codes become `SessionExpired` so callers can
    /// distinguish "re-connect and retry" from hard protocol failures.
    pub fn from_protocol(code: &str, message: &str) -> Self {
        match code {
            "invalidSessionId" | "sessionNotFound" => Error::SessionExpired,
            _ => Error::Protocol {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }
}
