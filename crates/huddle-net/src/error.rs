use thiserror::Error;

/// Errors produced by the network layer.
#[derive(Error, Debug)]
pub enum NetError {
    /// Connection, timeout or other transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Protocol-level error (malformed push envelope, bad frame).
    #[error("Protocol error: {0}")]
    Protocol(#[from] huddle_shared::ProtocolError),

    /// Invalid endpoint configuration.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NetError>;
