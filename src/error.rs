//! Error types for scriptwire-host.

use thiserror::Error;

/// Main error type for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// I/O error during pipe/socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol error (truncated payload, bad descriptor, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A payload would not fit the negotiated buffer size.
    #[error("Payload of {len} bytes exceeds maximum {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// The remote side never registered interest in this callback.
    #[error("Callback not registered: {0}")]
    UnknownCallback(String),

    /// Callback parameters do not match the registered signature.
    #[error("Signature mismatch for {name}: {reason}")]
    SignatureMismatch { name: String, reason: String },

    /// No native is bound to the given handle.
    #[error("No native for handle {0}")]
    NativeNotFound(i32),

    /// Connection closed or never established.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;
