//! Error types for video sessions and the detector adapter.

/// Failures of a channel's video session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Every transport variant failed to open or produce a first frame.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A single frame read failed. Transient.
    #[error("Read error: {0}")]
    Read(String),

    /// The stream ended and will never produce another frame.
    #[error("Stream closed: {0}")]
    Closed(String),

    /// The read-failure threshold was reached; the stream has been
    /// released and the owner must reconnect.
    #[error("Stream lost after {failures} consecutive read failures")]
    ReconnectRequired { failures: u32 },

    /// Reconnection was exhausted. Terminates the owning worker only.
    #[error("Fatal session error: {0}")]
    Fatal(String),

    #[error("Session cancelled")]
    Cancelled,
}

/// Failures of the detection model call.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("Detector request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to encode frame: {0}")]
    Encode(String),

    #[error("Detector task failed: {0}")]
    Internal(String),
}
