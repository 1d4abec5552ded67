use thiserror::Error;

/// Errors surfaced by the client library.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level HTTP failure (connection refused, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Live-channel transport failure.
    #[error("Live channel error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    /// An operation that needs an open conversation was called without one.
    #[error("No conversation selected")]
    NoPeerSelected,
}
