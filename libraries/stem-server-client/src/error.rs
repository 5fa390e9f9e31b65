//! Error types for the separation server client.

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when talking to the separation server.
#[derive(Error, Debug)]
pub enum ServerClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error response
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Invalid server URL
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse server response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// File not found for upload
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// File type the server does not accept
    #[error("Unsupported file type: {0} (allowed: mp3, wav, flac, ogg, m4a, aac)")]
    UnsupportedFileType(String),

    /// IO error during upload/download
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Server is offline or unreachable
    #[error("Server unreachable: {0}")]
    ServerUnreachable(String),
}

/// Result type for server client operations.
pub type Result<T> = std::result::Result<T, ServerClientError>;

/// Error body the server sends with non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl ServerClientError {
    /// Build a `ServerError` from a failed response
    ///
    /// Uses the `error` field of a JSON body when present, the raw text
    /// otherwise.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        ServerClientError::ServerError { status, message }
    }

    /// Map a send failure, separating unreachable servers
    pub(crate) fn from_send(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ServerClientError::ServerUnreachable(err.to_string())
        } else {
            ServerClientError::Request(err)
        }
    }
}
