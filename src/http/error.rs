//! Typed failures raised by the HTTP layer and the response decoders.

use reqwest::StatusCode;

/// Errors surfaced to callers of the service clients.
///
/// These travel inside `anyhow::Error` and are recovered with
/// `downcast_ref::<ClientError>()`.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The server answered with a non-2xx status.
    Transport { status: u16, body: String },
    /// No response was received (connect, TLS, timeout).
    Network(String),
    /// Single-item lookup or delete against a missing id (HTTP 404).
    NotFound { path: String },
    /// The response violated the expected shape or correlation contract.
    Protocol(String),
}

impl ClientError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Transport { status, .. } => Some(*status),
            ClientError::NotFound { .. } => Some(StatusCode::NOT_FOUND.as_u16()),
            ClientError::Network(_) | ClientError::Protocol(_) => None,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        ClientError::Protocol(message.into())
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Transport { status, body } => {
                if body.is_empty() {
                    write!(f, "HTTP {} error", status)
                } else {
                    write!(f, "HTTP {} error: {}", status, body)
                }
            }
            ClientError::Network(msg) => write!(f, "Request failed: {}", msg),
            ClientError::NotFound { path } => write!(f, "Not found: {}", path),
            ClientError::Protocol(msg) => write!(f, "Unexpected response from server: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

/// Returns the HTTP status of a failure if it carries a typed [`ClientError`].
pub fn status_of(error: &anyhow::Error) -> Option<u16> {
    error.downcast_ref::<ClientError>().and_then(ClientError::status)
}

/// Turns a 404 transport failure into [`ClientError::NotFound`] for `path`.
/// Every other error passes through untouched.
pub fn not_found_on_404(error: anyhow::Error, path: &str) -> anyhow::Error {
    match error.downcast_ref::<ClientError>() {
        Some(ClientError::Transport { status, .. })
            if *status == StatusCode::NOT_FOUND.as_u16() =>
        {
            anyhow::Error::from(ClientError::NotFound {
                path: path.to_string(),
            })
        }
        _ => error,
    }
}
