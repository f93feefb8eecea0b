use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

/// Status and decoded JSON body of a successful (2xx) response.
/// `body` is `None` when the server sent no content.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl TransportResponse {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self { status, body }
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            body: None,
        }
    }
}

/// Performs one HTTP exchange against a service.
///
/// Non-2xx responses must be reported as `ClientError::Transport` carrying the
/// status code and raw body, so that retry and not-found handling can see them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
    ) -> Result<TransportResponse>;
}
