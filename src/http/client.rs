//! reqwest-backed [`Transport`] rooted at one service base URL.

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method};
use serde_json::Value;

use super::error::ClientError;
use super::transport::{Transport, TransportResponse};
use crate::config::HttpConfiguration;

/// HTTP client bound to a service base URL such as
/// `https://server/nitestmonitor/v2`.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Builds the reqwest client from `config` and roots it at `base_path`.
    pub fn from_config(config: &HttpConfiguration, base_path: &str) -> Result<Self> {
        let client = config.build_client()?;
        Ok(Self::new(client, config.service_url(base_path)))
    }

    /// Returns a reference to the underlying reqwest Client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpClient {
    #[tracing::instrument(skip(self, query, body))]
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
    ) -> Result<TransportResponse> {
        let url = self.url(path);
        debug!("{} {} with query {:?}...", method, url, query);

        let mut request = self.client.request(method, &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("{}: {}", url, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Network(format!("{}: {}", url, e)))?;

        if !status.is_success() {
            debug!("{} returned HTTP {}", url, status.as_u16());
            return Err(ClientError::Transport {
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        let body = if text.trim().is_empty() {
            None
        } else {
            let value = serde_json::from_str(&text)
                .map_err(|e| ClientError::Protocol(format!("invalid JSON from {}: {}", url, e)))?;
            Some(value)
        };

        Ok(TransportResponse::new(status.as_u16(), body))
    }
}
