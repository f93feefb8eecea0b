//! Connection settings for a SystemLink server.

use anyhow::{Context, Result, bail};
use log::debug;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue},
};
use std::time::Duration;

use crate::runtime::Runtime;

/// Environment variable holding the server base URI.
pub const SERVER_URI_ENV: &str = "SYSTEMLINK_SERVER_URI";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "SYSTEMLINK_API_KEY";

/// Header the services read the API key from.
pub const API_KEY_HEADER: &str = "x-ni-api-key";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Which server to talk to and how to authenticate.
#[derive(Clone, PartialEq)]
pub struct HttpConfiguration {
    server_uri: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConfiguration")
            .field("server_uri", &self.server_uri)
            .field("api_key", &self.api_key.as_deref().map(mask_secret))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpConfiguration {
    /// `server_uri` must be an absolute http(s) URL.
    pub fn new(server_uri: impl Into<String>) -> Result<Self> {
        let server_uri = server_uri.into();
        if !server_uri.starts_with("http://") && !server_uri.starts_with("https://") {
            bail!(
                "Server URI must start with http:// or https://, got: {}",
                server_uri
            );
        }

        Ok(Self {
            server_uri: server_uri.trim_end_matches('/').to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads the server URI and optional API key from the environment.
    pub fn from_runtime<R: Runtime>(runtime: &R) -> Result<Self> {
        let server_uri = runtime
            .env_var(SERVER_URI_ENV)
            .with_context(|| format!("{} is not set", SERVER_URI_ENV))?;

        let config = Self::new(server_uri)?;
        match runtime.env_var(API_KEY_ENV) {
            Ok(key) if !key.is_empty() => Ok(config.with_api_key(key)),
            _ => Ok(config),
        }
    }

    pub fn server_uri(&self) -> &str {
        &self.server_uri
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Base URL of one service, e.g. `service_url("/nitestmonitor/v2/")`.
    pub fn service_url(&self, base_path: &str) -> String {
        format!("{}/{}", self.server_uri, base_path.trim_matches('/'))
    }

    /// Builds a reqwest client that sends the API key on every request.
    pub fn build_client(&self) -> Result<Client> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.api_key {
            let mut value =
                HeaderValue::from_str(key).context("API key is not a valid header value")?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
            debug!("Using API key for authentication: {}", mask_secret(key));
        }

        let client = Client::builder()
            .user_agent(concat!("systemlink/", env!("SYSTEMLINK_VERSION")))
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(client)
    }
}

/// Shows only the edges of a secret: `abcd*********wxyz`.
fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "*********".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}
