//! Retry-wrapped access to one service, shared by the resource clients.

use anyhow::Result;
use reqwest::Method;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::http::{ClientError, HttpClient, Transport, TransportResponse, not_found_on_404};
use crate::retry::RetryPolicy;

/// A [`Transport`] whose calls all go through one [`RetryPolicy`].
#[derive(Clone)]
pub struct ServiceClient<T = HttpClient> {
    transport: T,
    retry: RetryPolicy,
}

impl<T: Transport> ServiceClient<T> {
    pub fn new(transport: T, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Sends one request, retrying while the server throttles.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
    ) -> Result<TransportResponse> {
        let operation_name = format!("{} {}", method, path);
        self.retry
            .execute(&operation_name, || {
                self.transport
                    .request(method.clone(), path, query, body.clone())
            })
            .await
    }

    /// GETs a single resource; 404 becomes [`ClientError::NotFound`].
    pub async fn fetch<X: DeserializeOwned>(&self, path: &str) -> Result<X> {
        let response = self
            .send(Method::GET, path, &[], None)
            .await
            .map_err(|e| not_found_on_404(e, path))?;
        decode(require_body(response, path)?, path)
    }

    /// POSTs `body` and decodes the JSON answer.
    pub async fn post<B, X>(&self, path: &str, body: &B) -> Result<X>
    where
        B: Serialize + ?Sized,
        X: DeserializeOwned,
    {
        let response = self.send(Method::POST, path, &[], Some(encode(body)?)).await?;
        decode(require_body(response, path)?, path)
    }

    /// DELETEs a single resource; 404 becomes [`ClientError::NotFound`].
    pub async fn remove(&self, path: &str) -> Result<()> {
        self.send(Method::DELETE, path, &[], None)
            .await
            .map_err(|e| not_found_on_404(e, path))?;
        Ok(())
    }
}

pub(crate) fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value> {
    Ok(serde_json::to_value(body)?)
}

pub(crate) fn require_body(response: TransportResponse, path: &str) -> Result<Value> {
    response.body.ok_or_else(|| {
        ClientError::protocol(format!(
            "{} answered HTTP {} without a body",
            path, response.status
        ))
        .into()
    })
}

/// Decodes a response body. Shape mismatches, including enum values this
/// client does not know, are protocol errors.
pub(crate) fn decode<X: DeserializeOwned>(value: Value, what: &str) -> Result<X> {
    serde_json::from_value(value).map_err(|e| {
        ClientError::protocol(format!("could not decode response of {}: {}", what, e)).into()
    })
}

/// Removes `key` from a JSON object and decodes it. Missing or `null` is `None`.
pub(crate) fn take_field<X: DeserializeOwned>(body: &mut Value, key: &str) -> Result<Option<X>> {
    match body.get_mut(key).map(Value::take) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => decode(value, key).map(Some),
    }
}
