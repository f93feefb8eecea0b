use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::Method;

use super::models::{
    CreateExecutionRequest, CreateExecutionsResponse, Execution, QueriedExecution,
    QueryExecutionsRequest,
};
use crate::batch::{PartialSuccess, RawBatchResponse, aggregate};
use crate::config::HttpConfiguration;
use crate::http::{HttpClient, Transport};
use crate::retry::RetryPolicy;
use crate::service::{ServiceClient, decode, encode, require_body};

/// Base path of the notebook execution service.
pub const BASE_PATH: &str = "/ninbexecution/v1/";

const EXECUTIONS: &str = "executions";
const QUERY_EXECUTIONS: &str = "query-executions";

/// Client for notebook executions.
#[derive(Clone)]
pub struct ExecutionClient<T = HttpClient> {
    service: ServiceClient<T>,
}

impl ExecutionClient<HttpClient> {
    pub fn new(config: &HttpConfiguration) -> Result<Self> {
        let transport = HttpClient::from_config(config, BASE_PATH)?;
        debug!("Execution client rooted at {}", transport.base_url());
        Ok(Self::with_transport(transport, RetryPolicy::default()))
    }
}

impl<T: Transport> ExecutionClient<T> {
    pub fn with_transport(transport: T, retry: RetryPolicy) -> Self {
        Self {
            service: ServiceClient::new(transport, retry),
        }
    }

    /// Queues notebook executions. Each created execution is paired with
    /// the request that produced it; rejected requests land in `failed`.
    #[tracing::instrument(skip(self, requests))]
    pub async fn create_executions(
        &self,
        requests: Vec<CreateExecutionRequest>,
    ) -> Result<PartialSuccess<CreateExecutionRequest, Execution>> {
        for request in &requests {
            request.validate()?;
        }
        info!("Creating {} notebook executions...", requests.len());

        let body = encode(&requests)?;
        let response = self
            .service
            .send(Method::POST, EXECUTIONS, &[], Some(body))
            .await?;
        let parsed: CreateExecutionsResponse =
            decode(require_body(response, EXECUTIONS)?, EXECUTIONS)?;

        let executions = parsed.executions.unwrap_or_default();
        aggregate(requests, RawBatchResponse::new(executions, Vec::new(), parsed.error))
    }

    /// Fetches one execution; a missing id is `ClientError::NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn get_execution(&self, id: &str) -> Result<Execution> {
        self.service.fetch(&format!("{}/{}", EXECUTIONS, id)).await
    }

    /// Runs an execution query. The service answers with every match in one
    /// response.
    #[tracing::instrument(skip(self))]
    pub async fn query_executions(
        &self,
        query: &QueryExecutionsRequest,
    ) -> Result<Vec<QueriedExecution>> {
        self.service
            .post(QUERY_EXECUTIONS, query)
            .await
            .context("Failed to query notebook executions")
    }
}
