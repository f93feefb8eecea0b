use anyhow::{Context, Result};
use futures_util::Stream;
use log::debug;
use serde_json::Value;

use super::models::{NotebookMetadata, QueryNotebookRequest};
use crate::config::HttpConfiguration;
use crate::http::{HttpClient, Transport};
use crate::paging::{Pageable, PagedResult, Paginator};
use crate::retry::RetryPolicy;
use crate::service::{ServiceClient, take_field};

/// Base path of the notebook service.
pub const NOTEBOOK_BASE_PATH: &str = "/ninotebook/v1/";

const NOTEBOOK: &str = "notebook";
const QUERY_NOTEBOOKS: &str = "notebook/query";

/// Client for notebook metadata.
#[derive(Clone)]
pub struct NotebookClient<T = HttpClient> {
    service: ServiceClient<T>,
}

impl NotebookClient<HttpClient> {
    pub fn new(config: &HttpConfiguration) -> Result<Self> {
        let transport = HttpClient::from_config(config, NOTEBOOK_BASE_PATH)?;
        debug!("Notebook client rooted at {}", transport.base_url());
        Ok(Self::with_transport(transport, RetryPolicy::default()))
    }
}

impl<T: Transport> NotebookClient<T> {
    pub fn with_transport(transport: T, retry: RetryPolicy) -> Self {
        Self {
            service: ServiceClient::new(transport, retry),
        }
    }

    fn notebook_path(id: &str) -> String {
        format!("{}/{}", NOTEBOOK, id)
    }

    /// Fetches the metadata of one notebook; a missing id is
    /// `ClientError::NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn get_notebook(&self, id: &str) -> Result<NotebookMetadata> {
        self.service.fetch(&Self::notebook_path(id)).await
    }

    /// Deletes a notebook; a missing id is `ClientError::NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn delete_notebook(&self, id: &str) -> Result<()> {
        self.service.remove(&Self::notebook_path(id)).await
    }

    /// Runs one page of a notebook query.
    #[tracing::instrument(skip(self))]
    pub async fn query_notebooks_paged(
        &self,
        query: &QueryNotebookRequest,
    ) -> Result<PagedResult<NotebookMetadata>> {
        let mut body: Value = self
            .service
            .post(QUERY_NOTEBOOKS, query)
            .await
            .context("Failed to query notebooks")?;

        let notebooks: Vec<NotebookMetadata> =
            take_field(&mut body, "notebooks")?.unwrap_or_default();
        let continuation_token: Option<String> = take_field(&mut body, "continuationToken")?;
        let total_count: Option<u64> = take_field(&mut body, "totalCount")?;

        Ok(PagedResult {
            items: notebooks,
            continuation_token,
            total_count,
        })
    }

    /// Walks every page of a notebook query, starting from `query`.
    pub async fn query_all(
        &self,
        query: QueryNotebookRequest,
        paginator: Paginator,
    ) -> Result<PagedResult<NotebookMetadata>> {
        paginator
            .collect(|page| {
                let mut query = query.clone();
                query.apply_page(&page);
                async move { self.query_notebooks_paged(&query).await }
            })
            .await
    }

    /// Streams the pages of a notebook query; see [`Paginator::pages`].
    pub fn query_pages(
        &self,
        query: QueryNotebookRequest,
        paginator: Paginator,
    ) -> impl Stream<Item = Result<PagedResult<NotebookMetadata>>> + '_ {
        paginator.pages(move |page| {
            let mut query = query.clone();
            query.apply_page(&page);
            async move { self.query_notebooks_paged(&query).await }
        })
    }
}
