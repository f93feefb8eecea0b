//! Generic batch CRUD client for one resource type.
//!
//! Every call goes through the service's [`RetryPolicy`]. Batch calls return a
//! [`PartialSuccess`] and only raise on transport or protocol failures.

use anyhow::Result;
use futures_util::Stream;
use log::{debug, info};
use reqwest::Method;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::marker::PhantomData;

use crate::batch::{ApiErrorBody, BatchItem, PartialSuccess, RawBatchResponse, aggregate};
use crate::http::{HttpClient, Transport};
use crate::paging::{PageRequest, Pageable, PagedResult, Paginator};
use crate::retry::RetryPolicy;
use crate::service::{ServiceClient, decode, require_body, take_field};

/// Wire layout of a resource collection.
pub trait Resource:
    Serialize + DeserializeOwned + BatchItem + PartialEq + Clone + Send + Sync + 'static
{
    /// Body of the batch query endpoint.
    type Query: Serialize + Pageable + Clone + Send + Sync;

    /// Path segment of the collection, also the JSON key of item lists.
    const COLLECTION: &'static str;
    const QUERY_PATH: &'static str;
    const UPDATE_PATH: &'static str;
    const DELETE_MANY_PATH: &'static str;
}

#[derive(Debug, Clone, Serialize)]
struct DeleteManyRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Default, Deserialize)]
struct DeleteManyResponse {
    #[serde(default)]
    ids: Vec<String>,
    #[serde(default)]
    failed: Vec<String>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

/// create / get / query / update / delete for resource `R`.
pub struct ResourceClient<R, T = HttpClient> {
    service: ServiceClient<T>,
    _resource: PhantomData<fn() -> R>,
}

impl<R, T: Clone> Clone for ResourceClient<R, T> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            _resource: PhantomData,
        }
    }
}

impl<R: Resource, T: Transport> ResourceClient<R, T> {
    pub fn new(transport: T, retry: RetryPolicy) -> Self {
        Self {
            service: ServiceClient::new(transport, retry),
            _resource: PhantomData,
        }
    }

    pub fn service(&self) -> &ServiceClient<T> {
        &self.service
    }

    fn item_path(id: &str) -> String {
        format!("{}/{}", R::COLLECTION, id)
    }

    fn envelope(items: &[R]) -> Result<Map<String, Value>> {
        let mut body = Map::new();
        body.insert(R::COLLECTION.to_string(), serde_json::to_value(items)?);
        Ok(body)
    }

    async fn submit_batch(
        &self,
        path: &str,
        items: Vec<R>,
        body: Map<String, Value>,
    ) -> Result<PartialSuccess<R>> {
        let response = self
            .service
            .send(Method::POST, path, &[], Some(Value::Object(body)))
            .await?;
        let mut body = require_body(response, path)?;

        let succeeded: Vec<R> = take_field(&mut body, R::COLLECTION)?.unwrap_or_default();
        let failed: Vec<R> = take_field(&mut body, "failed")?.unwrap_or_default();
        let error: Option<ApiErrorBody> = take_field(&mut body, "error")?;

        aggregate(items, RawBatchResponse::new(succeeded, failed, error))
    }

    /// Creates `items`. Ids are assigned by the server and returned in
    /// `succeeded`.
    #[tracing::instrument(skip(self, items))]
    pub async fn create(&self, items: Vec<R>) -> Result<PartialSuccess<R>> {
        info!("Creating {} {}...", items.len(), R::COLLECTION);
        let body = Self::envelope(&items)?;
        self.submit_batch(R::COLLECTION, items, body).await
    }

    /// Fetches one item; a missing id is `ClientError::NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<R> {
        self.service.fetch(&Self::item_path(id)).await
    }

    /// Fetches one page through `GET {collection}`.
    #[tracing::instrument(skip(self))]
    pub async fn list_page(&self, page: &PageRequest) -> Result<PagedResult<R>> {
        let mut query = Vec::new();
        if let Some(token) = &page.continuation_token {
            query.push(("continuationToken".to_string(), token.clone()));
        }
        if let Some(take) = page.take {
            query.push(("take".to_string(), take.to_string()));
        }
        if page.return_count {
            query.push(("returnCount".to_string(), "true".to_string()));
        }

        let response = self
            .service
            .send(Method::GET, R::COLLECTION, &query, None)
            .await?;
        Self::decode_page(require_body(response, R::COLLECTION)?)
    }

    /// Runs one page of a query. Loop with [`Paginator`] or use
    /// [`query_all`](Self::query_all) for every page.
    #[tracing::instrument(skip(self, request))]
    pub async fn query(&self, request: &R::Query) -> Result<PagedResult<R>> {
        self.service
            .post::<_, Value>(R::QUERY_PATH, request)
            .await
            .and_then(Self::decode_page)
    }

    /// Updates `items`, matched by id. With `replace` the server overwrites
    /// collection fields such as keywords and properties instead of merging.
    #[tracing::instrument(skip(self, items))]
    pub async fn update(&self, items: Vec<R>, replace: bool) -> Result<PartialSuccess<R>> {
        info!(
            "Updating {} {} (replace: {})...",
            items.len(),
            R::COLLECTION,
            replace
        );
        let mut body = Self::envelope(&items)?;
        body.insert("replace".to_string(), Value::Bool(replace));
        self.submit_batch(R::UPDATE_PATH, items, body).await
    }

    /// Deletes one item; a missing id is `ClientError::NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.service.remove(&Self::item_path(id)).await
    }

    /// Deletes `ids`. `None` means every id was deleted.
    #[tracing::instrument(skip(self, ids))]
    pub async fn delete_many(&self, ids: Vec<String>) -> Result<Option<PartialSuccess<String>>> {
        info!("Deleting {} {}...", ids.len(), R::COLLECTION);
        let body = serde_json::to_value(DeleteManyRequest { ids: &ids })?;
        let response = self
            .service
            .send(Method::POST, R::DELETE_MANY_PATH, &[], Some(body))
            .await?;

        let Some(body) = response.body else {
            debug!("All {} deleted", R::COLLECTION);
            return Ok(None);
        };

        let parsed: DeleteManyResponse = decode(body, R::DELETE_MANY_PATH)?;
        let outcome = aggregate(
            ids,
            RawBatchResponse::new(parsed.ids, parsed.failed, parsed.error),
        )?;

        Ok(outcome.has_failures().then_some(outcome))
    }

    /// Walks every page of `GET {collection}`.
    pub async fn list_all(&self, paginator: Paginator) -> Result<PagedResult<R>> {
        paginator
            .collect(|page| async move { self.list_page(&page).await })
            .await
    }

    /// Walks every page of a query, starting from `request`.
    pub async fn query_all(
        &self,
        request: R::Query,
        paginator: Paginator,
    ) -> Result<PagedResult<R>> {
        paginator
            .collect(|page| {
                let mut request = request.clone();
                request.apply_page(&page);
                async move { self.query(&request).await }
            })
            .await
    }

    /// Streams the pages of a query; see [`Paginator::pages`].
    pub fn query_pages(
        &self,
        request: R::Query,
        paginator: Paginator,
    ) -> impl Stream<Item = Result<PagedResult<R>>> + '_ {
        paginator.pages(move |page| {
            let mut request = request.clone();
            request.apply_page(&page);
            async move { self.query(&request).await }
        })
    }

    fn decode_page(mut body: Value) -> Result<PagedResult<R>> {
        let items: Vec<R> = take_field(&mut body, R::COLLECTION)?.unwrap_or_default();
        let continuation_token: Option<String> = take_field(&mut body, "continuationToken")?;
        let total_count: Option<u64> = take_field(&mut body, "totalCount")?;

        Ok(PagedResult {
            items,
            continuation_token,
            total_count,
        })
    }
}
