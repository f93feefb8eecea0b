use anyhow::Result;
use futures_util::Stream;
use log::debug;

use super::models::{QueryResultValuesRequest, QueryResultsRequest, TestResult};
use crate::batch::PartialSuccess;
use crate::config::HttpConfiguration;
use crate::http::{HttpClient, Transport};
use crate::paging::{PageRequest, PagedResult, Paginator};
use crate::resource::{Resource, ResourceClient};
use crate::retry::RetryPolicy;

/// Base path of the test monitor service.
pub const BASE_PATH: &str = "/nitestmonitor/v2/";

impl Resource for TestResult {
    type Query = QueryResultsRequest;

    const COLLECTION: &'static str = "results";
    const QUERY_PATH: &'static str = "query-results";
    const UPDATE_PATH: &'static str = "update-results";
    const DELETE_MANY_PATH: &'static str = "delete-results";
}

/// Client for test results in the test monitor service.
#[derive(Clone)]
pub struct ResultClient<T = HttpClient> {
    resources: ResourceClient<TestResult, T>,
}

impl ResultClient<HttpClient> {
    /// Connects to the server in `config`, retrying throttled calls up to five
    /// times.
    pub fn new(config: &HttpConfiguration) -> Result<Self> {
        let transport = HttpClient::from_config(config, BASE_PATH)?;
        debug!("Result client rooted at {}", transport.base_url());
        Ok(Self::with_transport(transport, RetryPolicy::default()))
    }
}

impl<T: Transport> ResultClient<T> {
    pub fn with_transport(transport: T, retry: RetryPolicy) -> Self {
        Self {
            resources: ResourceClient::new(transport, retry),
        }
    }

    /// Creates results and reports per-result failures.
    pub async fn create_results(
        &self,
        results: Vec<TestResult>,
    ) -> Result<PartialSuccess<TestResult>> {
        self.resources.create(results).await
    }

    /// Reads one page of all results.
    pub async fn get_results_paged(
        &self,
        continuation_token: Option<&str>,
        take: Option<u32>,
        return_count: bool,
    ) -> Result<PagedResult<TestResult>> {
        self.resources
            .list_page(&PageRequest {
                continuation_token: continuation_token.map(str::to_string),
                take,
                return_count,
            })
            .await
    }

    pub async fn get_result(&self, id: &str) -> Result<TestResult> {
        self.resources.get(id).await
    }

    /// Runs one page of a result query.
    pub async fn query_results_paged(
        &self,
        query: &QueryResultsRequest,
    ) -> Result<PagedResult<TestResult>> {
        self.resources.query(query).await
    }

    /// Returns the values of `query.field` across the matching results.
    #[tracing::instrument(skip(self))]
    pub async fn query_result_values(
        &self,
        query: &QueryResultValuesRequest,
    ) -> Result<Vec<String>> {
        self.resources
            .service()
            .post("query-result-values", query)
            .await
    }

    /// Updates results matched by id. With `replace`, keywords and properties
    /// are overwritten instead of merged.
    pub async fn update_results(
        &self,
        results: Vec<TestResult>,
        replace: bool,
    ) -> Result<PartialSuccess<TestResult>> {
        self.resources.update(results, replace).await
    }

    pub async fn delete_result(&self, id: &str) -> Result<()> {
        self.resources.delete(id).await
    }

    /// `None` when every result was deleted.
    pub async fn delete_results(&self, ids: Vec<String>) -> Result<Option<PartialSuccess<String>>> {
        self.resources.delete_many(ids).await
    }

    /// Reads every result page by page.
    pub async fn all_results(&self, paginator: Paginator) -> Result<PagedResult<TestResult>> {
        self.resources.list_all(paginator).await
    }

    /// Runs `query` across all pages. Any paging fields already set on
    /// `query` are replaced by the paginator's.
    pub async fn query_all(
        &self,
        query: QueryResultsRequest,
        paginator: Paginator,
    ) -> Result<PagedResult<TestResult>> {
        self.resources.query_all(query, paginator).await
    }

    pub fn query_pages(
        &self,
        query: QueryResultsRequest,
        paginator: Paginator,
    ) -> impl Stream<Item = Result<PagedResult<TestResult>>> + '_ {
        self.resources.query_pages(query, paginator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ClientError;
    use crate::result::models::{ResultField, Status, StatusType};
    use futures_util::StreamExt;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client_for(server: &Server) -> ResultClient {
        let config = HttpConfiguration::new(server.url())
            .unwrap()
            .with_api_key("test-api-key");
        ResultClient::new(&config).unwrap()
    }

    fn result(program: &str) -> TestResult {
        TestResult {
            program_name: Some(program.to_string()),
            status: Some(Status::new(StatusType::Passed)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_results_partial_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/nitestmonitor/v2/results")
            .match_header("x-ni-api-key", "test-api-key")
            .match_body(Matcher::PartialJson(json!({
                "results": [{"programName": "A"}, {"programName": "B"}]
            })))
            .with_status(200)
            .with_body(
                json!({
                    "results": [{
                        "id": "r-1",
                        "programName": "A",
                        "status": {"statusType": "PASSED"}
                    }],
                    "failed": [{"programName": "B", "status": {"statusType": "PASSED"}}],
                    "error": {
                        "name": "Skyline.OneOrMoreErrorsOccurred",
                        "message": "One or more errors occurred.",
                        "innerErrors": [{
                            "name": "Skyline.TestMonitor.InvalidStatus",
                            "message": "Invalid status."
                        }]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let outcome = client
            .create_results(vec![result("A"), result("B")])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(outcome.succeeded.len(), 1);
        assert_eq!(outcome.succeeded[0].id.as_deref(), Some("r-1"));
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0.program_name.as_deref(), Some("B"));
        assert_eq!(outcome.failed[0].1.code, "Skyline.TestMonitor.InvalidStatus");
        assert_eq!(outcome.error_summary.len(), 1);
    }

    #[tokio::test]
    async fn test_create_results_retries_throttling() {
        let mut server = Server::new_async().await;
        let throttled = server
            .mock("POST", "/nitestmonitor/v2/results")
            .with_status(429)
            .expect(5)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.create_results(vec![result("A")]).await.unwrap_err();

        throttled.assert_async().await;
        assert_eq!(crate::http::status_of(&err), Some(429));
    }

    #[tokio::test]
    async fn test_get_result_not_found() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/nitestmonitor/v2/results/missing-id")
            .with_status(404)
            .with_body(r#"{"error":{"name":"Skyline.TestMonitor.ResultNotFound"}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.get_result("missing-id").await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_results_paged_query_string() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/nitestmonitor/v2/results")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("take".into(), "2".into()),
                Matcher::UrlEncoded("returnCount".into(), "true".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "results": [{"id": "1"}, {"id": "2"}],
                    "continuationToken": "next",
                    "totalCount": 7
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let page = client.get_results_paged(None, Some(2), true).await.unwrap();

        mock.assert_async().await;
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.continuation_token.as_deref(), Some("next"));
        assert_eq!(page.total_count, Some(7));
    }

    #[tokio::test]
    async fn test_query_all_walks_pages() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("POST", "/nitestmonitor/v2/query-results")
            .match_body(Matcher::Json(json!({
                "filter": "operator == \"bob\"",
                "take": 2,
                "returnCount": true
            })))
            .with_status(200)
            .with_body(
                json!({
                    "results": [{"id": "1"}, {"id": "2"}],
                    "continuationToken": "T1",
                    "totalCount": 3
                })
                .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("POST", "/nitestmonitor/v2/query-results")
            .match_body(Matcher::Json(json!({
                "filter": "operator == \"bob\"",
                "take": 2,
                "continuationToken": "T1"
            })))
            .with_status(200)
            .with_body(json!({"results": [{"id": "3"}], "continuationToken": null}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let all = client
            .query_all(
                QueryResultsRequest::with_filter("operator == \"bob\""),
                Paginator::new(2).with_count(),
            )
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let ids: Vec<_> = all.items.iter().filter_map(|r| r.id.as_deref()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(all.total_count, Some(3));
    }

    #[tokio::test]
    async fn test_query_pages_stream() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/nitestmonitor/v2/query-results")
            .with_status(200)
            .with_body(json!({"results": [{"id": "1"}], "continuationToken": null}).to_string())
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let pages: Vec<_> = client
            .query_pages(QueryResultsRequest::default(), Paginator::server_default())
            .collect()
            .await;

        mock.assert_async().await;
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].as_ref().unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_query_result_values() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/nitestmonitor/v2/query-result-values")
            .match_body(Matcher::Json(json!({"field": "HOST_NAME", "startsWith": "lab"})))
            .with_status(200)
            .with_body(r#"["lab-01","lab-02"]"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let values = client
            .query_result_values(&QueryResultValuesRequest {
                field: Some(ResultField::HostName),
                starts_with: Some("lab".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(values, vec!["lab-01", "lab-02"]);
    }

    #[tokio::test]
    async fn test_update_results_sends_replace() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/nitestmonitor/v2/update-results")
            .match_body(Matcher::PartialJson(json!({
                "results": [{"id": "r-1", "keywords": ["rerun"]}],
                "replace": true
            })))
            .with_status(200)
            .with_body(
                json!({"results": [{"id": "r-1", "keywords": ["rerun"]}], "failed": []})
                    .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let update = TestResult {
            id: Some("r-1".to_string()),
            keywords: Some(vec!["rerun".to_string()]),
            ..Default::default()
        };
        let outcome = client.update_results(vec![update.clone()], true).await.unwrap();

        mock.assert_async().await;
        assert_eq!(outcome.succeeded, vec![update]);
        assert!(!outcome.has_failures());
    }

    #[tokio::test]
    async fn test_delete_result() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/nitestmonitor/v2/results/r-1")
            .with_status(204)
            .create_async()
            .await;

        let client = client_for(&server);
        client.delete_result("r-1").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_results_all_deleted() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/nitestmonitor/v2/delete-results")
            .match_body(Matcher::Json(json!({"ids": ["1", "2", "3"]})))
            .with_status(204)
            .create_async()
            .await;

        let client = client_for(&server);
        let outcome = client
            .delete_results(vec!["1".into(), "2".into(), "3".into()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_delete_results_partial() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/nitestmonitor/v2/delete-results")
            .with_status(200)
            .with_body(
                json!({
                    "ids": ["1"],
                    "failed": ["2"],
                    "error": {
                        "name": "Skyline.OneOrMoreErrorsOccurred",
                        "innerErrors": [{
                            "name": "Skyline.TestMonitor.ResultNotFound",
                            "message": "Result 2 not found.",
                            "resourceId": "2"
                        }]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let outcome = client
            .delete_results(vec!["1".into(), "2".into()])
            .await
            .unwrap()
            .unwrap();

        mock.assert_async().await;
        assert_eq!(outcome.succeeded, vec!["1".to_string()]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, "2");
        assert_eq!(outcome.failed[0].1.resource_id.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_unknown_status_is_protocol_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/nitestmonitor/v2/results/r-9")
            .with_status(200)
            .with_body(r#"{"id":"r-9","status":{"statusType":"MELTED"}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.get_result("r-9").await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::Protocol(_))
        ));
    }
}
