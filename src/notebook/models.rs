use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::batch::{ApiErrorBody, BatchItem};
use crate::paging::{PageRequest, Pageable};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    #[default]
    Manual,
    Triggered,
}

/// Who started an execution. Routine fields are set by the routine service.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routine_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType {
    #[default]
    NoReport,
    Html,
    Pdf,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReportSettings {
    pub format: ReportType,
    pub exclude_code: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionResourceProfile {
    #[default]
    Default,
    Low,
    Medium,
    High,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    InProgress,
    Queued,
    Failed,
    Succeeded,
    Canceled,
    TimedOut,
}

impl ExecutionStatus {
    /// Whether the execution has stopped and will not change status again.
    pub fn is_finished(&self) -> bool {
        !matches!(self, ExecutionStatus::InProgress | ExecutionStatus::Queued)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionErrorCode {
    NoError,
    NotebookError,
    NotebookTimeoutError,
    NotebookNotFoundError,
    NotebookResultTooBigError,
    NotPublishedError,
    OutOfMemoryError,
    UnknownError,
}

/// An execution of a Jupyter notebook.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: String,
    pub notebook_id: String,
    #[serde(rename = "orgId")]
    pub organization_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, Value>>,
    pub workspace_id: String,
    /// Seconds the execution may run once in progress; 0 is unlimited.
    pub timeout: i64,
    pub status: ExecutionStatus,
    pub queued_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    pub last_updated_timestamp: String,
    /// Set when `status` is `FAILED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    pub error_code: ExecutionErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    pub report_settings: ReportSettings,
    /// Set when `status` is `SUCCEEDED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BTreeMap<String, Value>>,
    pub source: Source,
    pub priority: ExecutionPriority,
    pub resource_profile: ExecutionResourceProfile,
    /// Only present on create; true when an earlier result was reused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_result: Option<bool>,
}

impl BatchItem for Execution {
    fn batch_id(&self) -> Option<&str> {
        Some(&self.notebook_id)
    }
}

/// Request to run a notebook.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateExecutionRequest {
    pub notebook_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, Value>>,
    pub workspace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
    /// Seconds an earlier result with the same parameters may be reused.
    /// 0 never reuses; -1 always reuses and fails when nothing can be reused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_cache_period: Option<i64>,
    pub source: Source,
    pub report_settings: ReportSettings,
    /// Echoed back as the `resourceId` of errors for this request. The
    /// server falls back to `notebook_id` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_requests_id: Option<String>,
    pub priority: ExecutionPriority,
    pub resource_profile: ExecutionResourceProfile,
}

impl CreateExecutionRequest {
    /// A manual, medium-priority execution without a report.
    pub fn new(notebook_id: impl Into<String>, workspace_id: impl Into<String>) -> Result<Self> {
        let request = Self {
            notebook_id: notebook_id.into(),
            parameters: None,
            workspace_id: workspace_id.into(),
            timeout: None,
            result_cache_period: None,
            source: Source::default(),
            report_settings: ReportSettings::default(),
            client_requests_id: None,
            priority: ExecutionPriority::default(),
            resource_profile: ExecutionResourceProfile::default(),
        };
        request.validate()?;
        Ok(request)
    }

    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, seconds: i64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_client_requests_id(mut self, id: impl Into<String>) -> Self {
        self.client_requests_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_report(mut self, format: ReportType, exclude_code: bool) -> Self {
        self.report_settings = ReportSettings {
            format,
            exclude_code,
        };
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: ExecutionPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.notebook_id.is_empty() {
            bail!("Execution request needs a notebook id");
        }
        if self.workspace_id.is_empty() {
            bail!(
                "Execution request for notebook {} needs a workspace id",
                self.notebook_id
            );
        }
        Ok(())
    }
}

impl BatchItem for CreateExecutionRequest {
    fn batch_id(&self) -> Option<&str> {
        Some(
            self.client_requests_id
                .as_deref()
                .unwrap_or(&self.notebook_id),
        )
    }

    /// Created executions only carry the notebook id.
    fn match_key(&self) -> Option<&str> {
        Some(&self.notebook_id)
    }
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct CreateExecutionsResponse {
    #[serde(default)]
    pub executions: Option<Vec<Execution>>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionSortField {
    NotebookId,
    ExecutionHash,
    Timeout,
    #[default]
    QueuedAt,
    StartedAt,
    CompletedAt,
    Status,
}

impl FromStr for ExecutionSortField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().replace('-', "_").to_ascii_uppercase().as_str() {
            "NOTEBOOK_ID" => Ok(ExecutionSortField::NotebookId),
            "EXECUTION_HASH" => Ok(ExecutionSortField::ExecutionHash),
            "TIMEOUT" => Ok(ExecutionSortField::Timeout),
            "QUEUED_AT" => Ok(ExecutionSortField::QueuedAt),
            "STARTED_AT" => Ok(ExecutionSortField::StartedAt),
            "COMPLETED_AT" => Ok(ExecutionSortField::CompletedAt),
            "STATUS" => Ok(ExecutionSortField::Status),
            _ => bail!("Unknown execution sort field: {}", s),
        }
    }
}

/// Execution properties that can be projected in a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionField {
    Id,
    NotebookId,
    OrganizationId,
    UserId,
    Parameters,
    WorkspaceId,
    Timeout,
    Status,
    QueuedAt,
    StartedAt,
    CompletedAt,
    LastUpdatedTimestamp,
    Exception,
    ErrorCode,
    ReportId,
    ReportSettings,
    Result,
    Source,
    Priority,
    ResourceProfile,
}

impl ExecutionField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionField::Id => "id",
            ExecutionField::NotebookId => "notebookId",
            ExecutionField::OrganizationId => "orgId",
            ExecutionField::UserId => "userId",
            ExecutionField::Parameters => "parameters",
            ExecutionField::WorkspaceId => "workspaceId",
            ExecutionField::Timeout => "timeout",
            ExecutionField::Status => "status",
            ExecutionField::QueuedAt => "queuedAt",
            ExecutionField::StartedAt => "startedAt",
            ExecutionField::CompletedAt => "completedAt",
            ExecutionField::LastUpdatedTimestamp => "lastUpdatedTimestamp",
            ExecutionField::Exception => "exception",
            ExecutionField::ErrorCode => "errorCode",
            ExecutionField::ReportId => "reportId",
            ExecutionField::ReportSettings => "reportSettings",
            ExecutionField::Result => "result",
            ExecutionField::Source => "source",
            ExecutionField::Priority => "priority",
            ExecutionField::ResourceProfile => "resourceProfile",
        }
    }
}

impl fmt::Display for ExecutionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ExecutionField> for String {
    fn from(field: ExecutionField) -> Self {
        field.as_str().to_string()
    }
}

/// Body of `POST query-executions`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryExecutionsRequest {
    /// Dynamic LINQ filter, passed through unchanged.
    pub filter: Option<String>,
    pub order_by: ExecutionSortField,
    pub descending: bool,
    /// Field names or nested paths such as `reportSettings.format`. Empty
    /// returns whole executions.
    pub projection: Vec<String>,
}

impl QueryExecutionsRequest {
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            filter: Some(filter.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn project(mut self, field: impl Into<String>) -> Self {
        self.projection.push(field.into());
        self
    }

    fn projection_expression(&self) -> Option<String> {
        if self.projection.is_empty() {
            None
        } else {
            Some(format!("new({})", self.projection.join(", ")))
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryExecutionsBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a str>,
    order_by: ExecutionSortField,
    descending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    projection: Option<String>,
}

impl Serialize for QueryExecutionsRequest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        QueryExecutionsBody {
            filter: self.filter.as_deref(),
            order_by: self.order_by,
            descending: self.descending,
            projection: self.projection_expression(),
        }
        .serialize(serializer)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueriedReportSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ReportType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_code: Option<bool>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueriedSource {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routine_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// An execution as returned by a query. Fields left out of the projection
/// are `None`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueriedExecution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebook_id: Option<String>,
    #[serde(rename = "orgId", default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExecutionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ExecutionErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_settings: Option<QueriedReportSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<QueriedSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<ExecutionPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_profile: Option<ExecutionResourceProfile>,
}

/// A notebook as stored by the notebook service. The file content is not
/// part of it.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NotebookMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Workspace id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, Value>>,
}

/// Body of `POST notebook/query`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryNotebookRequest {
    /// Dynamic LINQ filter, passed through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

impl QueryNotebookRequest {
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            filter: Some(filter.into()),
            ..Default::default()
        }
    }
}

/// The notebook query has no total count, so `return_count` is ignored.
impl Pageable for QueryNotebookRequest {
    fn apply_page(&mut self, page: &PageRequest) {
        self.continuation_token = page.continuation_token.clone();
        if page.take.is_some() {
            self.take = page.take;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_request_defaults() {
        let request = CreateExecutionRequest::new("nb-1", "ws-1")
            .unwrap()
            .with_parameter("serial", "SN-42")
            .with_timeout(300);

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "notebookId": "nb-1",
                "parameters": {"serial": "SN-42"},
                "workspaceId": "ws-1",
                "timeout": 300,
                "source": {"type": "MANUAL"},
                "reportSettings": {"format": "NO_REPORT", "excludeCode": false},
                "priority": "MEDIUM",
                "resourceProfile": "DEFAULT"
            })
        );
    }

    #[test]
    fn test_create_request_requires_ids() {
        assert!(CreateExecutionRequest::new("", "ws-1").is_err());
        assert!(CreateExecutionRequest::new("nb-1", "").is_err());
    }

    #[test]
    fn test_create_request_batch_id_prefers_client_id() {
        let request = CreateExecutionRequest::new("nb-1", "ws-1").unwrap();
        assert_eq!(request.batch_id(), Some("nb-1"));

        let request = request.with_client_requests_id("req-7");
        assert_eq!(request.batch_id(), Some("req-7"));
        assert_eq!(request.match_key(), Some("nb-1"));
    }

    #[test]
    fn test_query_projection_expression() {
        let request = QueryExecutionsRequest {
            order_by: ExecutionSortField::CompletedAt,
            descending: true,
            ..QueryExecutionsRequest::with_filter("status = \"FAILED\"")
        }
        .project(ExecutionField::Id)
        .project(ExecutionField::Status)
        .project("reportSettings.format");

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "filter": "status = \"FAILED\"",
                "orderBy": "COMPLETED_AT",
                "descending": true,
                "projection": "new(id, status, reportSettings.format)"
            })
        );
    }

    #[test]
    fn test_query_without_projection_omits_it() {
        let value = serde_json::to_value(QueryExecutionsRequest::default()).unwrap();
        assert_eq!(value, json!({"orderBy": "QUEUED_AT", "descending": false}));
    }

    #[test]
    fn test_execution_uses_org_id() {
        let execution: QueriedExecution =
            serde_json::from_value(json!({"id": "e-1", "orgId": "org-1"})).unwrap();
        assert_eq!(execution.organization_id.as_deref(), Some("org-1"));
        assert_eq!(execution.status, None);
    }

    #[test]
    fn test_sort_field_from_str() {
        assert_eq!(
            "completed-at".parse::<ExecutionSortField>().unwrap(),
            ExecutionSortField::CompletedAt
        );
        assert!("size".parse::<ExecutionSortField>().is_err());
    }

    #[test]
    fn test_notebook_query_applies_page() {
        let mut request = QueryNotebookRequest {
            take: Some(10),
            ..QueryNotebookRequest::with_filter("name.StartsWith(\"Daily\")")
        };
        request.apply_page(&PageRequest {
            continuation_token: Some("T1".to_string()),
            take: None,
            return_count: true,
        });

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "filter": "name.StartsWith(\"Daily\")",
                "take": 10,
                "continuationToken": "T1"
            })
        );
    }

    #[test]
    fn test_notebook_metadata_is_lenient() {
        let notebook: NotebookMetadata = serde_json::from_value(json!({
            "id": "nb-1",
            "name": "Daily.ipynb",
            "workspace": "ws-1",
            "properties": {"owner": "lab-3"},
            "parameters": {"serial": {"default": ""}}
        }))
        .unwrap();

        assert_eq!(notebook.name.as_deref(), Some("Daily.ipynb"));
        assert_eq!(
            notebook.properties.unwrap().get("owner").map(String::as_str),
            Some("lab-3")
        );
        assert_eq!(notebook.created_at, None);
    }

    #[test]
    fn test_status_finished() {
        assert!(!ExecutionStatus::Queued.is_finished());
        assert!(!ExecutionStatus::InProgress.is_finished());
        assert!(ExecutionStatus::TimedOut.is_finished());
    }
}
