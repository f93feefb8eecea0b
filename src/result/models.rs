use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::batch::BatchItem;
use crate::paging::{PageRequest, Pageable};

/// Outcome of a test run as reported by the test monitor.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusType {
    Looping,
    Skipped,
    Custom,
    Done,
    Passed,
    Failed,
    Running,
    Waiting,
    Terminated,
    Errored,
    TimedOut,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub status_type: StatusType,
    /// Display name; required by the server for `CUSTOM`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_name: Option<String>,
}

impl Status {
    pub fn new(status_type: StatusType) -> Self {
        Self {
            status_type,
            status_name: None,
        }
    }

    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            status_type: StatusType::Custom,
            status_name: Some(name.into()),
        }
    }
}

/// A test result. Every field is optional so the same type serves create,
/// update and projected reads; `id` is assigned by the server.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time_in_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_table_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
}

impl BatchItem for TestResult {
    fn batch_id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Result fields usable for ordering and value queries.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultField {
    Id,
    StartedAt,
    UpdatedAt,
    ProgramName,
    SystemId,
    HostName,
    Operator,
    SerialNumber,
    PartNumber,
    Properties,
    TotalTimeInSeconds,
}

impl ResultField {
    pub const ALL: [ResultField; 11] = [
        ResultField::Id,
        ResultField::StartedAt,
        ResultField::UpdatedAt,
        ResultField::ProgramName,
        ResultField::SystemId,
        ResultField::HostName,
        ResultField::Operator,
        ResultField::SerialNumber,
        ResultField::PartNumber,
        ResultField::Properties,
        ResultField::TotalTimeInSeconds,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultField::Id => "ID",
            ResultField::StartedAt => "STARTED_AT",
            ResultField::UpdatedAt => "UPDATED_AT",
            ResultField::ProgramName => "PROGRAM_NAME",
            ResultField::SystemId => "SYSTEM_ID",
            ResultField::HostName => "HOST_NAME",
            ResultField::Operator => "OPERATOR",
            ResultField::SerialNumber => "SERIAL_NUMBER",
            ResultField::PartNumber => "PART_NUMBER",
            ResultField::Properties => "PROPERTIES",
            ResultField::TotalTimeInSeconds => "TOTAL_TIME_IN_SECONDS",
        }
    }
}

impl fmt::Display for ResultField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultField {
    type Err = anyhow::Error;

    /// Accepts the wire name in any case, with `-` or `_` separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        match Self::ALL.iter().find(|field| field.as_str() == normalized) {
            Some(field) => Ok(*field),
            None => bail!("Unknown result field: {}", s),
        }
    }
}

/// How ordered values are compared when sorting by a property.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonType {
    #[default]
    Default,
    Numeric,
    Lexicographic,
}

impl FromStr for ComparisonType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEFAULT" => Ok(ComparisonType::Default),
            "NUMERIC" => Ok(ComparisonType::Numeric),
            "LEXICOGRAPHIC" => Ok(ComparisonType::Lexicographic),
            _ => bail!("Unknown comparison type: {}", s),
        }
    }
}

/// Body of `POST query-results`.
///
/// `filter` and `product_filter` are Dynamic LINQ expressions passed through
/// unchanged; `@0`, `@1`, ... are replaced by the matching `substitutions`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryResultsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitutions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_substitutions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<ResultField>,
    /// Property name to sort by when `order_by` is `PROPERTIES`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by_comparison_type: Option<ComparisonType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_count: Option<bool>,
}

impl QueryResultsRequest {
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            filter: Some(filter.into()),
            ..Default::default()
        }
    }
}

impl Pageable for QueryResultsRequest {
    fn apply_page(&mut self, page: &PageRequest) {
        self.continuation_token = page.continuation_token.clone();
        if page.take.is_some() {
            self.take = page.take;
        }
        self.return_count = page.return_count.then_some(true);
    }
}

/// Body of `POST query-result-values`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryResultValuesRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitutions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<ResultField>,
    /// Case-sensitive prefix the returned values must start with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_with: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_wire_names() {
        let result = TestResult {
            status: Some(Status::new(StatusType::TimedOut)),
            program_name: Some("Functional Test".to_string()),
            total_time_in_seconds: Some(12.5),
            data_table_ids: Some(vec!["dt-1".to_string()]),
            ..Default::default()
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "status": {"statusType": "TIMED_OUT"},
                "programName": "Functional Test",
                "totalTimeInSeconds": 12.5,
                "dataTableIds": ["dt-1"]
            })
        );
    }

    #[test]
    fn test_unknown_status_type_fails() {
        let err = serde_json::from_value::<TestResult>(json!({
            "id": "1",
            "status": {"statusType": "EXPLODED"}
        }));
        assert!(err.is_err());
    }

    #[test]
    fn test_result_field_from_str() {
        assert_eq!("started-at".parse::<ResultField>().unwrap(), ResultField::StartedAt);
        assert_eq!(
            "TOTAL_TIME_IN_SECONDS".parse::<ResultField>().unwrap(),
            ResultField::TotalTimeInSeconds
        );
        assert!("color".parse::<ResultField>().is_err());
    }

    #[test]
    fn test_result_field_serializes_as_wire_name() {
        for field in ResultField::ALL {
            assert_eq!(serde_json::to_value(field).unwrap(), json!(field.as_str()));
        }
    }

    #[test]
    fn test_comparison_type_from_str() {
        assert_eq!("numeric".parse::<ComparisonType>().unwrap(), ComparisonType::Numeric);
        assert!("fuzzy".parse::<ComparisonType>().is_err());
    }

    #[test]
    fn test_query_request_pages() {
        let mut request = QueryResultsRequest {
            order_by: Some(ResultField::StartedAt),
            descending: Some(true),
            take: Some(50),
            ..QueryResultsRequest::with_filter("programName == @0")
        };

        request.apply_page(&PageRequest {
            continuation_token: None,
            take: None,
            return_count: true,
        });
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "filter": "programName == @0",
                "orderBy": "STARTED_AT",
                "descending": true,
                "take": 50,
                "returnCount": true
            })
        );

        request.apply_page(&PageRequest {
            continuation_token: Some("T1".to_string()),
            take: Some(10),
            return_count: false,
        });
        assert_eq!(request.continuation_token.as_deref(), Some("T1"));
        assert_eq!(request.take, Some(10));
        assert_eq!(request.return_count, None);
    }

    #[test]
    fn test_values_request_wire_names() {
        let request = QueryResultValuesRequest {
            field: Some(ResultField::SerialNumber),
            starts_with: Some("SN-".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"field": "SERIAL_NUMBER", "startsWith": "SN-"})
        );
    }
}
