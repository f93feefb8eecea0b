//! Test results stored by the test monitor service.

mod client;
mod models;

pub use client::{BASE_PATH, ResultClient};
pub use models::{
    ComparisonType, QueryResultValuesRequest, QueryResultsRequest, ResultField, Status, StatusType,
    TestResult,
};
