//! Notebooks in the notebook service and their runs in the notebook
//! execution service.

mod client;
mod models;
mod notebooks;

pub use client::{BASE_PATH, ExecutionClient};
pub use models::{
    CreateExecutionRequest, Execution, ExecutionErrorCode, ExecutionField, ExecutionPriority,
    ExecutionResourceProfile, ExecutionSortField, ExecutionStatus, NotebookMetadata,
    QueriedExecution, QueriedReportSettings, QueriedSource, QueryExecutionsRequest,
    QueryNotebookRequest, ReportSettings, ReportType, Source, SourceType,
};
pub use notebooks::{NOTEBOOK_BASE_PATH, NotebookClient};
