pub mod batch;
pub mod commands;
pub mod config;
pub mod http;
pub mod notebook;
pub mod paging;
pub mod resource;
pub mod result;
pub mod retry;
pub mod runtime;
pub mod service;

pub use batch::{ItemError, PartialSuccess};
pub use config::HttpConfiguration;
pub use http::ClientError;
pub use notebook::{ExecutionClient, NotebookClient};
pub use paging::{PagedResult, Paginator};
pub use result::ResultClient;
pub use retry::RetryPolicy;
