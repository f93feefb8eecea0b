use anyhow::Result;
use std::io::Write;

use super::print_json;
use crate::http::Transport;
use crate::notebook::{ExecutionClient, ExecutionSortField, QueryExecutionsRequest};

#[tracing::instrument(skip(client, out))]
pub async fn get<T: Transport, W: Write>(
    client: &ExecutionClient<T>,
    id: &str,
    out: &mut W,
) -> Result<()> {
    let execution = client.get_execution(id).await?;
    print_json(out, &execution)
}

#[tracing::instrument(skip(client, out))]
pub async fn query<T: Transport, W: Write>(
    client: &ExecutionClient<T>,
    filter: Option<String>,
    order_by: ExecutionSortField,
    descending: bool,
    projection: Vec<String>,
    out: &mut W,
) -> Result<()> {
    let request = QueryExecutionsRequest {
        filter,
        order_by,
        descending,
        projection,
    };
    let executions = client.query_executions(&request).await?;
    print_json(out, &executions)
}
