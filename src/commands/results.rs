use anyhow::Result;
use log::debug;
use std::io::Write;

use super::{print_json, report_batch};
use crate::http::Transport;
use crate::paging::Paginator;
use crate::result::{QueryResultValuesRequest, QueryResultsRequest, ResultClient, ResultField};

/// Paging flags shared by `results list` and `results query`.
#[derive(Debug, Clone, Default)]
pub struct PageOptions {
    pub take: Option<u32>,
    /// Follow continuation tokens until the last page.
    pub all: bool,
    pub count: bool,
}

impl PageOptions {
    fn paginator(&self) -> Paginator {
        let paginator = match self.take {
            Some(take) => Paginator::new(take),
            None => Paginator::server_default(),
        };
        if self.count {
            paginator.with_count()
        } else {
            paginator
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub filter: Option<String>,
    pub substitutions: Vec<String>,
    pub order_by: Option<ResultField>,
    pub descending: bool,
    pub page: PageOptions,
}

impl QueryOptions {
    fn request(&self) -> QueryResultsRequest {
        QueryResultsRequest {
            filter: self.filter.clone(),
            substitutions: (!self.substitutions.is_empty()).then(|| self.substitutions.clone()),
            order_by: self.order_by,
            descending: self.descending.then_some(true),
            take: self.page.take,
            return_count: self.page.count.then_some(true),
            ..Default::default()
        }
    }
}

#[tracing::instrument(skip(client, out))]
pub async fn list<T: Transport, W: Write>(
    client: &ResultClient<T>,
    options: &PageOptions,
    out: &mut W,
) -> Result<()> {
    let page = if options.all {
        client.all_results(options.paginator()).await?
    } else {
        client
            .get_results_paged(None, options.take, options.count)
            .await?
    };
    debug!("Listed {} results", page.items.len());
    print_json(out, &page)
}

#[tracing::instrument(skip(client, out))]
pub async fn get<T: Transport, W: Write>(
    client: &ResultClient<T>,
    id: &str,
    out: &mut W,
) -> Result<()> {
    let result = client.get_result(id).await?;
    print_json(out, &result)
}

#[tracing::instrument(skip(client, out))]
pub async fn query<T: Transport, W: Write>(
    client: &ResultClient<T>,
    options: &QueryOptions,
    out: &mut W,
) -> Result<()> {
    let request = options.request();
    let page = if options.page.all {
        client.query_all(request, options.page.paginator()).await?
    } else {
        client.query_results_paged(&request).await?
    };
    print_json(out, &page)
}

#[tracing::instrument(skip(client, out))]
pub async fn values<T: Transport, W: Write>(
    client: &ResultClient<T>,
    field: ResultField,
    filter: Option<String>,
    starts_with: Option<String>,
    out: &mut W,
) -> Result<()> {
    let request = QueryResultValuesRequest {
        filter,
        field: Some(field),
        starts_with,
        ..Default::default()
    };
    let values = client.query_result_values(&request).await?;
    print_json(out, &values)
}

/// Deletes one result, or many through the batch endpoint.
#[tracing::instrument(skip(client, out))]
pub async fn delete<T: Transport, W: Write>(
    client: &ResultClient<T>,
    ids: Vec<String>,
    out: &mut W,
) -> Result<()> {
    if let [id] = ids.as_slice() {
        client.delete_result(id).await?;
        return print_json(out, &ids);
    }

    match client.delete_results(ids.clone()).await? {
        None => print_json(out, &ids),
        Some(outcome) => report_batch(out, &outcome, "deletions"),
    }
}
