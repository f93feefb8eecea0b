use anyhow::Result;
use log::debug;
use std::io::Write;

use super::print_json;
use crate::http::Transport;
use crate::notebook::{NotebookClient, QueryNotebookRequest};
use crate::paging::Paginator;

#[tracing::instrument(skip(client, out))]
pub async fn get<T: Transport, W: Write>(
    client: &NotebookClient<T>,
    id: &str,
    out: &mut W,
) -> Result<()> {
    let notebook = client.get_notebook(id).await?;
    print_json(out, &notebook)
}

/// Prints one page of matching notebooks, or every page with `all`.
#[tracing::instrument(skip(client, out))]
pub async fn query<T: Transport, W: Write>(
    client: &NotebookClient<T>,
    filter: Option<String>,
    take: Option<u32>,
    all: bool,
    out: &mut W,
) -> Result<()> {
    let request = QueryNotebookRequest {
        filter,
        take,
        continuation_token: None,
    };
    let page = if all {
        let paginator = take.map_or_else(Paginator::server_default, Paginator::new);
        client.query_all(request, paginator).await?
    } else {
        client.query_notebooks_paged(&request).await?
    };
    debug!("Found {} notebooks", page.items.len());
    print_json(out, &page)
}

#[tracing::instrument(skip(client, out))]
pub async fn delete<T: Transport, W: Write>(
    client: &NotebookClient<T>,
    id: &str,
    out: &mut W,
) -> Result<()> {
    client.delete_notebook(id).await?;
    print_json(out, &[id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfiguration;
    use mockito::{Matcher, Server};
    use serde_json::{Value, json};

    fn client_for(server: &Server) -> NotebookClient {
        NotebookClient::new(&HttpConfiguration::new(server.url()).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_query_prints_one_page() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/ninotebook/v1/notebook/query")
            .match_body(Matcher::Json(json!({"filter": "name == \"A.ipynb\"", "take": 1})))
            .with_status(200)
            .with_body(r#"{"notebooks":[{"id":"nb-1","name":"A.ipynb"}],"continuationToken":"T1"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let mut out = Vec::new();
        query(
            &client,
            Some("name == \"A.ipynb\"".to_string()),
            Some(1),
            false,
            &mut out,
        )
        .await
        .unwrap();

        mock.assert_async().await;
        let printed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(printed["items"], json!([{"id": "nb-1", "name": "A.ipynb"}]));
        assert_eq!(printed["continuationToken"], json!("T1"));
    }

    #[tokio::test]
    async fn test_delete_missing_notebook() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/ninotebook/v1/notebook/nope")
            .with_status(404)
            .create_async()
            .await;

        let client = client_for(&server);
        let mut out = Vec::new();
        let err = delete(&client, "nope", &mut out).await.unwrap_err();

        assert_eq!(err.to_string(), "Not found: notebook/nope");
        assert!(out.is_empty());
    }
}
