//! Continuation-token pagination.
//!
//! A walk starts with no token and keeps passing back the token from the
//! previous page until the server returns none. The total count is only
//! requested on the first page; later pages never ask for it again.

use anyhow::Result;
use futures_util::stream::{self, Stream, TryStreamExt};
use log::debug;
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::http::ClientError;

/// One page of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// `None` exactly when no further pages remain.
    pub continuation_token: Option<String>,
    pub total_count: Option<u64>,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, continuation_token: Option<String>) -> Self {
        Self {
            items,
            continuation_token,
            total_count: None,
        }
    }

    #[must_use]
    pub fn with_total_count(mut self, total_count: u64) -> Self {
        self.total_count = Some(total_count);
        self
    }

    pub fn has_more(&self) -> bool {
        self.continuation_token.is_some()
    }
}

/// Parameters handed to a page fetcher for one request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageRequest {
    pub continuation_token: Option<String>,
    pub take: Option<u32>,
    pub return_count: bool,
}

/// Query bodies that can carry [`PageRequest`] parameters.
pub trait Pageable {
    fn apply_page(&mut self, page: &PageRequest);
}

/// Drives page fetchers until the continuation token runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Paginator {
    page_size: Option<u32>,
    with_count: bool,
}

enum Walk {
    Start,
    Next(String),
    Done,
}

impl Paginator {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: Some(page_size),
            with_count: false,
        }
    }

    /// Leaves the page size to the server.
    pub fn server_default() -> Self {
        Self::default()
    }

    /// Asks for the total count on the first page.
    #[must_use]
    pub fn with_count(mut self) -> Self {
        self.with_count = true;
        self
    }

    pub fn page_size(&self) -> Option<u32> {
        self.page_size
    }

    fn first_request(&self) -> PageRequest {
        PageRequest {
            continuation_token: None,
            take: self.page_size,
            return_count: self.with_count,
        }
    }

    fn next_request(&self, token: String) -> PageRequest {
        PageRequest {
            continuation_token: Some(token),
            take: self.page_size,
            return_count: false,
        }
    }

    /// Lazily fetches pages. Each poll issues at most one request; dropping the
    /// stream stops the walk. A failed fetch is yielded once and ends the
    /// stream. Restart by calling `pages` again.
    pub fn pages<T, F, Fut>(self, fetch_page: F) -> impl Stream<Item = Result<PagedResult<T>>>
    where
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = Result<PagedResult<T>>>,
    {
        stream::try_unfold(
            (fetch_page, Walk::Start, 1usize),
            move |(mut fetch_page, walk, page_number)| async move {
                let request = match walk {
                    Walk::Start => self.first_request(),
                    Walk::Next(token) => self.next_request(token),
                    Walk::Done => return Ok(None),
                };

                debug!(
                    "Fetching page {} (take: {:?}, count: {})",
                    page_number, request.take, request.return_count
                );

                let sent_token = request.continuation_token.clone();
                let page = fetch_page(request).await?;

                if sent_token.is_some() && sent_token == page.continuation_token {
                    return Err(anyhow::Error::from(ClientError::protocol(format!(
                        "page {} returned the continuation token it was requested with",
                        page_number
                    ))));
                }

                let next = match &page.continuation_token {
                    Some(token) => Walk::Next(token.clone()),
                    None => Walk::Done,
                };

                Ok::<_, anyhow::Error>(Some((page, (fetch_page, next, page_number + 1))))
            },
        )
    }

    /// Fetches every page and concatenates the items in page order. A failed
    /// page discards everything fetched so far.
    pub async fn fetch_all<T, F, Fut>(self, fetch_page: F) -> Result<Vec<T>>
    where
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = Result<PagedResult<T>>>,
    {
        Ok(self.collect(fetch_page).await?.items)
    }

    /// Like [`fetch_all`](Self::fetch_all) but keeps the first page's total
    /// count.
    pub async fn collect<T, F, Fut>(self, fetch_page: F) -> Result<PagedResult<T>>
    where
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = Result<PagedResult<T>>>,
    {
        let (items, total_count, pages) = self
            .pages(fetch_page)
            .try_fold(
                (Vec::new(), None, 0usize),
                |(mut items, total_count, pages), page| async move {
                    // The first page's count is authoritative for the walk
                    let total_count = if pages == 0 { page.total_count } else { total_count };
                    items.extend(page.items);
                    Ok((items, total_count, pages + 1))
                },
            )
            .await?;

        debug!("Fetched {} items across {} pages", items.len(), pages);

        Ok(PagedResult {
            items,
            continuation_token: None,
            total_count,
        })
    }
}
