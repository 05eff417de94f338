//! The listing seam and page draining.

use crate::error::Result;
use crate::query::ListQuery;
use async_trait::async_trait;
use canopy_core::Item;
use std::time::Duration;
use tracing::debug;

/// One page of a folder listing.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Item>,

    /// Continuation token, `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Anything that can list the direct children of a remote folder.
///
/// Implementations must enforce their own per-request timeout and report
/// it as an error rather than hanging.
#[async_trait]
pub trait ListingService: Send + Sync {
    /// Fetches a single page for `query`, starting at `page_token`.
    async fn list_page(&self, query: &ListQuery, page_token: Option<&str>) -> Result<Page>;
}

/// Lists every child matching `query`, following continuation tokens
/// until the listing is exhausted.
///
/// `page_delay` is slept between pages, not before the first one.
pub async fn list_children<S>(
    service: &S,
    query: &ListQuery,
    page_delay: Duration,
) -> Result<Vec<Item>>
where
    S: ListingService + ?Sized,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = service.list_page(query, token.as_deref()).await?;
        pages += 1;
        items.extend(page.items);

        match page.next_page_token {
            Some(next) if !next.is_empty() => {
                token = Some(next);
                if !page_delay.is_zero() {
                    tokio::time::sleep(page_delay).await;
                }
            }
            _ => break,
        }
    }

    debug!(
        folder = %query.parent,
        pages,
        items = items.len(),
        "Listed folder"
    );
    Ok(items)
}
