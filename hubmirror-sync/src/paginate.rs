//! Sequential cursor pagination shared by the source reader and the sink index.

use std::future::Future;

use crate::error::{ApiError, SyncError};
use crate::source::Page;

/// Request pages until one comes back without a next cursor.
///
/// Each page depends on the previous response, so requests are strictly
/// sequential. Any failed page aborts the drain.
pub(crate) async fn drain_pages<T, F, Fut>(
    context: &str,
    mut fetch_page: F,
) -> Result<Vec<T>, SyncError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = fetch_page(cursor.clone())
            .await
            .map_err(|source| SyncError::Pagination {
                context: context.to_string(),
                page: pages + 1,
                source,
            })?;
        pages += 1;
        items.extend(page.items);

        match page.next {
            None => break,
            Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                return Err(SyncError::StuckCursor {
                    context: context.to_string(),
                    cursor: next,
                });
            }
            Some(next) => cursor = Some(next),
        }
    }

    tracing::debug!(context, pages, items = items.len(), "pagination drained");
    Ok(items)
}
