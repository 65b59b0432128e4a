/// Cursor-based pagination
///
/// A cursor is the id of the last document of the previous page. It is
/// resolved to the stored document and handed to the store as the
/// continuation point of a `createdAt`-descending query. A cursor that no
/// longer resolves restarts the walk from the beginning.
use crate::{
    error::AdminResult,
    store::{Collection, Direction, Document, EntityStore, Query},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub const DEFAULT_USER_PAGE: usize = 50;
pub const DEFAULT_POST_PAGE: usize = 50;
pub const DEFAULT_TASK_PAGE: usize = 50;
pub const DEFAULT_CATEGORY_PAGE: usize = 50;
pub const DEFAULT_AUDIT_PAGE: usize = 100;
pub const DEFAULT_COMMENT_PAGE: usize = 20;
pub const DEFAULT_FEED_PAGE: usize = 20;

/// Page request as received from a caller
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PageRequest {
    pub limit: Option<i64>,
    /// Id of the last item already seen
    #[serde(rename = "startAfter", alias = "after")]
    pub after: Option<String>,
}

impl PageRequest {
    pub fn new(limit: Option<i64>, after: Option<String>) -> Self {
        Self { limit, after }
    }

    pub fn first(limit: i64) -> Self {
        Self {
            limit: Some(limit),
            after: None,
        }
    }

    pub fn after(limit: i64, cursor: impl Into<String>) -> Self {
        Self {
            limit: Some(limit),
            after: Some(cursor.into()),
        }
    }

    /// Effective page size; zero, negative or missing limits fall back to the default
    pub fn page_size(&self, default: usize) -> usize {
        match self.limit {
            Some(limit) if limit > 0 => limit as usize,
            _ => default,
        }
    }

    fn cursor(&self) -> Option<&str> {
        self.after.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }
}

/// One page of results plus the cursor for the next one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Page<Document> {
    /// Decode every document of the page into a typed record
    pub fn decode<T: DeserializeOwned>(self) -> AdminResult<Page<T>> {
        let items = self
            .items
            .iter()
            .map(Document::decode)
            .collect::<AdminResult<Vec<T>>>()?;
        Ok(Page {
            items,
            next_cursor: self.next_cursor,
        })
    }
}

/// The id of the last item, but only when the page came back full
fn next_cursor<'a>(last_id: Option<&'a str>, returned: usize, page_size: usize) -> Option<String> {
    if returned == page_size {
        last_id.map(str::to_string)
    } else {
        None
    }
}

/// Page through a collection newest first
///
/// `base` may carry filters; ordering, limit and continuation are set here.
pub async fn list_page(
    store: &dyn EntityStore,
    collection: Collection,
    base: Query,
    order_field: &str,
    page: &PageRequest,
    default_size: usize,
) -> AdminResult<Page<Document>> {
    let size = page.page_size(default_size);
    let mut query = base.order_by(order_field, Direction::Descending).limit(size);

    if let Some(after) = page.cursor() {
        match store.get(collection, after).await? {
            Some(cursor) => query = query.start_after(cursor),
            None => {
                tracing::warn!(
                    "Cursor {} does not resolve in {}; starting from the beginning",
                    after,
                    collection
                );
            }
        }
    }

    let items = store.query(collection, &query).await?;
    let next_cursor = next_cursor(items.last().map(|d| d.id.as_str()), items.len(), size);

    Ok(Page { items, next_cursor })
}

/// Page through an already ordered in-memory sequence (embedded comments)
pub fn paginate_slice<T>(
    items: Vec<T>,
    id_of: impl Fn(&T) -> &str,
    page: &PageRequest,
    default_size: usize,
) -> Page<T> {
    let size = page.page_size(default_size);

    let start = match page.cursor() {
        Some(after) => match items.iter().position(|item| id_of(item) == after) {
            Some(index) => index + 1,
            None => {
                tracing::warn!("Cursor {} not found; starting from the beginning", after);
                0
            }
        },
        None => 0,
    };

    let items: Vec<T> = items.into_iter().skip(start).take(size).collect();
    let next_cursor = next_cursor(items.last().map(|item| id_of(item)), items.len(), size);

    Page { items, next_cursor }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{timestamp::format_timestamp, MemoryStore};
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use std::collections::HashSet;

    async fn seed(store: &MemoryStore, n: i64) {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        for i in 0..n {
            // Every third post shares a timestamp with its predecessor
            let ts = base + Duration::minutes(i - (i % 3 == 2) as i64);
            store
                .set(
                    Collection::Posts,
                    &format!("p{:03}", i),
                    json!({"createdAt": format_timestamp(&ts)})
                        .as_object()
                        .cloned()
                        .unwrap(),
                )
                .await
                .unwrap();
        }
    }

    #[test]
    fn test_page_size_defaults() {
        assert_eq!(PageRequest::default().page_size(50), 50);
        assert_eq!(PageRequest::first(0).page_size(50), 50);
        assert_eq!(PageRequest::first(-3).page_size(100), 100);
        assert_eq!(PageRequest::first(7).page_size(50), 7);
    }

    #[tokio::test]
    async fn test_walk_visits_each_item_once() {
        let store = MemoryStore::new();
        seed(&store, 23).await;

        for size in [1, 4, 5, 23, 50] {
            let mut seen = HashSet::new();
            let mut page = PageRequest::first(size);
            loop {
                let result = list_page(
                    &store,
                    Collection::Posts,
                    Query::new(),
                    "createdAt",
                    &page,
                    DEFAULT_POST_PAGE,
                )
                .await
                .unwrap();
                for doc in &result.items {
                    assert!(seen.insert(doc.id.clone()), "{} visited twice", doc.id);
                }
                match result.next_cursor {
                    Some(cursor) => page = PageRequest::after(size, cursor),
                    None => break,
                }
            }
            assert_eq!(seen.len(), 23);
        }
    }

    #[tokio::test]
    async fn test_stale_cursor_restarts() {
        let store = MemoryStore::new();
        seed(&store, 3).await;

        let page = list_page(
            &store,
            Collection::Posts,
            Query::new(),
            "createdAt",
            &PageRequest::after(10, "deleted-post"),
            DEFAULT_POST_PAGE,
        )
        .await
        .unwrap();

        assert_eq!(page.len(), 3);
        assert_eq!(page.items[0].id, "p002");
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_paginate_slice() {
        let items: Vec<String> = (0..5).map(|i| format!("c{}", i)).collect();

        let first = paginate_slice(items.clone(), |s| s.as_str(), &PageRequest::first(2), 20);
        assert_eq!(first.items, vec!["c0", "c1"]);
        assert_eq!(first.next_cursor.as_deref(), Some("c1"));

        let last = paginate_slice(items.clone(), |s| s.as_str(), &PageRequest::after(2, "c3"), 20);
        assert_eq!(last.items, vec!["c4"]);
        assert_eq!(last.next_cursor, None);

        let restarted = paginate_slice(items, |s| s.as_str(), &PageRequest::after(0, "gone"), 20);
        assert_eq!(restarted.len(), 5);
    }
}
