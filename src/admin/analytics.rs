/// Windowed usage analytics
///
/// Every count is a full collection scan. This is an admin-only, low-frequency
/// read; cost grows linearly with the number of stored entities.
use crate::{
    error::{AdminError, AdminResult},
    store::{
        timestamp::{parse_timestamp, timestamp_value},
        Collection, Document, EntityStore, FilterOp, Query,
    },
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Point-in-time totals plus counts created inside the trailing window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsSummary {
    pub total_users: usize,
    pub new_users: usize,
    pub total_posts: usize,
    pub new_posts: usize,
    pub total_comments: usize,
    pub new_comments: usize,
    pub total_tasks: usize,
    pub new_tasks: usize,
    pub period_days: i64,
}

/// Closed lower bound, open upper bound
#[derive(Debug, Clone, Copy)]
struct Window {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Window {
    fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

#[derive(Clone)]
pub struct AnalyticsAggregator {
    store: Arc<dyn EntityStore>,
}

impl AnalyticsAggregator {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn summary(&self, window_days: i64) -> AdminResult<AnalyticsSummary> {
        self.summary_at(Utc::now(), window_days).await
    }

    /// Summary for the window ending at `now`
    pub async fn summary_at(
        &self,
        now: DateTime<Utc>,
        window_days: i64,
    ) -> AdminResult<AnalyticsSummary> {
        if window_days < 0 {
            return Err(AdminError::InvalidInput(
                "days must not be negative".to_string(),
            ));
        }

        let start = TimeDelta::try_days(window_days)
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| AdminError::InvalidInput("days is out of range".to_string()))?;
        let window = Window { start, end: now };

        let total_users = self.count_all(Collection::Users).await?;
        let new_users = self.count_created_in(Collection::Users, "createdAt", window).await?;
        let total_tasks = self.count_all(Collection::CommunityTasks).await?;
        let new_tasks = self
            .count_created_in(Collection::CommunityTasks, "created_at", window)
            .await?;

        let posts = self.store.query(Collection::Posts, &Query::new()).await?;
        let new_posts = self.count_created_in(Collection::Posts, "createdAt", window).await?;
        let (total_comments, new_comments) = count_comments(&posts, window);

        tracing::debug!(
            "Analytics over {} days: {} users, {} posts, {} comments",
            window_days,
            total_users,
            posts.len(),
            total_comments
        );

        Ok(AnalyticsSummary {
            total_users,
            new_users,
            total_posts: posts.len(),
            new_posts,
            total_comments,
            new_comments,
            total_tasks,
            new_tasks,
            period_days: window_days,
        })
    }

    async fn count_all(&self, collection: Collection) -> AdminResult<usize> {
        Ok(self.store.query(collection, &Query::new()).await?.len())
    }

    /// Range query on the stored fixed-width timestamps
    async fn count_created_in(
        &self,
        collection: Collection,
        field: &str,
        window: Window,
    ) -> AdminResult<usize> {
        let query = Query::new()
            .filter(field, FilterOp::Gte, timestamp_value(&window.start))
            .filter(field, FilterOp::Lt, timestamp_value(&window.end));
        Ok(self.store.query(collection, &query).await?.len())
    }
}

/// Total embedded comments, and those whose timestamp parses into the window.
/// Unparseable timestamps still count toward the total.
fn count_comments(posts: &[Document], window: Window) -> (usize, usize) {
    let mut total = 0;
    let mut new = 0;

    for post in posts {
        let Some(comments) = post.get("comments").and_then(Value::as_array) else {
            continue;
        };
        total += comments.len();
        new += comments
            .iter()
            .filter_map(|comment| comment.get("createdAt").and_then(Value::as_str))
            .filter_map(parse_timestamp)
            .filter(|at| window.contains(*at))
            .count();
    }

    (total, new)
}
