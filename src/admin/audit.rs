/// Audit trail recorder
///
/// Appends one immutable `admin_logs` entry per state-changing admin action.
/// The caller's operation only reports success after `record` returns; a
/// failed append surfaces as `AdminError::AuditWrite`.
use crate::{
    error::{AdminError, AdminResult},
    metrics,
    pagination::{list_page, Page, PageRequest, DEFAULT_AUDIT_PAGE},
    store::{encode, timestamp, Collection, EntityStore, Fields, Query},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Longest content echo kept in audit details, in characters
pub const PREVIEW_CHARS: usize = 50;

/// Closed set of audited actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    AdminCreated,
    UserDeleted,
    UserSuspended,
    UserUnsuspended,
    PostDeleted,
    PostEdited,
    CommentDeleted,
    CommunityTaskCreated,
    CommunityTaskUpdated,
    CommunityTaskDeleted,
    CommunityTaskCategoryCreated,
    CommunityTaskCategoryUpdated,
    CommunityTaskCategoryDeleted,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::AdminCreated => "ADMIN_CREATED",
            ActionType::UserDeleted => "USER_DELETED",
            ActionType::UserSuspended => "USER_SUSPENDED",
            ActionType::UserUnsuspended => "USER_UNSUSPENDED",
            ActionType::PostDeleted => "POST_DELETED",
            ActionType::PostEdited => "POST_EDITED",
            ActionType::CommentDeleted => "COMMENT_DELETED",
            ActionType::CommunityTaskCreated => "COMMUNITY_TASK_CREATED",
            ActionType::CommunityTaskUpdated => "COMMUNITY_TASK_UPDATED",
            ActionType::CommunityTaskDeleted => "COMMUNITY_TASK_DELETED",
            ActionType::CommunityTaskCategoryCreated => "COMMUNITY_TASK_CATEGORY_CREATED",
            ActionType::CommunityTaskCategoryUpdated => "COMMUNITY_TASK_CATEGORY_UPDATED",
            ActionType::CommunityTaskCategoryDeleted => "COMMUNITY_TASK_CATEGORY_DELETED",
        }
    }

    /// Suspension action matching the new flag value
    pub fn for_suspension(suspended: bool) -> Self {
        if suspended {
            ActionType::UserSuspended
        } else {
            ActionType::UserUnsuspended
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified caller identity handed in by the HTTP boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminActor {
    pub admin_id: String,
    pub ip_address: Option<String>,
}

impl AdminActor {
    pub fn new(admin_id: impl Into<String>) -> Self {
        Self {
            admin_id: admin_id.into(),
            ip_address: None,
        }
    }

    pub fn with_ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }
}

/// Persisted audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminLogEntry {
    #[serde(default)]
    pub id: String,
    pub admin_id: String,
    pub action_type: ActionType,
    #[serde(default)]
    pub details: Fields,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

/// Truncate user content for audit details
pub fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let head: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        content.to_string()
    }
}

/// Append-only admin action log
#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn EntityStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Append one entry and return its id
    ///
    /// `details` should be a JSON object; any other value is wrapped as
    /// `{"value": ...}` and null becomes an empty map.
    pub async fn record(
        &self,
        actor: &AdminActor,
        action: ActionType,
        details: Value,
    ) -> AdminResult<String> {
        let details = match details {
            Value::Object(map) => map,
            Value::Null => Fields::new(),
            other => {
                let mut map = Fields::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        // v7 ids rise monotonically within the process, so entries that
        // share a timestamp still list in write order
        let id = Uuid::now_v7().simple().to_string();
        let entry = AdminLogEntry {
            id: id.clone(),
            admin_id: actor.admin_id.clone(),
            action_type: action,
            details,
            timestamp: Utc::now(),
            ip_address: actor.ip_address.clone(),
        };

        let written = match encode(&entry) {
            Ok(fields) => self.store.set(Collection::AdminLogs, &id, fields).await,
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => {
                metrics::record_admin_action(action.as_str());
                tracing::info!("Admin {} performed {}", actor.admin_id, action);
                Ok(id)
            }
            Err(e) => {
                metrics::record_audit_failure();
                tracing::warn!(
                    "Audit write for {} by {} failed: {}",
                    action,
                    actor.admin_id,
                    e
                );
                Err(AdminError::AuditWrite {
                    action: action.as_str().to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Most recent entries first
    pub async fn list(&self, limit: Option<i64>) -> AdminResult<Vec<AdminLogEntry>> {
        Ok(self.list_page(&PageRequest::new(limit, None)).await?.items)
    }

    /// Page through the trail, most recent first
    pub async fn list_page(&self, page: &PageRequest) -> AdminResult<Page<AdminLogEntry>> {
        list_page(
            self.store.as_ref(),
            Collection::AdminLogs,
            Query::new(),
            "timestamp",
            page,
            DEFAULT_AUDIT_PAGE,
        )
        .await?
        .decode()
    }
}
