/// Community task management
use super::audit::{ActionType, AdminActor, AuditTrail};
use crate::{
    error::{AdminError, AdminResult},
    models::{CommunityTask, Participant, TaskDetails, TaskSummary, UserAccount},
    pagination::{list_page, Page, PageRequest, DEFAULT_TASK_PAGE},
    store::{
        encode, fetch_required,
        timestamp::{format_timestamp, parse_timestamp, timestamp_value},
        Collection, EntityStore, FieldDelta, FilterOp, Query,
    },
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Deadline layout accepted from operators, read as UTC
pub const DEADLINE_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Task fields as supplied by a caller; every field optional so the same
/// shape serves creation and partial updates
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskDraft {
    pub title: Option<String>,
    pub category: Option<String>,
    /// Number or numeric string
    pub reward_minutes: Option<Value>,
    pub deadline: Option<String>,
}

/// Aggregate view over every community task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStats {
    pub total_tasks: usize,
    pub active_tasks: usize,
    pub expired_tasks: usize,
    pub total_participants: usize,
    pub total_completions: usize,
    /// Completions per participation, in percent
    pub completion_rate: f64,
    pub tasks_by_category: BTreeMap<String, usize>,
}

/// Parse a deadline in `DD/MM/YYYY HH:MM` or RFC 3339
pub fn parse_deadline(raw: &str) -> AdminResult<DateTime<Utc>> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, DEADLINE_FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| parse_timestamp(raw))
        .ok_or_else(|| {
            AdminError::InvalidInput(
                "Invalid deadline format. Use format DD/MM/YYYY HH:MM".to_string(),
            )
        })
}

fn future_deadline(raw: &str, now: DateTime<Utc>) -> AdminResult<DateTime<Utc>> {
    let deadline = parse_deadline(raw)?;
    if deadline <= now {
        return Err(AdminError::InvalidInput(
            "Deadline must be a future date".to_string(),
        ));
    }
    Ok(deadline)
}

/// Parse a positive reward from a number or numeric string
pub fn parse_reward(raw: &Value) -> AdminResult<i64> {
    let reward = match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match reward {
        Some(minutes) if minutes > 0 => Ok(minutes),
        _ => Err(AdminError::InvalidInput(
            "Reward minutes must be a positive number".to_string(),
        )),
    }
}

fn required_text(value: &Option<String>, field: &str) -> AdminResult<String> {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(AdminError::InvalidInput(format!("Field {} is required", field))),
    }
}

#[derive(Clone)]
pub struct TaskManager {
    store: Arc<dyn EntityStore>,
    audit: AuditTrail,
}

impl TaskManager {
    pub fn new(store: Arc<dyn EntityStore>, audit: AuditTrail) -> Self {
        Self { store, audit }
    }

    async fn ensure_unique_title(&self, title: &str, except_id: Option<&str>) -> AdminResult<()> {
        let clash = self
            .store
            .query(
                Collection::CommunityTasks,
                &Query::new().filter("title", FilterOp::Eq, title).limit(2),
            )
            .await?
            .into_iter()
            .any(|doc| Some(doc.id.as_str()) != except_id);

        if clash {
            return Err(AdminError::Conflict(format!(
                "A community task with title '{}' already exists",
                title
            )));
        }
        Ok(())
    }

    pub async fn create_task(
        &self,
        draft: &TaskDraft,
        actor: &AdminActor,
    ) -> AdminResult<CommunityTask> {
        self.create_task_at(draft, actor, Utc::now()).await
    }

    /// Create a task, validating against the supplied current time
    pub async fn create_task_at(
        &self,
        draft: &TaskDraft,
        actor: &AdminActor,
        now: DateTime<Utc>,
    ) -> AdminResult<CommunityTask> {
        let title = required_text(&draft.title, "title")?;
        let category = required_text(&draft.category, "category")?;
        let reward_minutes = parse_reward(draft.reward_minutes.as_ref().ok_or_else(|| {
            AdminError::InvalidInput("Field reward_minutes is required".to_string())
        })?)?;
        let deadline = future_deadline(&required_text(&draft.deadline, "deadline")?, now)?;

        self.ensure_unique_title(&title, None).await?;

        let task = CommunityTask {
            id: self.store.new_id(),
            title,
            category,
            reward_minutes,
            deadline,
            participant_ids: Vec::new(),
            completed_by_ids: Vec::new(),
            created_by: actor.admin_id.clone(),
            created_at: now,
        };

        self.store
            .set(Collection::CommunityTasks, &task.id, encode(&task)?)
            .await?;

        tracing::info!("Community task {} created by admin {}", task.id, actor.admin_id);

        self.audit
            .record(
                actor,
                ActionType::CommunityTaskCreated,
                json!({
                    "task_id": task.id,
                    "title": task.title,
                    "category": task.category,
                    "reward_minutes": task.reward_minutes,
                    "deadline": format_timestamp(&task.deadline),
                }),
            )
            .await?;

        Ok(task)
    }

    /// Page through tasks, newest first
    pub async fn list_tasks(&self, page: &PageRequest) -> AdminResult<Page<TaskSummary>> {
        let tasks: Page<CommunityTask> = list_page(
            self.store.as_ref(),
            Collection::CommunityTasks,
            Query::new(),
            "created_at",
            page,
            DEFAULT_TASK_PAGE,
        )
        .await?
        .decode()?;

        Ok(tasks.map(|task| TaskSummary::from(&task)))
    }

    async fn load(&self, task_id: &str) -> AdminResult<CommunityTask> {
        fetch_required(
            self.store.as_ref(),
            Collection::CommunityTasks,
            task_id,
            "Community task",
        )
        .await?
        .decode()
    }

    async fn resolve_users(&self, ids: &[String]) -> AdminResult<Vec<Participant>> {
        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            // Accounts deleted since joining are skipped
            if let Some(doc) = self.store.get(Collection::Users, id).await? {
                let user: UserAccount = doc.decode()?;
                resolved.push(Participant {
                    id: user.id,
                    username: user.display_name,
                    email: user.email,
                });
            }
        }
        Ok(resolved)
    }

    /// Task with participants and completers resolved to user references
    pub async fn get_task(&self, task_id: &str) -> AdminResult<TaskDetails> {
        let task = self.load(task_id).await?;
        let participants = self.resolve_users(&task.participant_ids).await?;
        let completed_by = self.resolve_users(&task.completed_by_ids).await?;

        Ok(TaskDetails {
            task: TaskSummary::from(&task),
            participants,
            completed_by,
        })
    }

    pub async fn update_task(
        &self,
        task_id: &str,
        patch: &TaskDraft,
        actor: &AdminActor,
    ) -> AdminResult<CommunityTask> {
        self.update_task_at(task_id, patch, actor, Utc::now()).await
    }

    /// Apply the supplied fields; a resupplied deadline must lie after `now`
    pub async fn update_task_at(
        &self,
        task_id: &str,
        patch: &TaskDraft,
        actor: &AdminActor,
        now: DateTime<Utc>,
    ) -> AdminResult<CommunityTask> {
        let title = patch
            .title
            .as_ref()
            .map(|_| required_text(&patch.title, "title"))
            .transpose()?;
        let category = patch
            .category
            .as_ref()
            .map(|_| required_text(&patch.category, "category"))
            .transpose()?;
        let reward_minutes = patch.reward_minutes.as_ref().map(parse_reward).transpose()?;
        let deadline = patch
            .deadline
            .as_deref()
            .map(|raw| future_deadline(raw, now))
            .transpose()?;

        if title.is_none() && category.is_none() && reward_minutes.is_none() && deadline.is_none() {
            return Err(AdminError::InvalidInput("No fields to update".to_string()));
        }

        let mut task = self.load(task_id).await?;
        if let Some(title) = &title {
            self.ensure_unique_title(title, Some(task_id)).await?;
        }

        let mut deltas = Vec::new();
        if let Some(title) = title {
            deltas.push(("title".to_string(), FieldDelta::Set(Value::from(title.clone()))));
            task.title = title;
        }
        if let Some(category) = category {
            deltas.push(("category".to_string(), FieldDelta::Set(Value::from(category.clone()))));
            task.category = category;
        }
        if let Some(reward) = reward_minutes {
            deltas.push(("reward_minutes".to_string(), FieldDelta::Set(Value::from(reward))));
            task.reward_minutes = reward;
        }
        if let Some(deadline) = deadline {
            deltas.push(("deadline".to_string(), FieldDelta::Set(timestamp_value(&deadline))));
            task.deadline = deadline;
        }

        let updated_fields: Vec<String> = deltas.iter().map(|(field, _)| field.clone()).collect();
        self.store
            .update(Collection::CommunityTasks, task_id, deltas)
            .await?;

        self.audit
            .record(
                actor,
                ActionType::CommunityTaskUpdated,
                json!({
                    "task_id": task_id,
                    "title": task.title,
                    "updated_fields": updated_fields,
                }),
            )
            .await?;

        Ok(task)
    }

    pub async fn delete_task(&self, task_id: &str, actor: &AdminActor) -> AdminResult<()> {
        let task = self.load(task_id).await?;

        self.store.delete(Collection::CommunityTasks, task_id).await?;

        tracing::info!("Community task {} deleted by admin {}", task_id, actor.admin_id);

        self.audit
            .record(
                actor,
                ActionType::CommunityTaskDeleted,
                json!({
                    "task_id": task_id,
                    "title": task.title,
                    "participants_count": task.participant_ids.len(),
                    "completed_count": task.completed_by_ids.len(),
                    "created_by": task.created_by,
                }),
            )
            .await?;

        Ok(())
    }

    pub async fn task_stats(&self) -> AdminResult<TaskStats> {
        self.task_stats_at(Utc::now()).await
    }

    /// Full scan over the task collection
    pub async fn task_stats_at(&self, now: DateTime<Utc>) -> AdminResult<TaskStats> {
        let tasks = self
            .store
            .query(Collection::CommunityTasks, &Query::new())
            .await?
            .iter()
            .map(|doc| doc.decode::<CommunityTask>())
            .collect::<AdminResult<Vec<_>>>()?;

        let mut stats = TaskStats {
            total_tasks: tasks.len(),
            active_tasks: 0,
            expired_tasks: 0,
            total_participants: 0,
            total_completions: 0,
            completion_rate: 0.0,
            tasks_by_category: BTreeMap::new(),
        };

        for task in &tasks {
            if task.deadline > now {
                stats.active_tasks += 1;
            } else {
                stats.expired_tasks += 1;
            }
            stats.total_participants += task.participant_ids.len();
            stats.total_completions += task.completed_by_ids.len();
            *stats
                .tasks_by_category
                .entry(task.category.clone())
                .or_insert(0) += 1;
        }

        if stats.total_participants > 0 {
            let rate = stats.total_completions as f64 / stats.total_participants as f64 * 100.0;
            stats.completion_rate = (rate * 100.0).round() / 100.0;
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn draft(title: &str, deadline: &str) -> TaskDraft {
        TaskDraft {
            title: Some(title.to_string()),
            category: Some("Fitness".to_string()),
            reward_minutes: Some(json!(15)),
            deadline: Some(deadline.to_string()),
        }
    }

    fn setup() -> (Arc<MemoryStore>, TaskManager, AuditTrail) {
        let store = Arc::new(MemoryStore::new());
        let audit = AuditTrail::new(store.clone());
        (store.clone(), TaskManager::new(store, audit.clone()), audit)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_deadline_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 6, 2, 18, 30, 0).unwrap();
        assert_eq!(parse_deadline("02/06/2025 18:30").unwrap(), expected);
        assert_eq!(parse_deadline("2025-06-02T18:30:00Z").unwrap(), expected);
        assert!(parse_deadline("June 2nd").is_err());
    }

    #[test]
    fn test_parse_reward() {
        assert_eq!(parse_reward(&json!(30)).unwrap(), 30);
        assert_eq!(parse_reward(&json!("45")).unwrap(), 45);
        assert_eq!(parse_reward(&json!(10.0)).unwrap(), 10);
        assert!(parse_reward(&json!(0)).is_err());
        assert!(parse_reward(&json!(-5)).is_err());
        assert!(parse_reward(&json!("ten")).is_err());
        assert!(parse_reward(&json!(2.5)).is_err());
    }

    #[tokio::test]
    async fn test_deadline_must_be_future() {
        let (store, tasks, audit) = setup();
        let actor = AdminActor::new("admin");

        for deadline in ["01/06/2025 12:00", "31/05/2025 08:00"] {
            let result = tasks.create_task_at(&draft("Run", deadline), &actor, now()).await;
            assert!(matches!(result, Err(AdminError::InvalidInput(_))));
        }

        assert_eq!(store.count(Collection::CommunityTasks).await, 0);
        assert!(audit.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_field() {
        let (_store, tasks, _audit) = setup();
        let mut incomplete = draft("Run", "02/06/2025 12:00");
        incomplete.category = Some("  ".to_string());

        match tasks.create_task_at(&incomplete, &AdminActor::new("a"), now()).await {
            Err(AdminError::InvalidInput(message)) => assert_eq!(message, "Field category is required"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_title_conflicts() {
        let (store, tasks, _audit) = setup();
        let actor = AdminActor::new("admin");

        let created = tasks
            .create_task_at(&draft("Run 5k", "02/06/2025 12:00"), &actor, now())
            .await
            .unwrap();
        assert_eq!(created.created_by, "admin");

        let second = tasks
            .create_task_at(&draft("Run 5k", "03/06/2025 12:00"), &actor, now())
            .await;
        assert!(matches!(second, Err(AdminError::Conflict(_))));
        assert_eq!(store.count(Collection::CommunityTasks).await, 1);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_store, tasks, audit) = setup();
        let actor = AdminActor::new("admin");

        let a = tasks
            .create_task_at(&draft("A", "02/06/2025 12:00"), &actor, now())
            .await
            .unwrap();
        tasks
            .create_task_at(&draft("B", "02/06/2025 12:00"), &actor, now())
            .await
            .unwrap();

        let rename = TaskDraft {
            title: Some("B".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            tasks.update_task_at(&a.id, &rename, &actor, now()).await,
            Err(AdminError::Conflict(_))
        ));
        assert!(matches!(
            tasks.update_task_at(&a.id, &TaskDraft::default(), &actor, now()).await,
            Err(AdminError::InvalidInput(_))
        ));

        // Keeping its own title is not a conflict
        let patch = TaskDraft {
            title: Some("A".to_string()),
            reward_minutes: Some(json!("90")),
            ..Default::default()
        };
        let updated = tasks.update_task_at(&a.id, &patch, &actor, now()).await.unwrap();
        assert_eq!(updated.reward_minutes, 90);

        tasks.delete_task(&a.id, &actor).await.unwrap();
        assert!(matches!(tasks.get_task(&a.id).await, Err(AdminError::NotFound(_))));

        let entries = audit.list(None).await.unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries
            .iter()
            .any(|e| e.action_type == ActionType::CommunityTaskDeleted));
    }

    #[tokio::test]
    async fn test_details_and_stats() {
        let (store, tasks, _audit) = setup();
        let actor = AdminActor::new("admin");

        store
            .set(
                Collection::Users,
                "u1",
                json!({"email": "u1@x.io", "username": "uno", "createdAt": "2025-01-01T00:00:00Z"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();

        let task = tasks
            .create_task_at(&draft("Walk", "02/06/2025 12:00"), &actor, now())
            .await
            .unwrap();
        store
            .update(
                Collection::CommunityTasks,
                &task.id,
                vec![
                    ("participants".into(), FieldDelta::ArrayUnion(vec![json!("u1"), json!("gone")])),
                    ("completed_by".into(), FieldDelta::ArrayUnion(vec![json!("u1")])),
                ],
            )
            .await
            .unwrap();

        let details = tasks.get_task(&task.id).await.unwrap();
        assert_eq!(details.task.participants_count, 2);
        assert_eq!(details.participants.len(), 1);
        assert_eq!(details.participants[0].username, "uno");
        assert_eq!(details.completed_by.len(), 1);

        let stats = tasks.task_stats_at(now() + Duration::days(2)).await.unwrap();
        assert_eq!(stats.total_tasks, 1);
        assert_eq!(stats.expired_tasks, 1);
        assert_eq!(stats.completion_rate, 50.0);
        assert_eq!(stats.tasks_by_category.get("Fitness"), Some(&1));
    }
}
