/// Community task categories
use super::audit::{ActionType, AdminActor, AuditTrail};
use crate::{
    error::{AdminError, AdminResult},
    models::TaskCategory,
    pagination::{list_page, Page, PageRequest, DEFAULT_CATEGORY_PAGE},
    store::{encode, fetch_required, Collection, EntityStore, FieldDelta, FilterOp, Query},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryDraft {
    pub category_name: Option<String>,
    pub category_type: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct CategoryManager {
    store: Arc<dyn EntityStore>,
    audit: AuditTrail,
}

impl CategoryManager {
    pub fn new(store: Arc<dyn EntityStore>, audit: AuditTrail) -> Self {
        Self { store, audit }
    }

    async fn ensure_unique_name(&self, name: &str, except_id: Option<&str>) -> AdminResult<()> {
        let existing = self
            .store
            .query(
                Collection::TaskCategories,
                &Query::new().filter("category_name", FilterOp::Eq, name).limit(2),
            )
            .await?;

        if existing.iter().any(|doc| Some(doc.id.as_str()) != except_id) {
            return Err(AdminError::Conflict(format!(
                "Category '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    pub async fn create_category(
        &self,
        draft: &CategoryDraft,
        actor: &AdminActor,
    ) -> AdminResult<TaskCategory> {
        let required = |value: &Option<String>, field: &str| match value.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(AdminError::InvalidInput(format!("Field {} is required", field))),
        };
        let name = required(&draft.category_name, "category_name")?;
        let kind = required(&draft.category_type, "category_type")?;
        let description = draft
            .description
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        self.ensure_unique_name(&name, None).await?;

        let category = TaskCategory {
            id: self.store.new_id(),
            name,
            kind,
            description,
            created_at: Utc::now(),
        };
        let fields = encode(&category)?;

        self.store
            .set(Collection::TaskCategories, &category.id, fields.clone())
            .await?;

        let mut echoed = fields;
        echoed.insert("id".to_string(), Value::from(category.id.clone()));
        self.audit
            .record(
                actor,
                ActionType::CommunityTaskCategoryCreated,
                json!({ "category": echoed }),
            )
            .await?;

        Ok(category)
    }

    pub async fn list_categories(&self, page: &PageRequest) -> AdminResult<Page<TaskCategory>> {
        list_page(
            self.store.as_ref(),
            Collection::TaskCategories,
            Query::new(),
            "created_at",
            page,
            DEFAULT_CATEGORY_PAGE,
        )
        .await?
        .decode()
    }

    pub async fn get_category(&self, category_id: &str) -> AdminResult<TaskCategory> {
        fetch_required(
            self.store.as_ref(),
            Collection::TaskCategories,
            category_id,
            "Category",
        )
        .await?
        .decode()
    }

    pub async fn update_category(
        &self,
        category_id: &str,
        patch: &CategoryDraft,
        actor: &AdminActor,
    ) -> AdminResult<TaskCategory> {
        let non_empty = |value: &Option<String>, field: &str| -> AdminResult<Option<String>> {
            match value.as_deref().map(str::trim) {
                None => Ok(None),
                Some("") => Err(AdminError::InvalidInput(format!("Field {} cannot be empty", field))),
                Some(text) => Ok(Some(text.to_string())),
            }
        };
        let name = non_empty(&patch.category_name, "category_name")?;
        let kind = non_empty(&patch.category_type, "category_type")?;
        let description = patch.description.as_deref().map(|d| d.trim().to_string());

        if name.is_none() && kind.is_none() && description.is_none() {
            return Err(AdminError::InvalidInput("No fields to update".to_string()));
        }

        let mut category = self.get_category(category_id).await?;
        if let Some(name) = &name {
            self.ensure_unique_name(name, Some(category_id)).await?;
        }

        let mut deltas = Vec::new();
        if let Some(name) = name {
            deltas.push(("category_name".to_string(), FieldDelta::Set(Value::from(name.clone()))));
            category.name = name;
        }
        if let Some(kind) = kind {
            deltas.push(("category_type".to_string(), FieldDelta::Set(Value::from(kind.clone()))));
            category.kind = kind;
        }
        if let Some(description) = description {
            deltas.push((
                "description".to_string(),
                FieldDelta::Set(Value::from(description.clone())),
            ));
            category.description = description;
        }

        let updated_fields: Vec<String> = deltas.iter().map(|(field, _)| field.clone()).collect();
        self.store
            .update(Collection::TaskCategories, category_id, deltas)
            .await?;

        self.audit
            .record(
                actor,
                ActionType::CommunityTaskCategoryUpdated,
                json!({
                    "category_id": category_id,
                    "category_name": category.name,
                    "updated_fields": updated_fields,
                }),
            )
            .await?;

        Ok(category)
    }

    pub async fn delete_category(&self, category_id: &str, actor: &AdminActor) -> AdminResult<()> {
        let category = self.get_category(category_id).await?;

        self.store
            .delete(Collection::TaskCategories, category_id)
            .await?;

        self.audit
            .record(
                actor,
                ActionType::CommunityTaskCategoryDeleted,
                json!({
                    "category_id": category_id,
                    "category_name": category.name,
                }),
            )
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn draft(name: &str) -> CategoryDraft {
        CategoryDraft {
            category_name: Some(name.to_string()),
            category_type: Some("wellbeing".to_string()),
            description: Some("Screen-free time".to_string()),
        }
    }

    fn setup() -> (CategoryManager, AuditTrail) {
        let store = Arc::new(MemoryStore::new());
        let audit = AuditTrail::new(store.clone());
        (CategoryManager::new(store, audit.clone()), audit)
    }

    #[tokio::test]
    async fn test_create_requires_fields() {
        let (categories, _audit) = setup();
        let mut incomplete = draft("Outdoors");
        incomplete.category_type = None;

        match categories.create_category(&incomplete, &AdminActor::new("a")).await {
            Err(AdminError::InvalidInput(message)) => {
                assert_eq!(message, "Field category_type is required")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let (categories, audit) = setup();
        let actor = AdminActor::new("admin");

        let outdoors = categories.create_category(&draft("Outdoors"), &actor).await.unwrap();
        categories.create_category(&draft("Reading"), &actor).await.unwrap();
        assert!(matches!(
            categories.create_category(&draft("Outdoors"), &actor).await,
            Err(AdminError::Conflict(_))
        ));

        let patch = CategoryDraft {
            category_name: Some("Reading".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            categories.update_category(&outdoors.id, &patch, &actor).await,
            Err(AdminError::Conflict(_))
        ));

        let patch = CategoryDraft {
            description: Some("Fresh air".to_string()),
            ..Default::default()
        };
        let updated = categories.update_category(&outdoors.id, &patch, &actor).await.unwrap();
        assert_eq!(updated.description, "Fresh air");

        let page = categories.list_categories(&PageRequest::default()).await.unwrap();
        assert_eq!(page.len(), 2);

        categories.delete_category(&outdoors.id, &actor).await.unwrap();
        assert!(matches!(
            categories.get_category(&outdoors.id).await,
            Err(AdminError::NotFound(_))
        ));

        let actions: Vec<_> = audit
            .list(None)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action_type)
            .collect();
        assert_eq!(actions.len(), 4);
        assert!(actions.contains(&ActionType::CommunityTaskCategoryDeleted));
        assert!(actions.contains(&ActionType::CommunityTaskCategoryUpdated));
    }
}
