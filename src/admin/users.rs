/// User account moderation
use super::{
    audit::{ActionType, AdminActor, AuditTrail},
    cascade::CascadeCoordinator,
};
use crate::{
    error::AdminResult,
    models::{Post, PostView, UserAccount, UserDetails, UserSummary},
    pagination::{list_page, Page, PageRequest, DEFAULT_USER_PAGE},
    store::{fetch_required, Collection, Direction, EntityStore, FieldDelta, FilterOp, Query},
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Result of a user deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserDeletion {
    pub posts_deleted: usize,
}

#[derive(Clone)]
pub struct UserModeration {
    store: Arc<dyn EntityStore>,
    audit: AuditTrail,
    cascade: CascadeCoordinator,
}

impl UserModeration {
    pub fn new(store: Arc<dyn EntityStore>, audit: AuditTrail) -> Self {
        Self {
            cascade: CascadeCoordinator::new(store.clone()),
            store,
            audit,
        }
    }

    /// Page through accounts, newest first
    pub async fn list_users(&self, page: &PageRequest) -> AdminResult<Page<UserSummary>> {
        let users: Page<UserAccount> = list_page(
            self.store.as_ref(),
            Collection::Users,
            Query::new(),
            "createdAt",
            page,
            DEFAULT_USER_PAGE,
        )
        .await?
        .decode()?;

        Ok(users.map(|user| UserSummary::from(&user)))
    }

    pub async fn get_user(&self, user_id: &str) -> AdminResult<UserAccount> {
        fetch_required(self.store.as_ref(), Collection::Users, user_id, "User")
            .await?
            .decode()
    }

    /// Profile plus every post the user authored, newest first
    pub async fn get_user_details(&self, user_id: &str) -> AdminResult<UserDetails> {
        let user = self.get_user(user_id).await?;

        let posts = self
            .store
            .query(
                Collection::Posts,
                &Query::new()
                    .filter("userId", FilterOp::Eq, user_id)
                    .order_by("createdAt", Direction::Descending),
            )
            .await?
            .iter()
            .map(|doc| doc.decode::<Post>().map(|post| PostView::from(&post)))
            .collect::<AdminResult<Vec<_>>>()?;

        Ok(UserDetails {
            user: UserSummary::from(&user),
            posts,
        })
    }

    /// Set the suspension flag; every call is audited, repeated values included
    pub async fn set_suspended(
        &self,
        user_id: &str,
        suspended: bool,
        actor: &AdminActor,
    ) -> AdminResult<UserAccount> {
        let mut user = self.get_user(user_id).await?;

        self.store
            .update(
                Collection::Users,
                user_id,
                vec![("suspended".to_string(), FieldDelta::Set(Value::Bool(suspended)))],
            )
            .await?;
        user.suspended = suspended;

        tracing::info!(
            "User {} {} by admin {}",
            user_id,
            if suspended { "suspended" } else { "unsuspended" },
            actor.admin_id
        );

        self.audit
            .record(
                actor,
                ActionType::for_suspension(suspended),
                json!({
                    "user_id": user_id,
                    "username": user.display_name,
                    "email": user.email,
                }),
            )
            .await?;

        Ok(user)
    }

    /// Delete an account and every post it authored as one unit
    pub async fn delete_user_cascade(
        &self,
        user_id: &str,
        actor: &AdminActor,
    ) -> AdminResult<UserDeletion> {
        let (user, plan) = self.cascade.plan_user_deletion(user_id).await?;
        let posts_deleted = self.cascade.execute(plan).await?;

        tracing::info!(
            "User {} and {} posts deleted by admin {}",
            user_id,
            posts_deleted,
            actor.admin_id
        );

        self.audit
            .record(
                actor,
                ActionType::UserDeleted,
                json!({
                    "user_id": user_id,
                    "username": user.display_name,
                    "email": user.email,
                    "posts_deleted": posts_deleted,
                }),
            )
            .await?;

        Ok(UserDeletion { posts_deleted })
    }
}
