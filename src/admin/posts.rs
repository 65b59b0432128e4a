/// Post and comment moderation
use super::{
    audit::{preview, ActionType, AdminActor, AuditTrail},
    cascade::{CascadeCoordinator, CascadePlan},
};
use crate::{
    error::{AdminError, AdminResult},
    models::{Comment, Post, PostDetails, PostView},
    pagination::{list_page, paginate_slice, Page, PageRequest, DEFAULT_COMMENT_PAGE, DEFAULT_POST_PAGE},
    store::{
        fetch_required, timestamp::timestamp_value, Collection, EntityStore, FieldDelta,
        Precondition, Query, WriteOp,
    },
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct PostModeration {
    store: Arc<dyn EntityStore>,
    audit: AuditTrail,
    cascade: CascadeCoordinator,
}

impl PostModeration {
    pub fn new(store: Arc<dyn EntityStore>, audit: AuditTrail) -> Self {
        Self {
            cascade: CascadeCoordinator::new(store.clone()),
            store,
            audit,
        }
    }

    /// Page through posts, newest first
    pub async fn list_posts(&self, page: &PageRequest) -> AdminResult<Page<PostView>> {
        let posts: Page<Post> = list_page(
            self.store.as_ref(),
            Collection::Posts,
            Query::new(),
            "createdAt",
            page,
            DEFAULT_POST_PAGE,
        )
        .await?
        .decode()?;

        Ok(posts.map(|post| PostView::from(&post)))
    }

    async fn load(&self, post_id: &str) -> AdminResult<Post> {
        fetch_required(self.store.as_ref(), Collection::Posts, post_id, "Post")
            .await?
            .decode()
    }

    pub async fn get_post(&self, post_id: &str) -> AdminResult<PostDetails> {
        Ok(PostDetails::from(self.load(post_id).await?))
    }

    /// Delete a post; its comments are embedded and go with it
    pub async fn delete_post(&self, post_id: &str, actor: &AdminActor) -> AdminResult<()> {
        let post = self.load(post_id).await?;

        self.cascade
            .execute(CascadePlan::new(Collection::Posts, post_id))
            .await?;

        tracing::info!("Post {} deleted by admin {}", post_id, actor.admin_id);

        self.audit
            .record(
                actor,
                ActionType::PostDeleted,
                json!({
                    "post_id": post_id,
                    "user_id": post.author_id,
                    "content_preview": preview(&post.content),
                }),
            )
            .await?;

        Ok(())
    }

    /// Replace a post's content and mark it as edited by an admin
    pub async fn edit_post_content(
        &self,
        post_id: &str,
        content: &str,
        actor: &AdminActor,
    ) -> AdminResult<PostView> {
        if content.trim().is_empty() {
            return Err(AdminError::InvalidInput("Content is required".to_string()));
        }

        let mut post = self.load(post_id).await?;
        let old_content = std::mem::replace(&mut post.content, content.to_string());
        let now = Utc::now();

        self.store
            .update(
                Collection::Posts,
                post_id,
                vec![
                    ("content".to_string(), FieldDelta::Set(Value::from(content))),
                    ("editedAt".to_string(), FieldDelta::Set(timestamp_value(&now))),
                    ("editedByAdmin".to_string(), FieldDelta::Set(Value::Bool(true))),
                ],
            )
            .await?;
        post.edited_at = Some(now);
        post.edited_by_admin = true;

        self.audit
            .record(
                actor,
                ActionType::PostEdited,
                json!({
                    "post_id": post_id,
                    "old_content_preview": preview(&old_content),
                    "new_content_preview": preview(content),
                }),
            )
            .await?;

        Ok(PostView::from(&post))
    }

    /// Remove one embedded comment
    ///
    /// The stored comment value is removed as a whole, guarded on it still
    /// being present, so concurrent appends to the sequence are kept.
    pub async fn delete_comment(
        &self,
        post_id: &str,
        comment_id: &str,
        actor: &AdminActor,
    ) -> AdminResult<()> {
        let doc = fetch_required(self.store.as_ref(), Collection::Posts, post_id, "Post").await?;

        let stored = doc
            .get("comments")
            .and_then(Value::as_array)
            .and_then(|comments| {
                comments
                    .iter()
                    .find(|c| c.get("id").and_then(Value::as_str) == Some(comment_id))
            })
            .cloned()
            .ok_or_else(|| AdminError::not_found("Comment", comment_id))?;

        let comment: Comment = serde_json::from_value(stored.clone()).map_err(|e| {
            AdminError::Internal(format!("Malformed comment {}: {}", comment_id, e))
        })?;

        self.store
            .commit(vec![WriteOp::guarded_update(
                Collection::Posts,
                post_id,
                vec![(
                    "comments".to_string(),
                    FieldDelta::ArrayRemove(vec![stored.clone()]),
                )],
                Precondition::ArrayContains {
                    field: "comments".to_string(),
                    value: stored,
                },
            )])
            .await
            .map_err(|e| match e {
                AdminError::PreconditionFailed(_) => AdminError::not_found("Comment", comment_id),
                other => other,
            })?;

        self.audit
            .record(
                actor,
                ActionType::CommentDeleted,
                json!({
                    "post_id": post_id,
                    "comment_id": comment_id,
                    "user_id": comment.author_id,
                    "content_preview": preview(&comment.content),
                }),
            )
            .await?;

        Ok(())
    }

    /// Page through a post's comments, newest first; undated comments sort last
    pub async fn list_comments(
        &self,
        post_id: &str,
        page: &PageRequest,
    ) -> AdminResult<Page<Comment>> {
        let mut comments = self.load(post_id).await?.comments;
        comments.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        Ok(paginate_slice(
            comments,
            |c| c.id.as_str(),
            page,
            DEFAULT_COMMENT_PAGE,
        ))
    }
}
