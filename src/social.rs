/// User-side writes to the shared store
///
/// Relation changes (likes, follows, friends, comment appends) go through
/// the store's set-union, set-remove and increment deltas inside one commit.
/// Toggles read once to pick a direction, then commit guarded on that
/// observation; a lost race is retried a bounded number of times.
use crate::{
    error::{AdminError, AdminResult},
    models::{Comment, Post, PostView, UserAccount},
    pagination::{list_page, Page, PageRequest, DEFAULT_FEED_PAGE},
    store::{
        encode, fetch_required, timestamp::timestamp_value, Collection, EntityStore, FieldDelta,
        FilterOp, Precondition, Query, WriteOp,
    },
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use validator::ValidateEmail;

/// Attempts per toggle before giving up on a contended relation
pub const MAX_TOGGLE_ATTEMPTS: usize = 3;

fn contains(values: &[String], id: &str) -> bool {
    values.iter().any(|v| v == id)
}

#[derive(Clone)]
pub struct SocialGraph {
    store: Arc<dyn EntityStore>,
}

impl SocialGraph {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    async fn user(&self, user_id: &str) -> AdminResult<UserAccount> {
        fetch_required(self.store.as_ref(), Collection::Users, user_id, "User")
            .await?
            .decode()
    }

    async fn post(&self, post_id: &str) -> AdminResult<Post> {
        fetch_required(self.store.as_ref(), Collection::Posts, post_id, "Post")
            .await?
            .decode()
    }

    /// Create an account; email uniqueness is only checked here
    pub async fn register_user(&self, email: &str, username: &str) -> AdminResult<UserAccount> {
        let email = email.trim().to_lowercase();
        if !email.validate_email() {
            return Err(AdminError::InvalidInput("Invalid email address".to_string()));
        }
        if username.trim().is_empty() {
            return Err(AdminError::InvalidInput("Username is required".to_string()));
        }

        let taken = self
            .store
            .query(
                Collection::Users,
                &Query::new().filter("email", FilterOp::Eq, email.clone()).limit(1),
            )
            .await?;
        if !taken.is_empty() {
            return Err(AdminError::Conflict(format!("Email {} is already registered", email)));
        }

        let user = UserAccount {
            id: self.store.new_id(),
            email,
            display_name: username.trim().to_string(),
            friend_ids: Vec::new(),
            following_ids: Vec::new(),
            follower_count: 0,
            suspended: false,
            created_at: Utc::now(),
        };
        self.store
            .set(Collection::Users, &user.id, encode(&user)?)
            .await?;

        Ok(user)
    }

    pub async fn create_post(&self, user_id: &str, content: &str) -> AdminResult<Post> {
        if content.trim().is_empty() {
            return Err(AdminError::InvalidInput("Content is required".to_string()));
        }
        let author = self.user(user_id).await?;

        let post = Post {
            id: self.store.new_id(),
            author_id: author.id,
            username: author.display_name,
            content: content.to_string(),
            liker_ids: Vec::new(),
            comments: Vec::new(),
            created_at: Utc::now(),
            edited_at: None,
            edited_by_admin: false,
        };
        self.store
            .set(Collection::Posts, &post.id, encode(&post)?)
            .await?;

        Ok(post)
    }

    /// Append a comment to a post's embedded sequence
    pub async fn add_comment(&self, post_id: &str, user_id: &str, content: &str) -> AdminResult<Comment> {
        if content.trim().is_empty() {
            return Err(AdminError::InvalidInput("Content is required".to_string()));
        }
        let author = self.user(user_id).await?;

        let comment = Comment {
            id: uuid::Uuid::new_v4().to_string(),
            author_id: author.id,
            username: author.display_name,
            content: content.to_string(),
            created_at_raw: Some(timestamp_value(&Utc::now())),
        };

        // Update fails with NotFound when the post is gone
        self.store
            .update(
                Collection::Posts,
                post_id,
                vec![(
                    "comments".to_string(),
                    FieldDelta::ArrayUnion(vec![serde_json::to_value(&comment)?]),
                )],
            )
            .await?;

        Ok(comment)
    }

    /// Run `attempt` until it commits or the retry budget is spent
    async fn with_retries<F, Fut>(&self, what: &str, mut attempt: F) -> AdminResult<bool>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = AdminResult<bool>>,
    {
        for round in 1..=MAX_TOGGLE_ATTEMPTS {
            match attempt().await {
                Err(AdminError::PreconditionFailed(reason)) => {
                    tracing::debug!("{} lost a race (attempt {}): {}", what, round, reason);
                }
                other => return other,
            }
        }
        Err(AdminError::Conflict(format!(
            "{} is being changed concurrently, try again",
            what
        )))
    }

    /// Flip a like; returns true when the post is now liked by the user
    pub async fn toggle_like(&self, post_id: &str, user_id: &str) -> AdminResult<bool> {
        self.with_retries("Like", || async move {
            let post = self.post(post_id).await?;
            let liked = contains(&post.liker_ids, user_id);
            let user = Value::from(user_id);

            let (delta, precondition) = if liked {
                (
                    FieldDelta::ArrayRemove(vec![user.clone()]),
                    Precondition::ArrayContains {
                        field: "likes".to_string(),
                        value: user,
                    },
                )
            } else {
                (
                    FieldDelta::ArrayUnion(vec![user.clone()]),
                    Precondition::ArrayLacks {
                        field: "likes".to_string(),
                        value: user,
                    },
                )
            };

            self.store
                .commit(vec![WriteOp::guarded_update(
                    Collection::Posts,
                    post_id,
                    vec![("likes".to_string(), delta)],
                    precondition,
                )])
                .await?;

            Ok::<bool, AdminError>(!liked)
        })
        .await
    }

    /// Flip a follow; the follower's set and the target's counter change together
    pub async fn toggle_follow(&self, follower_id: &str, target_id: &str) -> AdminResult<bool> {
        if follower_id == target_id {
            return Err(AdminError::InvalidInput("Users cannot follow themselves".to_string()));
        }
        self.user(target_id).await?;

        self.with_retries("Follow", || async move {
            let follower = self.user(follower_id).await?;
            let following = contains(&follower.following_ids, target_id);
            let target = Value::from(target_id);

            let (delta, precondition, step) = if following {
                (
                    FieldDelta::ArrayRemove(vec![target.clone()]),
                    Precondition::ArrayContains {
                        field: "following".to_string(),
                        value: target,
                    },
                    -1,
                )
            } else {
                (
                    FieldDelta::ArrayUnion(vec![target.clone()]),
                    Precondition::ArrayLacks {
                        field: "following".to_string(),
                        value: target,
                    },
                    1,
                )
            };

            self.store
                .commit(vec![
                    WriteOp::guarded_update(
                        Collection::Users,
                        follower_id,
                        vec![("following".to_string(), delta)],
                        precondition,
                    ),
                    WriteOp::update(
                        Collection::Users,
                        target_id,
                        vec![("followers_count".to_string(), FieldDelta::Increment(step))],
                    ),
                ])
                .await?;

            Ok::<bool, AdminError>(!following)
        })
        .await
    }

    async fn set_friendship(&self, user_id: &str, friend_id: &str, befriend: bool) -> AdminResult<()> {
        if user_id == friend_id {
            return Err(AdminError::InvalidInput("Users cannot befriend themselves".to_string()));
        }

        let delta = |id: &str| {
            if befriend {
                FieldDelta::ArrayUnion(vec![Value::from(id)])
            } else {
                FieldDelta::ArrayRemove(vec![Value::from(id)])
            }
        };

        self.store
            .commit(vec![
                WriteOp::update(Collection::Users, user_id, vec![("friends".to_string(), delta(friend_id))]),
                WriteOp::update(Collection::Users, friend_id, vec![("friends".to_string(), delta(user_id))]),
            ])
            .await
    }

    /// Symmetric friendship, both sides in one commit
    pub async fn add_friend(&self, user_id: &str, friend_id: &str) -> AdminResult<()> {
        self.set_friendship(user_id, friend_id, true).await
    }

    pub async fn remove_friend(&self, user_id: &str, friend_id: &str) -> AdminResult<()> {
        self.set_friendship(user_id, friend_id, false).await
    }

    /// Posts by the user and their friends, newest first
    pub async fn feed(&self, user_id: &str, page: &PageRequest) -> AdminResult<Page<PostView>> {
        let user = self.user(user_id).await?;
        let mut authors: Vec<Value> = user.friend_ids.iter().map(|id| Value::from(id.as_str())).collect();
        authors.push(Value::from(user_id));

        let posts: Page<Post> = list_page(
            self.store.as_ref(),
            Collection::Posts,
            Query::new().filter("userId", FilterOp::In, Value::Array(authors)),
            "createdAt",
            page,
            DEFAULT_FEED_PAGE,
        )
        .await?
        .decode()?;

        Ok(posts.map(|post| PostView::from(&post)))
    }
}
