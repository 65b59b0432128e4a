/// Typed records for the stored collections
///
/// Field names follow the stored document layout (`userId`, `createdAt`,
/// `followers_count`, ...) through serde renames; Rust-side names follow the
/// domain. Optional or collection-valued fields default explicitly when absent.
use crate::store::timestamp::{self, parse_timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// End-user account of the social app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "username", default)]
    pub display_name: String,
    /// Symmetric friend relation
    #[serde(rename = "friends", default)]
    pub friend_ids: Vec<String>,
    #[serde(rename = "following", default)]
    pub following_ids: Vec<String>,
    #[serde(rename = "followers_count", default)]
    pub follower_count: i64,
    #[serde(default)]
    pub suspended: bool,
    #[serde(rename = "createdAt", with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Post with its embedded comment sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "userId")]
    pub author_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "likes", default)]
    pub liker_ids: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(rename = "createdAt", with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(
        rename = "editedAt",
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(rename = "editedByAdmin", default)]
    pub edited_by_admin: bool,
}

/// Comment embedded in a post
///
/// The timestamp is kept as written by the client; see [`Comment::created_at`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "userId", default)]
    pub author_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at_raw: Option<Value>,
}

impl Comment {
    /// Parsed creation time, None when absent or unparseable
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at_raw
            .as_ref()
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
    }
}

/// Time-boxed community challenge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityTask {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: String,
    pub reward_minutes: i64,
    #[serde(with = "timestamp")]
    pub deadline: DateTime<Utc>,
    #[serde(rename = "participants", default)]
    pub participant_ids: Vec<String>,
    #[serde(rename = "completed_by", default)]
    pub completed_by_ids: Vec<String>,
    #[serde(default)]
    pub created_by: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Category a community task can belong to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCategory {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "category_name")]
    pub name: String,
    #[serde(rename = "category_type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Operator account. Only ever leaves the crate as an [`AdminProfile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminAccount {
    #[serde(default)]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "password")]
    pub password_hash: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Public view of an admin account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl From<AdminAccount> for AdminProfile {
    fn from(account: AdminAccount) -> Self {
        Self {
            id: account.id,
            email: account.email,
            name: account.name,
            created_at: account.created_at,
        }
    }
}

// ============================================================================
// Views returned to callers
// ============================================================================

/// User row of the moderation listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Number of friends
    pub friends: usize,
    pub following: usize,
    pub followers_count: i64,
    pub suspended: bool,
    #[serde(rename = "createdAt", with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl From<&UserAccount> for UserSummary {
    fn from(user: &UserAccount) -> Self {
        Self {
            id: user.id.clone(),
            username: user.display_name.clone(),
            email: user.email.clone(),
            friends: user.friend_ids.len(),
            following: user.following_ids.len(),
            followers_count: user.follower_count,
            suspended: user.suspended,
            created_at: user.created_at,
        }
    }
}

/// Post with counts derived from the live collections
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostView {
    pub id: String,
    #[serde(rename = "userId")]
    pub author_id: String,
    pub username: String,
    pub content: String,
    #[serde(rename = "likeCount")]
    pub like_count: usize,
    #[serde(rename = "commentCount")]
    pub comment_count: usize,
    #[serde(rename = "createdAt", with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "editedAt", with = "timestamp::option")]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(rename = "editedByAdmin")]
    pub edited_by_admin: bool,
}

impl From<&Post> for PostView {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            author_id: post.author_id.clone(),
            username: post.username.clone(),
            content: post.content.clone(),
            like_count: post.liker_ids.len(),
            comment_count: post.comments.len(),
            created_at: post.created_at,
            edited_at: post.edited_at,
            edited_by_admin: post.edited_by_admin,
        }
    }
}

/// Post with its likers and comments
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostDetails {
    #[serde(flatten)]
    pub post: PostView,
    pub likes: Vec<String>,
    pub comments: Vec<Comment>,
}

impl From<Post> for PostDetails {
    fn from(post: Post) -> Self {
        Self {
            post: PostView::from(&post),
            likes: post.liker_ids,
            comments: post.comments,
        }
    }
}

/// User profile plus every post they authored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserDetails {
    #[serde(flatten)]
    pub user: UserSummary,
    pub posts: Vec<PostView>,
}

/// Task row of the moderation listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub category: String,
    pub reward_minutes: i64,
    #[serde(with = "timestamp")]
    pub deadline: DateTime<Utc>,
    pub created_by: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    pub participants_count: usize,
    pub completed_count: usize,
}

impl From<&CommunityTask> for TaskSummary {
    fn from(task: &CommunityTask) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            category: task.category.clone(),
            reward_minutes: task.reward_minutes,
            deadline: task.deadline,
            created_by: task.created_by.clone(),
            created_at: task.created_at,
            participants_count: task.participant_ids.len(),
            completed_count: task.completed_by_ids.len(),
        }
    }
}

/// User reference resolved for task details
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Participant {
    pub id: String,
    pub username: String,
    pub email: String,
}

/// Task with participant and completer ids resolved to users
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDetails {
    #[serde(flatten)]
    pub task: TaskSummary,
    pub participants: Vec<Participant>,
    pub completed_by: Vec<Participant>,
}
