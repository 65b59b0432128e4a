/// Admin API Endpoints
///
/// Thin handlers over the moderation services. Every success body carries
/// `"success": true`; failures render through `AdminError`.
use crate::{
    admin::{CategoryDraft, NewAdmin, TaskDraft, DEFAULT_WINDOW_DAYS},
    api::middleware::client_ip,
    auth::{issue_token, AdminAuthContext},
    context::AppContext,
    error::{AdminError, AdminResult},
    pagination::PageRequest,
};
use axum::{
    extract::{Path, Query, State},
    http::request::Parts,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Build admin API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        // Operators
        .route("/api/admin/login", post(login))
        .route("/api/admin/register", post(register))
        .route("/api/admin/profile", get(profile))
        .route("/api/admin/logs", get(list_logs))
        // Posts
        .route("/api/admin/posts", get(list_posts))
        .route("/api/admin/posts/:post_id", get(get_post).delete(delete_post))
        .route("/api/admin/posts/:post_id/content", put(update_post_content))
        .route("/api/admin/posts/:post_id/comments", get(list_comments))
        .route(
            "/api/admin/posts/:post_id/comments/:comment_id",
            delete(delete_comment),
        )
        // Users
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:user_id", get(get_user).delete(delete_user))
        .route("/api/admin/users/:user_id/suspend", post(suspend_user))
        // Analytics
        .route("/api/admin/analytics/summary", get(analytics_summary))
        // Community tasks
        .route(
            "/api/admin/community-tasks",
            get(list_tasks).post(create_task),
        )
        .route("/api/admin/community-tasks/stats", get(task_stats))
        .route(
            "/api/admin/community-tasks/:task_id",
            get(get_task).put(update_task).delete(delete_task),
        )
        // Task categories
        .route(
            "/api/admin/community-tasks/categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/api/admin/community-tasks/categories/:category_id",
            get(get_category).put(update_category).delete(delete_category),
        )
}

fn ok(mut body: Value) -> Json<Value> {
    if let Some(map) = body.as_object_mut() {
        map.insert("success".to_string(), Value::Bool(true));
    }
    Json(body)
}

fn message(text: String) -> Json<Value> {
    ok(json!({ "message": text }))
}

/// Caller address for unauthenticated routes
struct ClientAddress(Option<String>);

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for ClientAddress {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientAddress(client_ip(parts)))
    }
}

// ============================================================================
// Operators
// ============================================================================

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> AdminResult<Json<Value>> {
    let (Some(email), Some(password)) = (
        req.email.filter(|e| !e.is_empty()),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AdminError::InvalidInput(
            "Email and password are required".to_string(),
        ));
    };

    let admin = ctx.admins.login(&email, &password).await?;
    let token = issue_token(
        &admin.id,
        &ctx.config.authentication.jwt_secret,
        ctx.config.authentication.token_ttl_hours,
    )?;

    tracing::info!("Admin {} logged in", admin.id);

    Ok(ok(json!({ "token": token, "admin": admin })))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
    #[serde(rename = "registrationKey")]
    registration_key: Option<String>,
}

async fn register(
    State(ctx): State<AppContext>,
    ClientAddress(ip_address): ClientAddress,
    Json(req): Json<RegisterRequest>,
) -> AdminResult<Json<Value>> {
    let (Some(email), Some(password), Some(name), Some(key)) =
        (req.email, req.password, req.name, req.registration_key)
    else {
        return Err(AdminError::InvalidInput("All fields are required".to_string()));
    };

    // Registration is closed when no key is configured
    match &ctx.config.authentication.registration_key {
        Some(expected) if *expected == key => {}
        _ => {
            tracing::warn!("Admin registration with an invalid key for {}", email);
            return Err(AdminError::Unauthorized(
                "Invalid registration key".to_string(),
            ));
        }
    }

    let admin = ctx
        .admins
        .register(
            &NewAdmin {
                email,
                name,
                password,
            },
            ip_address,
        )
        .await?;

    Ok(ok(json!({ "admin": admin })))
}

async fn profile(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
) -> AdminResult<Json<Value>> {
    let admin = ctx.admins.profile(&auth.actor.admin_id).await?;
    Ok(ok(json!({ "admin": admin })))
}

#[derive(Debug, Deserialize)]
struct LimitParams {
    limit: Option<i64>,
}

async fn list_logs(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Query(params): Query<LimitParams>,
) -> AdminResult<Json<Value>> {
    let logs = ctx.audit.list(params.limit).await?;
    Ok(ok(json!({ "logs": logs })))
}

// ============================================================================
// Posts
// ============================================================================

async fn list_posts(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Query(page): Query<PageRequest>,
) -> AdminResult<Json<Value>> {
    let posts = ctx.posts.list_posts(&page).await?;
    Ok(ok(json!({ "posts": posts.items, "last_post": posts.next_cursor })))
}

async fn get_post(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Path(post_id): Path<String>,
) -> AdminResult<Json<Value>> {
    let post = ctx.posts.get_post(&post_id).await?;
    Ok(ok(json!({ "post": post })))
}

async fn delete_post(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(post_id): Path<String>,
) -> AdminResult<Json<Value>> {
    ctx.posts.delete_post(&post_id, &auth.actor).await?;
    Ok(message(format!("Post {} has been deleted", post_id)))
}

#[derive(Debug, Deserialize)]
struct ContentUpdate {
    content: Option<String>,
}

async fn update_post_content(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(post_id): Path<String>,
    Json(req): Json<ContentUpdate>,
) -> AdminResult<Json<Value>> {
    let content = req.content.unwrap_or_default();
    ctx.posts
        .edit_post_content(&post_id, &content, &auth.actor)
        .await?;
    Ok(message(format!("Post {} content updated", post_id)))
}

async fn list_comments(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Path(post_id): Path<String>,
    Query(page): Query<PageRequest>,
) -> AdminResult<Json<Value>> {
    let comments = ctx.posts.list_comments(&post_id, &page).await?;
    Ok(ok(json!({
        "comments": comments.items,
        "last_comment": comments.next_cursor,
    })))
}

async fn delete_comment(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> AdminResult<Json<Value>> {
    ctx.posts
        .delete_comment(&post_id, &comment_id, &auth.actor)
        .await?;
    Ok(message(format!(
        "Comment {} has been deleted from post {}",
        comment_id, post_id
    )))
}

// ============================================================================
// Users
// ============================================================================

async fn list_users(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Query(page): Query<PageRequest>,
) -> AdminResult<Json<Value>> {
    let users = ctx.users.list_users(&page).await?;
    Ok(ok(json!({ "users": users.items, "last_user": users.next_cursor })))
}

async fn get_user(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Path(user_id): Path<String>,
) -> AdminResult<Json<Value>> {
    let user = ctx.users.get_user_details(&user_id).await?;
    Ok(ok(json!({ "user": user })))
}

#[derive(Debug, Default, Deserialize)]
struct SuspendRequest {
    suspended: Option<bool>,
}

async fn suspend_user(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(user_id): Path<String>,
    body: Option<Json<SuspendRequest>>,
) -> AdminResult<Json<Value>> {
    let suspended = body
        .and_then(|Json(req)| req.suspended)
        .unwrap_or(true);

    ctx.users
        .set_suspended(&user_id, suspended, &auth.actor)
        .await?;

    let verb = if suspended { "suspended" } else { "unsuspended" };
    Ok(message(format!("User {} has been {}", user_id, verb)))
}

async fn delete_user(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(user_id): Path<String>,
) -> AdminResult<Json<Value>> {
    let deletion = ctx.users.delete_user_cascade(&user_id, &auth.actor).await?;
    Ok(message(format!(
        "User {} and {} posts have been deleted",
        user_id, deletion.posts_deleted
    )))
}

// ============================================================================
// Analytics
// ============================================================================

#[derive(Debug, Deserialize)]
struct SummaryParams {
    days: Option<i64>,
}

async fn analytics_summary(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Query(params): Query<SummaryParams>,
) -> AdminResult<Json<Value>> {
    let summary = ctx
        .analytics
        .summary(params.days.unwrap_or(DEFAULT_WINDOW_DAYS))
        .await?;
    Ok(ok(json!({ "summary": summary })))
}

// ============================================================================
// Community tasks
// ============================================================================

async fn list_tasks(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Query(page): Query<PageRequest>,
) -> AdminResult<Json<Value>> {
    let tasks = ctx.tasks.list_tasks(&page).await?;
    Ok(ok(json!({ "tasks": tasks.items, "last_task": tasks.next_cursor })))
}

async fn task_stats(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
) -> AdminResult<Json<Value>> {
    let stats = ctx.tasks.task_stats().await?;
    Ok(ok(json!({ "stats": stats })))
}

async fn get_task(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Path(task_id): Path<String>,
) -> AdminResult<Json<Value>> {
    let task = ctx.tasks.get_task(&task_id).await?;
    Ok(ok(json!({ "task": task })))
}

async fn create_task(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Json(draft): Json<TaskDraft>,
) -> AdminResult<Json<Value>> {
    let task = ctx.tasks.create_task(&draft, &auth.actor).await?;
    Ok(ok(json!({ "community_task": task })))
}

async fn update_task(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(task_id): Path<String>,
    Json(patch): Json<TaskDraft>,
) -> AdminResult<Json<Value>> {
    let task = ctx.tasks.update_task(&task_id, &patch, &auth.actor).await?;
    Ok(ok(json!({ "task": task })))
}

async fn delete_task(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(task_id): Path<String>,
) -> AdminResult<Json<Value>> {
    ctx.tasks.delete_task(&task_id, &auth.actor).await?;
    Ok(message(format!("Community task {} has been deleted", task_id)))
}

// ============================================================================
// Task categories
// ============================================================================

async fn list_categories(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Query(page): Query<PageRequest>,
) -> AdminResult<Json<Value>> {
    let categories = ctx.categories.list_categories(&page).await?;
    Ok(ok(json!({
        "categories": categories.items,
        "last_category": categories.next_cursor,
    })))
}

async fn get_category(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Path(category_id): Path<String>,
) -> AdminResult<Json<Value>> {
    let category = ctx.categories.get_category(&category_id).await?;
    Ok(ok(json!({ "category": category })))
}

async fn create_category(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Json(draft): Json<CategoryDraft>,
) -> AdminResult<Json<Value>> {
    let category = ctx.categories.create_category(&draft, &auth.actor).await?;
    Ok(ok(json!({ "category": category })))
}

async fn update_category(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(category_id): Path<String>,
    Json(patch): Json<CategoryDraft>,
) -> AdminResult<Json<Value>> {
    let category = ctx
        .categories
        .update_category(&category_id, &patch, &auth.actor)
        .await?;
    Ok(ok(json!({ "category": category })))
}

async fn delete_category(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(category_id): Path<String>,
) -> AdminResult<Json<Value>> {
    ctx.categories
        .delete_category(&category_id, &auth.actor)
        .await?;
    Ok(message(format!("Category {} has been deleted", category_id)))
}
