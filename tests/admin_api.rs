/// Admin HTTP API driven through the router without a listener
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use optima_admin::{
    config::ServerConfig, context::AppContext, server::build_router, store::MemoryStore,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    ctx: AppContext,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let ctx = AppContext::with_store(ServerConfig::for_tests(), Arc::new(MemoryStore::new()));
        let router = build_router(ctx.clone());
        Self { ctx, router }
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Register an operator and return a bearer token
    async fn admin_token(&self) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/admin/register",
                None,
                Some(json!({
                    "email": "root@optima.io",
                    "password": "correct horse",
                    "name": "Root",
                    "registrationKey": "let-me-in",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);

        let (status, body) = self
            .call(
                "POST",
                "/api/admin/login",
                None,
                Some(json!({"email": "root@optima.io", "password": "correct horse"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["success"], json!(true));
        assert!(body["admin"].get("password").is_none());

        body["token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_and_fallback() {
    let app = TestApp::new();

    let (status, body) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));

    let (status, body) = app.call("GET", "/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn test_authentication_required() {
    let app = TestApp::new();

    let (status, body) = app.call("GET", "/api/admin/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));

    let (status, _) = app
        .call("GET", "/api/admin/users", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_registration_key_and_credentials() {
    let app = TestApp::new();

    let (status, body) = app
        .call(
            "POST",
            "/api/admin/register",
            None,
            Some(json!({
                "email": "root@optima.io",
                "password": "correct horse",
                "name": "Root",
                "registrationKey": "wrong",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("Invalid registration key"));

    let (status, _) = app
        .call("POST", "/api/admin/register", None, Some(json!({"email": "x"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let token = app.admin_token().await;

    let (status, body) = app
        .call(
            "POST",
            "/api/admin/login",
            None,
            Some(json!({"email": "root@optima.io", "password": "nope"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("Invalid credentials"));

    let (status, body) = app.call("GET", "/api/admin/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["admin"]["email"], json!("root@optima.io"));
}

#[tokio::test]
async fn test_user_moderation_endpoints() {
    let app = TestApp::new();
    let token = app.admin_token().await;

    let ana = app.ctx.social.register_user("ana@optima.io", "ana").await.unwrap();
    app.ctx.social.create_post(&ana.id, "first").await.unwrap();
    app.ctx.social.create_post(&ana.id, "second").await.unwrap();

    let (status, body) = app
        .call("GET", "/api/admin/users?limit=10", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["last_user"], Value::Null);

    let uri = format!("/api/admin/users/{}/suspend", ana.id);
    let (status, body) = app
        .call("POST", &uri, Some(&token), Some(json!({"suspended": true})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!(format!("User {} has been suspended", ana.id)));

    let uri = format!("/api/admin/users/{}", ana.id);
    let (status, body) = app.call("GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["suspended"], json!(true));
    assert_eq!(body["user"]["posts"].as_array().map(Vec::len), Some(2));

    let (status, body) = app.call("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["message"],
        json!(format!("User {} and 2 posts have been deleted", ana.id))
    );

    let (status, body) = app.call("GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));

    // ADMIN_CREATED, USER_SUSPENDED, USER_DELETED
    let (status, body) = app.call("GET", "/api/admin/logs", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<_> = body["logs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["action_type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(actions.len(), 3);
    assert!(actions.contains(&"USER_DELETED".to_string()));
    assert!(actions.contains(&"USER_SUSPENDED".to_string()));
}

#[tokio::test]
async fn test_post_pagination_cursor() {
    let app = TestApp::new();
    let token = app.admin_token().await;

    let ana = app.ctx.social.register_user("ana@optima.io", "ana").await.unwrap();
    for i in 0..5 {
        app.ctx
            .social
            .create_post(&ana.id, &format!("post {}", i))
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    let mut uri = "/api/admin/posts?limit=2".to_string();
    loop {
        let (status, body) = app.call("GET", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        for post in body["posts"].as_array().unwrap() {
            seen.push(post["id"].as_str().unwrap().to_string());
        }
        match body["last_post"].as_str() {
            Some(cursor) => uri = format!("/api/admin/posts?limit=2&startAfter={}", cursor),
            None => break,
        }
    }

    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 5);
}

#[tokio::test]
async fn test_community_task_endpoints() {
    let app = TestApp::new();
    let token = app.admin_token().await;

    let (status, body) = app
        .call(
            "POST",
            "/api/admin/community-tasks",
            Some(&token),
            Some(json!({
                "title": "Beach cleanup",
                "category": "environment",
                "reward_minutes": "45",
                "deadline": "31/12/2099 18:00",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let task_id = body["community_task"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .call(
            "POST",
            "/api/admin/community-tasks",
            Some(&token),
            Some(json!({
                "title": "Past task",
                "category": "environment",
                "reward_minutes": 10,
                "deadline": "01/01/2001 10:00",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Deadline must be a future date"));

    let (status, body) = app
        .call("GET", "/api/admin/community-tasks/stats", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["total_tasks"], json!(1));
    assert_eq!(body["stats"]["active_tasks"], json!(1));

    let uri = format!("/api/admin/community-tasks/{}", task_id);
    let (status, body) = app
        .call("PUT", &uri, Some(&token), Some(json!({"reward_minutes": 60})))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["task"]["reward_minutes"], json!(60));

    let (status, _) = app.call("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call("GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_category_endpoints() {
    let app = TestApp::new();
    let token = app.admin_token().await;

    let draft = json!({
        "category_name": "Environment",
        "category_type": "outdoor",
        "description": "Cleanups and planting",
    });
    let (status, body) = app
        .call("POST", "/api/admin/community-tasks/categories", Some(&token), Some(draft.clone()))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let category_id = body["category"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .call("POST", "/api/admin/community-tasks/categories", Some(&token), Some(draft))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .call("GET", "/api/admin/community-tasks/categories", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["categories"].as_array().map(Vec::len), Some(1));

    let uri = format!("/api/admin/community-tasks/categories/{}", category_id);
    let (status, _) = app.call("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call("GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_analytics_summary() {
    let app = TestApp::new();
    let token = app.admin_token().await;

    let ana = app.ctx.social.register_user("ana@optima.io", "ana").await.unwrap();
    let post = app.ctx.social.create_post(&ana.id, "hello").await.unwrap();
    app.ctx.social.add_comment(&post.id, &ana.id, "me again").await.unwrap();

    let (status, body) = app
        .call("GET", "/api/admin/analytics/summary?days=7", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let summary = &body["summary"];
    assert_eq!(summary["total_users"], json!(1));
    assert_eq!(summary["total_posts"], json!(1));
    assert_eq!(summary["total_comments"], json!(1));
    assert_eq!(summary["period_days"], json!(7));

    let (status, _) = app
        .call("GET", "/api/admin/analytics/summary?days=-1", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call("GET", "/api/admin/analytics/summary?days=1000000000", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}
