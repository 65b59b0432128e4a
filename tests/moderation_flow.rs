/// End-to-end moderation flows over the library API
///
/// A wrapping store injects commit failures to check that a failed cascade
/// leaves no trace and that a failed audit append is reported as such.
use async_trait::async_trait;
use optima_admin::{
    admin::{ActionType, AdminActor, AuditTrail, PostModeration, UserModeration},
    error::{AdminError, AdminResult},
    pagination::PageRequest,
    social::SocialGraph,
    store::{Collection, Document, EntityStore, MemoryStore, Query, WriteOp},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Store that can be told to reject commits, all of them or only audit appends
struct FlakyStore {
    inner: MemoryStore,
    fail_all: AtomicBool,
    fail_audit: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_all: AtomicBool::new(false),
            fail_audit: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EntityStore for FlakyStore {
    async fn get(&self, collection: Collection, id: &str) -> AdminResult<Option<Document>> {
        self.inner.get(collection, id).await
    }

    async fn query(&self, collection: Collection, query: &Query) -> AdminResult<Vec<Document>> {
        self.inner.query(collection, query).await
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> AdminResult<()> {
        let touches_audit = ops.iter().any(|op| op.collection() == Collection::AdminLogs);
        if self.fail_all.load(Ordering::SeqCst)
            || (touches_audit && self.fail_audit.load(Ordering::SeqCst))
        {
            return Err(AdminError::Internal("store unavailable".to_string()));
        }
        self.inner.commit(ops).await
    }
}

struct Fixture {
    store: Arc<FlakyStore>,
    audit: AuditTrail,
    users: UserModeration,
    posts: PostModeration,
    social: SocialGraph,
    actor: AdminActor,
}

fn fixture() -> Fixture {
    let store = Arc::new(FlakyStore::new());
    let audit = AuditTrail::new(store.clone());
    Fixture {
        users: UserModeration::new(store.clone(), audit.clone()),
        posts: PostModeration::new(store.clone(), audit.clone()),
        social: SocialGraph::new(store.clone()),
        actor: AdminActor::new("admin-1").with_ip(Some("198.51.100.4".to_string())),
        audit,
        store,
    }
}

#[tokio::test]
async fn test_user_deletion_cascades_and_audits() {
    let f = fixture();
    let ana = f.social.register_user("ana@optima.io", "ana").await.unwrap();
    let ben = f.social.register_user("ben@optima.io", "ben").await.unwrap();
    for i in 0..3 {
        f.social.create_post(&ana.id, &format!("post {}", i)).await.unwrap();
    }
    let kept = f.social.create_post(&ben.id, "survivor").await.unwrap();

    let deletion = f.users.delete_user_cascade(&ana.id, &f.actor).await.unwrap();
    assert_eq!(deletion.posts_deleted, 3);

    assert!(f.store.inner.get(Collection::Users, &ana.id).await.unwrap().is_none());
    assert_eq!(f.store.inner.count(Collection::Posts).await, 1);
    assert!(f.store.inner.get(Collection::Posts, &kept.id).await.unwrap().is_some());

    let logs = f.audit.list(None).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action_type, ActionType::UserDeleted);
    assert_eq!(logs[0].admin_id, "admin-1");
    assert_eq!(logs[0].ip_address.as_deref(), Some("198.51.100.4"));
    assert_eq!(logs[0].details.get("posts_deleted"), Some(&serde_json::json!(3)));
}

#[tokio::test]
async fn test_failed_cascade_deletes_nothing_and_writes_no_audit() {
    let f = fixture();
    let ana = f.social.register_user("ana@optima.io", "ana").await.unwrap();
    f.social.create_post(&ana.id, "one").await.unwrap();
    f.social.create_post(&ana.id, "two").await.unwrap();

    f.store.fail_all.store(true, Ordering::SeqCst);
    let result = f.users.delete_user_cascade(&ana.id, &f.actor).await;
    f.store.fail_all.store(false, Ordering::SeqCst);

    assert!(matches!(result, Err(AdminError::Internal(_))));
    assert!(f.store.inner.get(Collection::Users, &ana.id).await.unwrap().is_some());
    assert_eq!(f.store.inner.count(Collection::Posts).await, 2);
    assert_eq!(f.store.inner.count(Collection::AdminLogs).await, 0);
}

#[tokio::test]
async fn test_audit_failure_is_reported_after_mutation() {
    let f = fixture();
    let ana = f.social.register_user("ana@optima.io", "ana").await.unwrap();
    let post = f.social.create_post(&ana.id, "doomed").await.unwrap();

    f.store.fail_audit.store(true, Ordering::SeqCst);
    let result = f.posts.delete_post(&post.id, &f.actor).await;

    match result {
        Err(AdminError::AuditWrite { action, .. }) => assert_eq!(action, "POST_DELETED"),
        other => panic!("expected audit write failure, got {:?}", other),
    }
    // The deletion itself went through
    assert!(f.store.inner.get(Collection::Posts, &post.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_missing_targets_write_no_audit() {
    let f = fixture();

    assert!(matches!(
        f.users.set_suspended("ghost", true, &f.actor).await,
        Err(AdminError::NotFound(_))
    ));
    assert!(matches!(
        f.users.delete_user_cascade("ghost", &f.actor).await,
        Err(AdminError::NotFound(_))
    ));
    assert!(matches!(
        f.posts.delete_post("ghost", &f.actor).await,
        Err(AdminError::NotFound(_))
    ));
    assert_eq!(f.store.inner.count(Collection::AdminLogs).await, 0);
}

#[tokio::test]
async fn test_comment_moderation_keeps_other_comments() {
    let f = fixture();
    let ana = f.social.register_user("ana@optima.io", "ana").await.unwrap();
    let ben = f.social.register_user("ben@optima.io", "ben").await.unwrap();
    let post = f.social.create_post(&ana.id, "thread").await.unwrap();

    let rude = f.social.add_comment(&post.id, &ben.id, "rude").await.unwrap();
    let kind = f.social.add_comment(&post.id, &ana.id, "kind").await.unwrap();

    f.posts.delete_comment(&post.id, &rude.id, &f.actor).await.unwrap();

    let comments = f.posts.list_comments(&post.id, &PageRequest::default()).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments.items[0].id, kind.id);

    // A second delete finds nothing and is not audited
    assert!(matches!(
        f.posts.delete_comment(&post.id, &rude.id, &f.actor).await,
        Err(AdminError::NotFound(_))
    ));
    let logs = f.audit.list(None).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action_type, ActionType::CommentDeleted);
}

#[tokio::test]
async fn test_suspension_toggle_is_audited_each_time() {
    let f = fixture();
    let ana = f.social.register_user("ana@optima.io", "ana").await.unwrap();

    let user = f.users.set_suspended(&ana.id, true, &f.actor).await.unwrap();
    assert!(user.suspended);
    let user = f.users.set_suspended(&ana.id, false, &f.actor).await.unwrap();
    assert!(!user.suspended);

    let actions: Vec<_> = f
        .audit
        .list(None)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.action_type)
        .collect();
    assert_eq!(actions, vec![ActionType::UserUnsuspended, ActionType::UserSuspended]);
}
