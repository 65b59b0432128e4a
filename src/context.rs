/// Application context and dependency injection
use crate::{
    admin::{
        AdminDirectory, AnalyticsAggregator, AuditTrail, CategoryManager, PostModeration,
        TaskManager, UserModeration,
    },
    config::{ServerConfig, StoreBackend},
    error::AdminResult,
    social::SocialGraph,
    store::{EntityStore, MemoryStore, SqliteStore},
};
use std::sync::Arc;

/// Application context holding all shared services
///
/// Every service holds a clone of the same store handle.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn EntityStore>,
    pub audit: AuditTrail,
    // Moderation
    pub users: UserModeration,
    pub posts: PostModeration,
    pub tasks: TaskManager,
    pub categories: CategoryManager,
    pub analytics: AnalyticsAggregator,
    // Operators
    pub admins: AdminDirectory,
    // User-side writes
    pub social: SocialGraph,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AdminResult<Self> {
        config.validate()?;

        let store: Arc<dyn EntityStore> = match config.storage.backend {
            StoreBackend::Memory => {
                tracing::warn!("Using the in-memory store; data is lost on shutdown");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Sqlite => {
                tracing::info!("Opening SQLite store at {:?}", config.storage.sqlite_path);
                Arc::new(SqliteStore::open(&config.storage.sqlite_path).await?)
            }
        };

        store.ping().await?;

        Ok(Self::with_store(config, store))
    }

    /// Wire every service around an already opened store
    pub fn with_store(config: ServerConfig, store: Arc<dyn EntityStore>) -> Self {
        let audit = AuditTrail::new(store.clone());

        Self {
            config: Arc::new(config),
            users: UserModeration::new(store.clone(), audit.clone()),
            posts: PostModeration::new(store.clone(), audit.clone()),
            tasks: TaskManager::new(store.clone(), audit.clone()),
            categories: CategoryManager::new(store.clone(), audit.clone()),
            analytics: AnalyticsAggregator::new(store.clone()),
            admins: AdminDirectory::new(store.clone(), audit.clone()),
            social: SocialGraph::new(store.clone()),
            audit,
            store,
        }
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }

    /// Release the store handle
    pub async fn shutdown(&self) {
        tracing::info!("Closing entity store");
        self.store.close().await;
    }
}
