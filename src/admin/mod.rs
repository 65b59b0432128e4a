/// Admin and Moderation System
///
/// Moderation over the shared social-content store: paginated listings,
/// cascading deletes, suspension, community task and category management,
/// usage analytics and the audit trail every mutation writes to.

pub mod accounts;
pub mod analytics;
pub mod audit;
pub mod cascade;
pub mod categories;
pub mod posts;
pub mod tasks;
pub mod users;

pub use accounts::{AdminDirectory, NewAdmin};
pub use analytics::{AnalyticsAggregator, AnalyticsSummary, DEFAULT_WINDOW_DAYS};
pub use audit::{preview, ActionType, AdminActor, AdminLogEntry, AuditTrail};
pub use cascade::{CascadeCoordinator, CascadePlan};
pub use categories::{CategoryDraft, CategoryManager};
pub use posts::PostModeration;
pub use tasks::{TaskDraft, TaskManager, TaskStats};
pub use users::{UserDeletion, UserModeration};
