/// Optima admin backend
///
/// Moderation, audit and analytics over the schemaless document store shared
/// with the Optima social application.

pub mod admin;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pagination;
pub mod server;
pub mod social;
pub mod store;

pub use context::AppContext;
pub use error::{AdminError, AdminResult};
