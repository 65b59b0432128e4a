/// Admin account directory
use super::audit::{ActionType, AdminActor, AuditTrail};
use crate::{
    auth::{hash_password, verify_password},
    error::{AdminError, AdminResult},
    models::{AdminAccount, AdminProfile},
    store::{encode, fetch_required, Collection, EntityStore, FilterOp, Query},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

/// Registration request for a new operator
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAdmin {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Clone)]
pub struct AdminDirectory {
    store: Arc<dyn EntityStore>,
    audit: AuditTrail,
}

impl AdminDirectory {
    pub fn new(store: Arc<dyn EntityStore>, audit: AuditTrail) -> Self {
        Self { store, audit }
    }

    pub async fn find_by_email(&self, email: &str) -> AdminResult<Option<AdminAccount>> {
        self.store
            .query(
                Collection::Admins,
                &Query::new()
                    .filter("email", FilterOp::Eq, email.trim().to_lowercase())
                    .limit(1),
            )
            .await?
            .first()
            .map(|doc| doc.decode())
            .transpose()
    }

    /// Create an operator account; the new admin is the actor of its own
    /// `ADMIN_CREATED` entry
    pub async fn register(&self, request: &NewAdmin, ip_address: Option<String>) -> AdminResult<AdminProfile> {
        request.validate().map_err(|e| {
            let message = e
                .field_errors()
                .values()
                .flat_map(|errors| errors.iter())
                .filter_map(|error| error.message.as_ref().map(|m| m.to_string()))
                .next()
                .unwrap_or_else(|| "Invalid registration".to_string());
            AdminError::InvalidInput(message)
        })?;

        let email = request.email.trim().to_lowercase();
        if self.find_by_email(&email).await?.is_some() {
            return Err(AdminError::Conflict(format!(
                "Admin with email {} already exists",
                email
            )));
        }

        let account = AdminAccount {
            id: self.store.new_id(),
            email,
            name: request.name.trim().to_string(),
            password_hash: hash_password(&request.password)?,
            created_at: Utc::now(),
        };

        self.store
            .set(Collection::Admins, &account.id, encode(&account)?)
            .await?;

        tracing::info!("Admin account {} registered", account.id);

        let actor = AdminActor::new(account.id.clone()).with_ip(ip_address);
        self.audit
            .record(
                &actor,
                ActionType::AdminCreated,
                json!({ "admin_email": account.email }),
            )
            .await?;

        Ok(account.into())
    }

    pub async fn profile(&self, admin_id: &str) -> AdminResult<AdminProfile> {
        let account: AdminAccount = fetch_required(self.store.as_ref(), Collection::Admins, admin_id, "Admin")
            .await?
            .decode()?;
        Ok(account.into())
    }

    /// Check credentials; unknown email and wrong password are indistinguishable
    pub async fn login(&self, email: &str, password: &str) -> AdminResult<AdminProfile> {
        let invalid = || AdminError::Unauthorized("Invalid credentials".to_string());

        let account = self.find_by_email(email).await?.ok_or_else(invalid)?;
        if !verify_password(password, &account.password_hash) {
            tracing::warn!("Failed login for admin {}", account.id);
            return Err(invalid());
        }

        Ok(account.into())
    }
}
