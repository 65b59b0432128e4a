/// Cascading deletion coordinator
///
/// A deletion is planned in one read phase (target plus every dependent id)
/// and applied as a single atomic commit. Nothing outside that commit deletes
/// documents, so a failed commit leaves the store untouched.
use crate::{
    error::AdminResult,
    metrics,
    models::UserAccount,
    store::{fetch_required, Collection, EntityStore, FilterOp, Query, WriteOp},
};
use std::sync::Arc;

/// Target document plus the documents that exist only because of it
#[derive(Debug, Clone, PartialEq)]
pub struct CascadePlan {
    target: (Collection, String),
    dependents: Vec<(Collection, String)>,
}

impl CascadePlan {
    pub fn new(collection: Collection, id: impl Into<String>) -> Self {
        Self {
            target: (collection, id.into()),
            dependents: Vec::new(),
        }
    }

    pub fn with_dependents<I>(mut self, collection: Collection, ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.dependents
            .extend(ids.into_iter().map(|id| (collection, id)));
        self
    }

    pub fn dependent_count(&self) -> usize {
        self.dependents.len()
    }

    /// Dependents first, then the target
    fn into_ops(self) -> Vec<WriteOp> {
        let mut ops: Vec<WriteOp> = self
            .dependents
            .into_iter()
            .map(|(collection, id)| WriteOp::delete(collection, id))
            .collect();
        ops.push(WriteOp::delete(self.target.0, self.target.1));
        ops
    }
}

#[derive(Clone)]
pub struct CascadeCoordinator {
    store: Arc<dyn EntityStore>,
}

impl CascadeCoordinator {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Read phase of a user deletion: the account and every post it authored
    ///
    /// Fails with NotFound before any dependent is read.
    pub async fn plan_user_deletion(&self, user_id: &str) -> AdminResult<(UserAccount, CascadePlan)> {
        let user: UserAccount = fetch_required(self.store.as_ref(), Collection::Users, user_id, "User")
            .await?
            .decode()?;

        let posts = self
            .store
            .query(
                Collection::Posts,
                &Query::new().filter("userId", FilterOp::Eq, user_id),
            )
            .await?;

        let plan = CascadePlan::new(Collection::Users, user_id)
            .with_dependents(Collection::Posts, posts.into_iter().map(|doc| doc.id));

        Ok((user, plan))
    }

    /// Apply a plan as one commit, returning the number of dependents removed
    pub async fn execute(&self, plan: CascadePlan) -> AdminResult<usize> {
        let target = plan.target.clone();
        let dependents = plan.dependent_count();

        self.store.commit(plan.into_ops()).await?;

        metrics::record_cascade(dependents);
        tracing::debug!(
            "Cascade removed {}/{} and {} dependents",
            target.0,
            target.1,
            dependents
        );

        Ok(dependents)
    }
}
