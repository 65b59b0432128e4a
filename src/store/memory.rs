/// In-process document store
///
/// Used for development runs (`ADMIN_STORE_BACKEND=memory`) and tests. A commit
/// is staged against a copy of the touched documents under the write lock and
/// only published when every operation succeeded.
use super::{apply_op, apply_query, Collection, Document, EntityStore, Fields, Query, WriteOp};
use crate::{error::AdminResult, metrics};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

type Collections = HashMap<Collection, BTreeMap<String, Fields>>;

#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get(&self, collection: Collection, id: &str) -> AdminResult<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn query(&self, collection: Collection, query: &Query) -> AdminResult<Vec<Document>> {
        let docs: Vec<Document> = {
            let collections = self.collections.read().await;
            collections
                .get(&collection)
                .map(|docs| {
                    docs.iter()
                        .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };

        tracing::debug!("memory query on {} over {} documents", collection, docs.len());
        Ok(apply_query(docs, query))
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> AdminResult<()> {
        let mut collections = self.collections.write().await;
        let mut staged: HashMap<(Collection, String), Option<Fields>> = HashMap::new();

        for op in &ops {
            let key = (op.collection(), op.id().to_string());
            let current = match staged.get(&key) {
                Some(state) => state.clone(),
                None => collections
                    .get(&key.0)
                    .and_then(|docs| docs.get(&key.1))
                    .cloned(),
            };
            let next = apply_op(current, op).inspect_err(|_| {
                metrics::record_store_commit("memory", false);
            })?;
            staged.insert(key, next);
        }

        for ((collection, id), state) in staged {
            let docs = collections.entry(collection).or_default();
            match state {
                Some(fields) => {
                    docs.insert(id, fields);
                }
                None => {
                    docs.remove(&id);
                }
            }
        }

        metrics::record_store_commit("memory", true);
        Ok(())
    }
}
