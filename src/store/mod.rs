/// Entity store port
///
/// Abstract interface over the schemaless document collections that hold all
/// persisted state. Components never hold documents across requests; they
/// fetch, project into typed records (see `crate::models`) and discard.
///
/// Adapters only implement `get`, `query` and `commit`. Single-document
/// writes are one-operation commits, so every adapter gets the same
/// all-or-nothing semantics for free.
pub mod memory;
pub mod sqlite;
pub mod timestamp;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::{AdminError, AdminResult};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

/// Document body: field name to JSON value
pub type Fields = Map<String, Value>;

/// Collections of the shared social-content store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    Posts,
    CommunityTasks,
    TaskCategories,
    Admins,
    AdminLogs,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Posts => "posts",
            Collection::CommunityTasks => "community_tasks",
            Collection::TaskCategories => "categories",
            Collection::Admins => "admins",
            Collection::AdminLogs => "admin_logs",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document: store-assigned id plus its fields
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Decode into a typed record, injecting the document id as `id`
    pub fn decode<T: DeserializeOwned>(&self) -> AdminResult<T> {
        let mut fields = self.fields.clone();
        fields.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(fields)).map_err(|e| {
            AdminError::Internal(format!("Malformed document {}: {}", self.id, e))
        })
    }
}

/// Encode a typed record into document fields (the `id` field is not stored)
pub fn encode<T: Serialize>(record: &T) -> AdminResult<Fields> {
    match serde_json::to_value(record)? {
        Value::Object(mut fields) => {
            fields.remove("id");
            Ok(fields)
        }
        other => Err(AdminError::Internal(format!(
            "Record did not encode to an object: {}",
            other
        ))),
    }
}

/// Comparison applied by a query filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lt,
    ArrayContains,
    /// Field value equals one element of the filter's array value
    In,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Query over one collection
///
/// Documents lacking the order field are excluded from ordered results.
/// Ties on the order field are broken by document id in the same direction.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
    pub start_after: Option<Document>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, cursor: Document) -> Self {
        self.start_after = Some(cursor);
        self
    }
}

/// Field-level change applied by an update
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDelta {
    Set(Value),
    /// Append each value not already present
    ArrayUnion(Vec<Value>),
    /// Remove every element equal to one of the values
    ArrayRemove(Vec<Value>),
    Increment(i64),
}

pub type Deltas = Vec<(String, FieldDelta)>;

/// Guard evaluated against the stored document inside the commit
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    ArrayContains { field: String, value: Value },
    ArrayLacks { field: String, value: Value },
}

/// One operation of an atomic commit
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set {
        collection: Collection,
        id: String,
        fields: Fields,
    },
    Update {
        collection: Collection,
        id: String,
        deltas: Deltas,
        precondition: Option<Precondition>,
    },
    Delete {
        collection: Collection,
        id: String,
    },
}

impl WriteOp {
    pub fn set(collection: Collection, id: impl Into<String>, fields: Fields) -> Self {
        WriteOp::Set {
            collection,
            id: id.into(),
            fields,
        }
    }

    pub fn update(collection: Collection, id: impl Into<String>, deltas: Deltas) -> Self {
        WriteOp::Update {
            collection,
            id: id.into(),
            deltas,
            precondition: None,
        }
    }

    pub fn guarded_update(
        collection: Collection,
        id: impl Into<String>,
        deltas: Deltas,
        precondition: Precondition,
    ) -> Self {
        WriteOp::Update {
            collection,
            id: id.into(),
            deltas,
            precondition: Some(precondition),
        }
    }

    pub fn delete(collection: Collection, id: impl Into<String>) -> Self {
        WriteOp::Delete {
            collection,
            id: id.into(),
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            WriteOp::Set { collection, .. }
            | WriteOp::Update { collection, .. }
            | WriteOp::Delete { collection, .. } => *collection,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            WriteOp::Set { id, .. } | WriteOp::Update { id, .. } | WriteOp::Delete { id, .. } => id,
        }
    }
}

/// The entity store port
///
/// One process-wide handle is constructed at startup and shared by reference
/// (`Arc<dyn EntityStore>`) with every component. Every call is an await point;
/// dropping the calling future stops the operation without retrying.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Allocate a store-assigned document id
    fn new_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    async fn get(&self, collection: Collection, id: &str) -> AdminResult<Option<Document>>;

    async fn query(&self, collection: Collection, query: &Query) -> AdminResult<Vec<Document>>;

    /// Apply every operation or none of them
    async fn commit(&self, ops: Vec<WriteOp>) -> AdminResult<()>;

    async fn set(&self, collection: Collection, id: &str, fields: Fields) -> AdminResult<()> {
        self.commit(vec![WriteOp::set(collection, id, fields)]).await
    }

    /// Fails with NotFound when the document does not exist
    async fn update(&self, collection: Collection, id: &str, deltas: Deltas) -> AdminResult<()> {
        self.commit(vec![WriteOp::update(collection, id, deltas)]).await
    }

    /// Deleting a missing document is not an error
    async fn delete(&self, collection: Collection, id: &str) -> AdminResult<()> {
        self.commit(vec![WriteOp::delete(collection, id)]).await
    }

    async fn ping(&self) -> AdminResult<()> {
        Ok(())
    }

    /// Release connections; called once at shutdown
    async fn close(&self) {}
}

/// Fetch a document or fail with NotFound
pub async fn fetch_required(
    store: &dyn EntityStore,
    collection: Collection,
    id: &str,
    label: &str,
) -> AdminResult<Document> {
    store
        .get(collection, id)
        .await?
        .ok_or_else(|| AdminError::not_found(label, id))
}

// ============================================================================
// Evaluation shared by the adapters
// ============================================================================

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over field values: type rank first, then natural order
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Ordering::Equal,
        _ => a == b,
    }
}

/// Whether a document satisfies a filter; range filters only match same-typed values
pub fn matches_filter(fields: &Fields, filter: &Filter) -> bool {
    let Some(value) = fields.get(&filter.field) else {
        return false;
    };

    match filter.op {
        FilterOp::Eq => same_value(value, &filter.value),
        FilterOp::Gte => {
            type_rank(value) == type_rank(&filter.value)
                && compare_values(value, &filter.value) != Ordering::Less
        }
        FilterOp::Lt => {
            type_rank(value) == type_rank(&filter.value)
                && compare_values(value, &filter.value) == Ordering::Less
        }
        FilterOp::ArrayContains => value
            .as_array()
            .map(|items| items.iter().any(|item| same_value(item, &filter.value)))
            .unwrap_or(false),
        FilterOp::In => filter
            .value
            .as_array()
            .map(|candidates| candidates.iter().any(|c| same_value(value, c)))
            .unwrap_or(false),
    }
}

fn order_key<'a>(doc: &'a Document, order: Option<&OrderBy>) -> (Option<&'a Value>, &'a str) {
    (order.and_then(|o| doc.fields.get(&o.field)), doc.id.as_str())
}

fn compare_keys(
    a: (Option<&Value>, &str),
    b: (Option<&Value>, &str),
    direction: Direction,
) -> Ordering {
    let by_value = match (a.0, b.0) {
        (Some(x), Some(y)) => compare_values(x, y),
        _ => Ordering::Equal,
    };
    let ordering = by_value.then_with(|| a.1.cmp(b.1));
    match direction {
        Direction::Ascending => ordering,
        Direction::Descending => ordering.reverse(),
    }
}

/// Filter, order, resume after the cursor and limit an in-memory candidate set
pub fn apply_query(mut docs: Vec<Document>, query: &Query) -> Vec<Document> {
    docs.retain(|doc| query.filters.iter().all(|f| matches_filter(&doc.fields, f)));

    let order = query.order_by.as_ref();
    let direction = order.map(|o| o.direction).unwrap_or(Direction::Ascending);
    if let Some(order) = order {
        docs.retain(|doc| doc.fields.contains_key(&order.field));
    }

    docs.sort_by(|a, b| compare_keys(order_key(a, order), order_key(b, order), direction));

    if let Some(cursor) = &query.start_after {
        let cursor_key = order_key(cursor, order);
        docs.retain(|doc| {
            compare_keys(order_key(doc, order), cursor_key, direction) == Ordering::Greater
        });
    }

    if let Some(limit) = query.limit {
        docs.truncate(limit);
    }

    docs
}

/// Check a commit precondition against the current document state
pub fn check_precondition(fields: Option<&Fields>, precondition: &Precondition) -> AdminResult<()> {
    let contains = |field: &str, value: &Value| {
        fields
            .and_then(|f| f.get(field))
            .and_then(Value::as_array)
            .map(|items| items.iter().any(|item| same_value(item, value)))
            .unwrap_or(false)
    };

    match precondition {
        Precondition::ArrayContains { field, value } if !contains(field, value) => Err(
            AdminError::PreconditionFailed(format!("{} no longer contains {}", field, value)),
        ),
        Precondition::ArrayLacks { field, value } if contains(field, value) => Err(
            AdminError::PreconditionFailed(format!("{} already contains {}", field, value)),
        ),
        _ => Ok(()),
    }
}

/// Apply field deltas in place
pub fn apply_deltas(fields: &mut Fields, deltas: &[(String, FieldDelta)]) {
    for (field, delta) in deltas {
        match delta {
            FieldDelta::Set(value) => {
                fields.insert(field.clone(), value.clone());
            }
            FieldDelta::ArrayUnion(values) => {
                let entry = fields
                    .entry(field.clone())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if !entry.is_array() {
                    *entry = Value::Array(Vec::new());
                }
                if let Value::Array(items) = entry {
                    for value in values {
                        if !items.iter().any(|item| same_value(item, value)) {
                            items.push(value.clone());
                        }
                    }
                }
            }
            FieldDelta::ArrayRemove(values) => {
                let entry = fields
                    .entry(field.clone())
                    .or_insert_with(|| Value::Array(Vec::new()));
                match entry {
                    Value::Array(items) => {
                        items.retain(|item| !values.iter().any(|v| same_value(item, v)))
                    }
                    other => *other = Value::Array(Vec::new()),
                }
            }
            FieldDelta::Increment(by) => {
                let next = match fields.get(field) {
                    Some(Value::Number(n)) if n.is_i64() => Value::from(n.as_i64().unwrap_or(0) + by),
                    Some(Value::Number(n)) => Value::from(n.as_f64().unwrap_or(0.0) + *by as f64),
                    _ => Value::from(*by),
                };
                fields.insert(field.clone(), next);
            }
        }
    }
}

/// Compute the state of one document after a write operation (None = deleted)
pub fn apply_op(current: Option<Fields>, op: &WriteOp) -> AdminResult<Option<Fields>> {
    match op {
        WriteOp::Set { fields, .. } => Ok(Some(fields.clone())),
        WriteOp::Update {
            collection,
            id,
            deltas,
            precondition,
        } => {
            if let Some(precondition) = precondition {
                check_precondition(current.as_ref(), precondition)?;
            }
            let mut fields = current.ok_or_else(|| {
                AdminError::NotFound(format!("Document {}/{} not found", collection, id))
            })?;
            apply_deltas(&mut fields, deltas);
            Ok(Some(fields))
        }
        WriteOp::Delete { .. } => Ok(None),
    }
}
