/// SQLite-backed document store
///
/// Every collection lives in one `documents` table holding JSON bodies.
/// Filters, ordering and cursors are pushed down with `json_extract`; each
/// commit runs in a single transaction.
use super::{apply_op, Collection, Direction, Document, EntityStore, Fields, FilterOp, Query, WriteOp};
use crate::{
    db::{self, DatabaseOptions},
    error::{AdminError, AdminResult},
    metrics,
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::path::Path;

/// Bound SQL parameter
#[derive(Debug, Clone)]
enum Param {
    Text(String),
    Int(i64),
    Real(f64),
}

impl Param {
    fn from_value(value: &Value) -> AdminResult<Self> {
        match value {
            Value::String(s) => Ok(Param::Text(s.clone())),
            Value::Bool(b) => Ok(Param::Int(i64::from(*b))),
            Value::Number(n) => Ok(match n.as_i64() {
                Some(i) => Param::Int(i),
                None => Param::Real(n.as_f64().unwrap_or(0.0)),
            }),
            other => Err(AdminError::InvalidInput(format!(
                "Unsupported filter value: {}",
                other
            ))),
        }
    }
}

/// SQL guard restricting a comparison to values of the same JSON type
fn type_guard(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "json_type(data, ?) = 'text'",
        Value::Number(_) => "json_type(data, ?) IN ('integer', 'real')",
        Value::Bool(_) => "json_type(data, ?) IN ('true', 'false')",
        _ => "json_type(data, ?) = 'null'",
    }
}

fn json_path(field: &str) -> AdminResult<Param> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AdminError::InvalidInput(format!("Invalid field name: {}", field)));
    }
    Ok(Param::Text(format!("$.{}", field)))
}

fn decode_row(row: &SqliteRow) -> AdminResult<Document> {
    let id: String = row.try_get("id")?;
    let data: String = row.try_get("data")?;
    match serde_json::from_str::<Value>(&data)? {
        Value::Object(fields) => Ok(Document::new(id, fields)),
        _ => Err(AdminError::Internal(format!("Document {} is not an object", id))),
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the store at a file path
    pub async fn open(path: &Path) -> AdminResult<Self> {
        let pool = db::create_pool(path, DatabaseOptions::default()).await?;
        Self::from_pool(pool).await
    }

    /// Throwaway store backed by an in-memory database
    pub async fn in_memory() -> AdminResult<Self> {
        Self::from_pool(db::create_memory_pool().await?).await
    }

    pub async fn from_pool(pool: SqlitePool) -> AdminResult<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        db::test_connection(&pool).await?;

        Ok(Self { pool })
    }

    fn build_select(collection: Collection, query: &Query) -> AdminResult<(String, Vec<Param>)> {
        let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?");
        let mut params = vec![Param::Text(collection.as_str().to_string())];

        for filter in &query.filters {
            let path = json_path(&filter.field)?;
            match filter.op {
                FilterOp::Eq if filter.value.is_null() => {
                    sql.push_str(" AND json_type(data, ?) = 'null'");
                    params.push(path);
                }
                FilterOp::Eq | FilterOp::Gte | FilterOp::Lt => {
                    let cmp = match filter.op {
                        FilterOp::Eq => "=",
                        FilterOp::Gte => ">=",
                        _ => "<",
                    };
                    sql.push_str(&format!(
                        " AND {} AND json_extract(data, ?) {} ?",
                        type_guard(&filter.value),
                        cmp
                    ));
                    params.push(path.clone());
                    params.push(path);
                    params.push(Param::from_value(&filter.value)?);
                }
                FilterOp::In => {
                    let candidates = filter.value.as_array().ok_or_else(|| {
                        AdminError::InvalidInput(format!("In filter on {} needs an array", filter.field))
                    })?;
                    sql.push_str(" AND json_extract(data, ?) IN (SELECT value FROM json_each(?))");
                    params.push(path);
                    params.push(Param::Text(Value::Array(candidates.clone()).to_string()));
                }
                FilterOp::ArrayContains => {
                    sql.push_str(
                        " AND EXISTS (SELECT 1 FROM json_each(data, ?) WHERE json_each.value = ?)",
                    );
                    params.push(path);
                    params.push(Param::from_value(&filter.value)?);
                }
            }
        }

        match &query.order_by {
            Some(order) => {
                let path = json_path(&order.field)?;
                let (cmp, dir) = match order.direction {
                    Direction::Ascending => (">", "ASC"),
                    Direction::Descending => ("<", "DESC"),
                };

                sql.push_str(" AND json_extract(data, ?) IS NOT NULL");
                params.push(path.clone());

                if let Some(cursor) = &query.start_after {
                    match cursor.get(&order.field) {
                        Some(value) => {
                            let value = Param::from_value(value)?;
                            sql.push_str(&format!(
                                " AND (json_extract(data, ?) {cmp} ? OR (json_extract(data, ?) = ? AND id {cmp} ?))"
                            ));
                            params.push(path.clone());
                            params.push(value.clone());
                            params.push(path.clone());
                            params.push(value);
                            params.push(Param::Text(cursor.id.clone()));
                        }
                        None => {
                            sql.push_str(&format!(" AND id {cmp} ?"));
                            params.push(Param::Text(cursor.id.clone()));
                        }
                    }
                }

                sql.push_str(&format!(" ORDER BY json_extract(data, ?) {dir}, id {dir}"));
                params.push(path);
            }
            None => {
                if let Some(cursor) = &query.start_after {
                    sql.push_str(" AND id > ?");
                    params.push(Param::Text(cursor.id.clone()));
                }
                sql.push_str(" ORDER BY id ASC");
            }
        }

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            params.push(Param::Int(limit as i64));
        }

        Ok((sql, params))
    }
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn get(&self, collection: Collection, id: &str) -> AdminResult<Option<Document>> {
        let row = sqlx::query("SELECT id, data FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn query(&self, collection: Collection, query: &Query) -> AdminResult<Vec<Document>> {
        let (sql, params) = Self::build_select(collection, query)?;
        tracing::debug!("sqlite query on {}: {}", collection, sql);

        let mut statement = sqlx::query(&sql);
        for param in params {
            statement = match param {
                Param::Text(s) => statement.bind(s),
                Param::Int(i) => statement.bind(i),
                Param::Real(f) => statement.bind(f),
            };
        }

        let rows = statement.fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> AdminResult<()> {
        let result = self.commit_in_transaction(&ops).await;
        metrics::record_store_commit("sqlite", result.is_ok());
        result
    }

    async fn ping(&self) -> AdminResult<()> {
        db::test_connection(&self.pool).await
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

impl SqliteStore {
    async fn commit_in_transaction(&self, ops: &[WriteOp]) -> AdminResult<()> {
        let mut tx = self.pool.begin().await?;

        for op in ops {
            let collection = op.collection().as_str();

            let current: Option<Fields> = match op {
                WriteOp::Update { .. } => {
                    let row = sqlx::query("SELECT id, data FROM documents WHERE collection = ? AND id = ?")
                        .bind(collection)
                        .bind(op.id())
                        .fetch_optional(&mut *tx)
                        .await?;
                    row.as_ref().map(decode_row).transpose()?.map(|doc| doc.fields)
                }
                _ => None,
            };

            // An error here drops `tx`, rolling back everything staged so far
            match apply_op(current, op)? {
                Some(fields) => {
                    sqlx::query(
                        r#"
                        INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)
                        ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data
                        "#,
                    )
                    .bind(collection)
                    .bind(op.id())
                    .bind(Value::Object(fields).to_string())
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                        .bind(collection)
                        .bind(op.id())
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
