//! SQLite-backed [`DocumentStore`] implementation.
//!
//! Every document is one row of the `documents` table: its collection, its
//! ID, and its fields as a JSON object in `data`. Filters and ordering are
//! translated to `json_type` / `json_extract` expressions so that matching
//! follows the same rules as the in-memory store:
//!
//! - a filter only matches documents whose field exists and holds a value
//!   of the same JSON kind as the filter value;
//! - ordering on a field drops documents without it, ranks values by kind
//!   (null, bool, number, string, array, object), and breaks ties by ID.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use gemstore_core::document::{validate_field_path, Document, DocumentWrite, Fields, ServerClock};
use gemstore_core::query::{Filter, Query};
use gemstore_core::store::DocumentStore;
use gemstore_core::{Error, Result};

/// Compare-and-swap rounds before a contended merge update gives up.
const MERGE_ATTEMPTS: usize = 64;

/// SQLite implementation of the [`DocumentStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
    clock: ServerClock,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            clock: ServerClock::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn store_err(err: sqlx::Error) -> Error {
    tracing::error!(error = %err, "sqlite document store call failed");
    Error::Store(err.to_string())
}

fn decode(data: &str) -> Result<Fields> {
    serde_json::from_str(data).map_err(|e| Error::Store(format!("corrupt document data: {}", e)))
}

fn encode(fields: &Fields) -> Result<String> {
    serde_json::to_string(fields).map_err(|e| Error::Store(e.to_string()))
}

/// `json_extract`/`json_type` path for a field. Only called with paths that
/// passed [`validate_field_path`], so the result is safe to inline.
fn json_path(field: &str) -> String {
    format!("'$.{}'", field)
}

/// SQLite integers are signed; larger windows clamp to `i64::MAX`.
fn sql_int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn json_kinds(value: &Value) -> &'static str {
    match value {
        Value::Null => "'null'",
        Value::Bool(_) => "'true', 'false'",
        Value::Number(_) => "'integer', 'real'",
        Value::String(_) => "'text'",
        Value::Array(_) => "'array'",
        Value::Object(_) => "'object'",
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filters: &[Filter]) -> Result<()> {
    for filter in filters {
        validate_field_path(&filter.field)?;
        let path = json_path(&filter.field);
        qb.push(format!(
            " AND json_type(data, {}) IN ({})",
            path,
            json_kinds(&filter.value)
        ));

        let compare = format!(" AND json_extract(data, {}) {} ", path, filter.op.as_sql());
        match &filter.value {
            // Kind check alone decides: null only equals null.
            Value::Null => {}
            Value::Bool(b) => {
                qb.push(compare).push_bind(i64::from(*b));
            }
            Value::Number(n) => match n.as_i64() {
                Some(i) => {
                    qb.push(compare).push_bind(i);
                }
                None => {
                    qb.push(compare).push_bind(n.as_f64().unwrap_or(f64::NAN));
                }
            },
            Value::String(s) => {
                qb.push(compare).push_bind(s.clone());
            }
            Value::Array(_) | Value::Object(_) => {
                return Err(Error::Query(format!(
                    "cannot filter {:?} on an array or object value",
                    filter.field
                )));
            }
        }
    }
    Ok(())
}

/// Drops documents lacking any ordering field.
fn push_presence(qb: &mut QueryBuilder<'_, Sqlite>, query: &Query) -> Result<()> {
    for order in &query.order_by {
        validate_field_path(&order.field)?;
        qb.push(format!(
            " AND json_type(data, {}) IS NOT NULL",
            json_path(&order.field)
        ));
    }
    Ok(())
}

fn push_ordering(qb: &mut QueryBuilder<'_, Sqlite>, query: &Query) -> Result<()> {
    push_presence(qb, query)?;
    qb.push(" ORDER BY ");
    for order in &query.order_by {
        let path = json_path(&order.field);
        let dir = order.direction.as_sql();
        qb.push(format!(
            "CASE json_type(data, {path}) \
             WHEN 'null' THEN 0 WHEN 'true' THEN 1 WHEN 'false' THEN 1 \
             WHEN 'integer' THEN 2 WHEN 'real' THEN 2 WHEN 'text' THEN 3 \
             WHEN 'array' THEN 4 ELSE 5 END {dir}, \
             json_extract(data, {path}) {dir}, "
        ));
    }
    qb.push("id ASC");
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn add(&self, collection: &str, write: DocumentWrite) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let data = encode(&write.resolve(&self.clock.now()))?;

        sqlx::query("INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(&id)
            .bind(&data)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let data: Option<String> =
            sqlx::query_scalar("SELECT data FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?;

        data.map(|d| Ok(Document::new(id, decode(&d)?))).transpose()
    }

    async fn update(&self, collection: &str, id: &str, write: DocumentWrite) -> Result<()> {
        let changes = write.resolve(&self.clock.now());

        // Each round writes only if `data` is still what was read, so a
        // concurrent merge from any connection or process is never lost.
        for _ in 0..MERGE_ATTEMPTS {
            let current: Option<String> =
                sqlx::query_scalar("SELECT data FROM documents WHERE collection = ? AND id = ?")
                    .bind(collection)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(store_err)?;
            let Some(current) = current else {
                return Err(Error::not_found(collection, id));
            };

            let mut fields = decode(&current)?;
            fields.extend(changes.clone());

            let result = sqlx::query(
                "UPDATE documents SET data = ? WHERE collection = ? AND id = ? AND data = ?",
            )
            .bind(encode(&fields)?)
            .bind(collection)
            .bind(id)
            .bind(&current)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
            if result.rows_affected() == 1 {
                return Ok(());
            }
            tracing::debug!(collection, id, "merge update raced a concurrent write; retrying");
        }

        Err(Error::Store(format!(
            "update of {}/{} conflicted with concurrent writes {} times",
            collection, id, MERGE_ATTEMPTS
        )))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, data FROM documents WHERE collection = ");
        qb.push_bind(query.collection.clone());
        push_filters(&mut qb, &query.filters)?;
        push_ordering(&mut qb, query)?;

        match query.limit {
            Some(limit) => {
                qb.push(" LIMIT ").push_bind(sql_int(limit));
            }
            None => {
                qb.push(" LIMIT -1");
            }
        }
        if query.offset > 0 {
            qb.push(" OFFSET ").push_bind(sql_int(query.offset));
        }

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(store_err)?;
                let data: String = row.try_get("data").map_err(store_err)?;
                Ok(Document::new(id, decode(&data)?))
            })
            .collect()
    }

    async fn count(&self, query: &Query) -> Result<usize> {
        let mut qb =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM documents WHERE collection = ");
        qb.push_bind(query.collection.clone());
        push_filters(&mut qb, &query.filters)?;
        push_presence(&mut qb, query)?;

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
