//! In-memory [`DocumentStore`] implementation for tests and the `memory`
//! backend.
//!
//! Collections are `BTreeMap`s keyed by document ID behind a
//! `std::sync::RwLock`. Queries scan the whole collection.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::document::{compare_values, lookup, Document, DocumentWrite, Fields, ServerClock};
use crate::error::{Error, Result};
use crate::query::{Direction, Filter, Query};

use super::DocumentStore;

/// In-memory store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Fields>>>,
    clock: ServerClock,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Sorts matched documents by the query ordering, then by ID.
fn sort_documents(docs: &mut [Document], query: &Query) {
    docs.sort_by(|a, b| {
        for order in &query.order_by {
            let (Some(x), Some(y)) = (a.get(&order.field), b.get(&order.field)) else {
                continue;
            };
            let ord = match order.direction {
                Direction::Asc => compare_values(x, y),
                Direction::Desc => compare_values(y, x),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id.cmp(&b.id)
    });
}

fn matches_all(fields: &Fields, filters: &[Filter]) -> bool {
    filters.iter().all(|f| f.matches(fields))
}

/// Filters match and every ordering field is present.
fn selects(fields: &Fields, query: &Query) -> bool {
    matches_all(fields, &query.filters)
        && query
            .order_by
            .iter()
            .all(|o| lookup(fields, &o.field).is_some())
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn add(&self, collection: &str, write: DocumentWrite) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let fields = write.resolve(&self.clock.now());
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let collections = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(collections
            .get(collection)
            .and_then(|c| c.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn update(&self, collection: &str, id: &str, write: DocumentWrite) -> Result<()> {
        let resolved = write.resolve(&self.clock.now());
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let existing = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| Error::not_found(collection, id))?;
        existing.extend(resolved);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(c) = collections.get_mut(collection) {
            c.remove(id);
        }
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        query.validate()?;
        let mut docs: Vec<Document> = {
            let collections = self
                .collections
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(c) = collections.get(&query.collection) else {
                return Ok(Vec::new());
            };
            c.iter()
                .filter(|(_, fields)| selects(fields, query))
                .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                .collect()
        };
        sort_documents(&mut docs, query);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(docs.into_iter().skip(query.offset).take(limit).collect())
    }

    async fn count(&self, query: &Query) -> Result<usize> {
        query.validate()?;
        let collections = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(collections
            .get(&query.collection)
            .map(|c| c.values().filter(|f| selects(f, query)).count())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(value: serde_json::Value) -> DocumentWrite {
        DocumentWrite::new(value.as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn test_add_get_roundtrip_with_stamp() {
        let store = InMemoryStore::new();
        let id = store
            .add("gems", write(json!({"name": "Ruby"})).stamp("createdAt"))
            .await
            .unwrap();
        let doc = store.get("gems", &id).await.unwrap().unwrap();
        assert_eq!(doc.fields["name"], json!("Ruby"));
        assert!(doc.fields["createdAt"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_update_merges_and_requires_existing() {
        let store = InMemoryStore::new();
        let id = store
            .add("gems", write(json!({"name": "Ruby", "price": 10})))
            .await
            .unwrap();
        store
            .update("gems", &id, write(json!({"price": 20})))
            .await
            .unwrap();
        let doc = store.get("gems", &id).await.unwrap().unwrap();
        assert_eq!(doc.fields["name"], json!("Ruby"));
        assert_eq!(doc.fields["price"], json!(20));

        let err = store
            .update("gems", "missing", write(json!({"price": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryStore::new();
        let id = store.add("gems", write(json!({}))).await.unwrap();
        store.delete("gems", &id).await.unwrap();
        store.delete("gems", &id).await.unwrap();
        assert!(store.get("gems", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_orders_and_windows() {
        let store = InMemoryStore::new();
        for price in [30, 10, 20, 40] {
            store
                .add("gems", write(json!({"price": price})))
                .await
                .unwrap();
        }
        store.add("gems", write(json!({"name": "no price"}))).await.unwrap();

        let q = Query::collection("gems")
            .order_by("price", Direction::Asc)
            .offset(1)
            .limit(2);
        let docs = store.query(&q).await.unwrap();
        let prices: Vec<_> = docs.iter().map(|d| d.fields["price"].clone()).collect();
        assert_eq!(prices, vec![json!(20), json!(30)]);

        // ordering excludes documents without the field
        let all = store
            .query(&Query::collection("gems").order_by("price", Direction::Desc))
            .await
            .unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(store.count(&Query::collection("gems")).await.unwrap(), 5);

        // count follows the same presence rule and ignores the window
        let sorted = Query::collection("gems")
            .order_by("price", Direction::Desc)
            .limit(1);
        assert_eq!(store.count(&sorted).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_query_rejects_bad_field() {
        let store = InMemoryStore::new();
        let q = Query::collection("gems").order_by("bad field", Direction::Asc);
        assert!(matches!(store.query(&q).await, Err(Error::Query(_))));
    }

    #[tokio::test]
    async fn test_unknown_collection_is_empty() {
        let store = InMemoryStore::new();
        assert!(store
            .query(&Query::collection("nothing"))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.count(&Query::collection("nothing")).await.unwrap(), 0);
    }
}
