//! Category index maintenance.
//!
//! The `gemTypes` and `jewelryTypes` collections hold one entry per
//! distinct category label seen on gems and jewelry items. After a primary
//! entity with a non-empty `category` is created, [`CategoryIndex::ensure_entry`]
//! looks the label up and inserts an entry when none exists.
//!
//! The lookup and the insert are two independent store calls. Two
//! concurrent creations of the first entity in a new category can both see
//! "absent" and both insert, leaving duplicate entries for one label.
//! Nothing locks around the pair; [`CategoryIndex::reconcile`] merges such
//! duplicates after the fact and is safe to run repeatedly.
//!
//! Index maintenance never fails the primary write. Errors come back as
//! [`IndexError`], which callers log and drop.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::document::{Document, DocumentWrite};
use crate::error::Error;
use crate::query::{Direction, Filter, Query};
use crate::store::DocumentStore;

/// Index maintenance failure. Logged, never returned to the requester.
#[derive(Debug, Error)]
#[error("category index {collection}: maintenance failed for label {label:?}: {source}")]
pub struct IndexError {
    pub collection: &'static str,
    pub label: String,
    #[source]
    pub source: Error,
}

/// What [`CategoryIndex::ensure_entry`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The entity has no category label.
    Skipped,
    /// An entry for the label already existed.
    AlreadyPresent,
    /// A new entry was written.
    Inserted { id: String },
}

/// Summary of a [`CategoryIndex::reconcile`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub collection: String,
    pub labels: usize,
    pub removed: usize,
}

/// A category lookup collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryIndex {
    collection: &'static str,
}

pub const GEM_TYPES: CategoryIndex = CategoryIndex {
    collection: "gemTypes",
};

pub const JEWELRY_TYPES: CategoryIndex = CategoryIndex {
    collection: "jewelryTypes",
};

impl CategoryIndex {
    pub fn collection(&self) -> &'static str {
        self.collection
    }

    /// Makes sure an index entry exists for `entity`'s `category` label.
    ///
    /// An existing entry is one whose `name` equals the label; entries
    /// created by hand in `jewelryTypes` carry the label in `type` instead,
    /// so that field is checked as well.
    pub async fn ensure_entry(
        &self,
        store: &dyn DocumentStore,
        entity: &Document,
    ) -> Result<IndexOutcome, IndexError> {
        let Some(label) = entity.str_field("category") else {
            return Ok(IndexOutcome::Skipped);
        };

        let fail = |source: Error| IndexError {
            collection: self.collection,
            label: label.to_string(),
            source,
        };

        for field in ["name", "type"] {
            let existing = store
                .query(
                    &Query::collection(self.collection)
                        .filter(Filter::eq(field, label))
                        .limit(1),
                )
                .await
                .map_err(fail)?;
            if !existing.is_empty() {
                tracing::debug!(collection = self.collection, label, "category already indexed");
                return Ok(IndexOutcome::AlreadyPresent);
            }
        }

        let write = DocumentWrite::default()
            .set("name", label)
            .set("type", label)
            .set("gemName", entity.fields.get("name").cloned().unwrap_or(Value::Null))
            .set("sourceId", entity.id.as_str())
            .set("isActive", true)
            .stamp("createdAt")
            .stamp("updatedAt");
        let id = store.add(self.collection, write).await.map_err(fail)?;
        tracing::info!(collection = self.collection, label, id = %id, "category index entry added");
        Ok(IndexOutcome::Inserted { id })
    }

    /// All entries, ordered by label.
    pub async fn list(&self, store: &dyn DocumentStore) -> crate::Result<Vec<Document>> {
        store
            .query(&Query::collection(self.collection).order_by("name", Direction::Asc))
            .await
    }

    /// Collapses duplicate entries per label, keeping the oldest.
    ///
    /// Entries are grouped by `name` (falling back to `type`); within a group
    /// the entry with the smallest `createdAt`, then smallest ID, survives.
    pub async fn reconcile(&self, store: &dyn DocumentStore) -> crate::Result<ReconcileReport> {
        let entries = store.query(&Query::collection(self.collection)).await?;

        let mut groups: BTreeMap<String, Vec<Document>> = BTreeMap::new();
        for entry in entries {
            let label = entry
                .str_field("name")
                .or_else(|| entry.str_field("type"))
                .map(str::to_string);
            if let Some(label) = label {
                groups.entry(label).or_default().push(entry);
            }
        }

        let mut removed = 0;
        for (label, group) in groups.iter_mut() {
            if group.len() < 2 {
                continue;
            }
            group.sort_by(|a, b| {
                let ka = a.str_field("createdAt").unwrap_or_default();
                let kb = b.str_field("createdAt").unwrap_or_default();
                ka.cmp(kb).then_with(|| a.id.cmp(&b.id))
            });
            for duplicate in &group[1..] {
                store.delete(self.collection, &duplicate.id).await?;
                removed += 1;
            }
            tracing::info!(
                collection = self.collection,
                label = %label,
                kept = %group[0].id,
                removed = group.len() - 1,
                "merged duplicate category entries"
            );
        }

        Ok(ReconcileReport {
            collection: self.collection.to_string(),
            labels: groups.len(),
            removed,
        })
    }
}
