//! Jewelry types.
//!
//! The `jewelryTypes` collection holds both hand-curated types (created
//! here, labelled by `type`) and entries added by category indexing of new
//! jewelry items (labelled by `name`, see [`crate::index`]).
//!
//! Text matching on this collection (`type` filter, search) is a
//! case-insensitive substring match done after the store read; the store
//! itself only supports equality and range predicates.

use std::sync::Arc;

use serde_json::Value;

use crate::document::{Document, DocumentWrite, Fields};
use crate::error::Result;
use crate::query::{Direction, ListParams, ListPolicy, Paging, Query};
use crate::store::DocumentStore;
use crate::upload::UploadedFile;
use crate::validate::{parse_bool_flag, require_search_term, validate_jewelry_type};

use super::{update_write, Listing, Records};

pub const COLLECTION: &str = "jewelryTypes";

const POLICY: ListPolicy = ListPolicy {
    equality: &[],
    boolean: &["isActive"],
    price_range: false,
    sortable: true,
    default_order: Some(("type", Direction::Asc)),
};

/// Result of [`JewelryTypeRepository::toggle`].
#[derive(Debug, Clone)]
pub struct Toggled {
    pub jewelry_type: Document,
    pub active: bool,
}

#[derive(Clone)]
pub struct JewelryTypeRepository {
    records: Records,
    paging: Paging,
}

fn contains_ci(doc: &Document, field: &str, needle: &str) -> bool {
    doc.str_field(field)
        .is_some_and(|v| v.to_lowercase().contains(needle))
}

impl JewelryTypeRepository {
    pub fn new(store: Arc<dyn DocumentStore>, paging: Paging) -> Self {
        Self {
            records: Records::new(store, COLLECTION, "Jewelry type"),
            paging,
        }
    }

    pub async fn list(&self, params: &ListParams) -> Result<Listing> {
        let Some(needle) = params.get("type").map(str::to_lowercase) else {
            return self.records.list(&POLICY, params, self.paging).await;
        };

        let lq = POLICY.build(COLLECTION, params, self.paging)?;
        let matched: Vec<Document> = self
            .records
            .query(&lq.query)
            .await?
            .into_iter()
            .filter(|doc| contains_ci(doc, "type", &needle))
            .collect();
        Ok(match lq.page {
            Some(page) => Listing {
                page: Some(page.info(matched.len())),
                items: page.slice(matched),
            },
            None => Listing {
                items: matched,
                page: None,
            },
        })
    }

    pub async fn get(&self, id: &str) -> Result<Document> {
        self.records.get(id).await
    }

    /// Creates a type. The image comes from `upload` when a file was sent,
    /// otherwise from the payload's `image` URL.
    pub async fn create(&self, payload: &Fields, upload: Option<&UploadedFile>) -> Result<Document> {
        let valid = validate_jewelry_type(payload, upload.map(UploadedFile::public_path))?;
        let write = DocumentWrite::default()
            .set("type", valid.type_name)
            .set("description", valid.description)
            .set("image", valid.image)
            .set("isActive", valid.is_active)
            .stamp("createdAt")
            .stamp("updatedAt");
        self.records.insert(write).await
    }

    pub async fn update(&self, id: &str, mut partial: Fields) -> Result<Document> {
        if let Some(flag) = partial.get("isActive") {
            let active = parse_bool_flag(Some(flag), true);
            partial.insert("isActive".into(), Value::Bool(active));
        }
        self.records.merge(id, update_write(partial)).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.records.remove(id).await
    }

    /// Flips `isActive`. A type without the flag counts as inactive.
    pub async fn toggle(&self, id: &str) -> Result<Toggled> {
        let current = self.records.get(id).await?;
        let active = !current
            .fields
            .get("isActive")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let jewelry_type = self
            .records
            .merge(
                id,
                DocumentWrite::default()
                    .set("isActive", active)
                    .stamp("updatedAt"),
            )
            .await?;
        Ok(Toggled {
            jewelry_type,
            active,
        })
    }

    /// Case-insensitive substring match on `type` or `description`.
    pub async fn search(&self, q: Option<&str>) -> Result<Vec<Document>> {
        let needle = require_search_term(q)?.to_lowercase();
        Ok(self
            .records
            .query(&Query::collection(COLLECTION))
            .await?
            .into_iter()
            .filter(|doc| contains_ci(doc, "type", &needle) || contains_ci(doc, "description", &needle))
            .collect())
    }
}
