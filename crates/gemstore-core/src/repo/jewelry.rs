//! Jewelry items.

use std::sync::Arc;

use crate::document::{Document, DocumentWrite, Fields};
use crate::error::Result;
use crate::index::JEWELRY_TYPES;
use crate::query::{Direction, ListParams, ListPolicy, Paging};
use crate::store::DocumentStore;
use crate::upload::UploadedFile;

use super::{
    attach_images, maintain_index, strip_reserved, sync_image_count, update_write, Listing,
    Records,
};

pub const COLLECTION: &str = "jewelry";

const POLICY: ListPolicy = ListPolicy {
    equality: &["category", "jewelryType", "material"],
    boolean: &["inStock"],
    price_range: true,
    sortable: true,
    default_order: Some(("createdAt", Direction::Desc)),
};

#[derive(Debug, Clone)]
pub struct CreatedJewelry {
    pub item: Document,
    pub uploaded_images: Vec<String>,
}

#[derive(Clone)]
pub struct JewelryRepository {
    records: Records,
    paging: Paging,
}

impl JewelryRepository {
    pub fn new(store: Arc<dyn DocumentStore>, paging: Paging) -> Self {
        Self {
            records: Records::new(store, COLLECTION, "Jewelry"),
            paging,
        }
    }

    pub async fn list(&self, params: &ListParams) -> Result<Listing> {
        self.records.list(&POLICY, params, self.paging).await
    }

    pub async fn get(&self, id: &str) -> Result<Document> {
        self.records.get(id).await
    }

    /// Creates an item and indexes its `category` in `jewelryTypes`.
    pub async fn create(
        &self,
        payload: Fields,
        uploads: &[UploadedFile],
    ) -> Result<CreatedJewelry> {
        let mut fields = strip_reserved(payload);
        let uploaded_images = attach_images(&mut fields, uploads);
        let item = self
            .records
            .insert(
                DocumentWrite::new(fields)
                    .stamp("createdAt")
                    .stamp("updatedAt"),
            )
            .await?;
        tracing::info!(jewelry_id = %item.id, images = uploaded_images.len(), "jewelry created");

        maintain_index(JEWELRY_TYPES, self.records.store(), &item).await;

        Ok(CreatedJewelry {
            item,
            uploaded_images,
        })
    }

    pub async fn update(&self, id: &str, mut partial: Fields) -> Result<Document> {
        sync_image_count(&mut partial);
        self.records.merge(id, update_write(partial)).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.records.remove(id).await
    }
}
