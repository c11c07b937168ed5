//! Orders. Stored as submitted, with no structure enforced.

use std::sync::Arc;

use crate::document::{Document, DocumentWrite, Fields};
use crate::error::Result;
use crate::query::{Direction, ListParams, ListPolicy, Paging};
use crate::store::DocumentStore;

use super::{strip_reserved, Listing, Records};

pub const COLLECTION: &str = "orders";

const POLICY: ListPolicy = ListPolicy {
    equality: &[],
    boolean: &[],
    price_range: false,
    sortable: true,
    default_order: Some(("createdAt", Direction::Desc)),
};

#[derive(Clone)]
pub struct OrderRepository {
    records: Records,
    paging: Paging,
}

impl OrderRepository {
    pub fn new(store: Arc<dyn DocumentStore>, paging: Paging) -> Self {
        Self {
            records: Records::new(store, COLLECTION, "Order"),
            paging,
        }
    }

    pub async fn list(&self, params: &ListParams) -> Result<Listing> {
        self.records.list(&POLICY, params, self.paging).await
    }

    pub async fn create(&self, payload: Fields) -> Result<Document> {
        let order = self
            .records
            .insert(DocumentWrite::new(strip_reserved(payload)).stamp("createdAt"))
            .await?;
        tracing::info!(order_id = %order.id, "order placed");
        Ok(order)
    }
}
