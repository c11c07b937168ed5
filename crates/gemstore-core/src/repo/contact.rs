//! Contact-form messages.
//!
//! Contacts are created by a public form submission and then only move
//! between statuses. Moving to `replied` records `respondedAt`.

use std::sync::Arc;

use crate::document::{Document, DocumentWrite, Fields};
use crate::error::Result;
use crate::query::{Direction, ListParams, ListPolicy, Paging};
use crate::store::DocumentStore;
use crate::validate::{validate_contact, validate_contact_status, ContactStatus};

use super::{Listing, Records};

pub const COLLECTION: &str = "contacts";

const POLICY: ListPolicy = ListPolicy {
    equality: &["status"],
    boolean: &[],
    price_range: false,
    sortable: false,
    default_order: Some(("submittedAt", Direction::Desc)),
};

#[derive(Clone)]
pub struct ContactRepository {
    records: Records,
    paging: Paging,
}

impl ContactRepository {
    pub fn new(store: Arc<dyn DocumentStore>, paging: Paging) -> Self {
        Self {
            records: Records::new(store, COLLECTION, "Contact"),
            paging,
        }
    }

    pub async fn list(&self, params: &ListParams) -> Result<Listing> {
        self.records.list(&POLICY, params, self.paging).await
    }

    pub async fn get(&self, id: &str) -> Result<Document> {
        self.records.get(id).await
    }

    /// Validates and stores a submission from `ip_address`.
    pub async fn submit(&self, payload: &Fields, ip_address: &str) -> Result<Document> {
        let contact = validate_contact(payload)?;
        let write = DocumentWrite::default()
            .set("fullName", contact.full_name)
            .set("email", contact.email)
            .set("phoneNumber", contact.phone_number)
            .set("message", contact.message)
            .set("status", ContactStatus::New.as_str())
            .set("ipAddress", ip_address)
            .stamp("submittedAt");
        let created = self.records.insert(write).await?;
        tracing::info!(contact_id = %created.id, "contact submitted");
        Ok(created)
    }

    pub async fn update_status(&self, id: &str, payload: &Fields) -> Result<Document> {
        let status = validate_contact_status(payload)?;
        let mut write = DocumentWrite::default()
            .set("status", status.as_str())
            .stamp("updatedAt");
        if status == ContactStatus::Replied {
            write = write.stamp("respondedAt");
        }
        self.records.merge(id, write).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.records.remove(id).await
    }
}
