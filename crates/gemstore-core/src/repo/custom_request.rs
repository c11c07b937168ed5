//! Custom jewellery requests submitted from the storefront.

use std::sync::Arc;

use serde_json::Value;

use crate::document::{Document, DocumentWrite, Fields};
use crate::error::Result;
use crate::store::DocumentStore;
use crate::upload::UploadedFile;

use super::{strip_reserved, Records};

pub const COLLECTION: &str = "customJewelleryRequests";

#[derive(Clone)]
pub struct CustomRequestRepository {
    records: Records,
}

impl CustomRequestRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            records: Records::new(store, COLLECTION, "Custom request"),
        }
    }

    /// Stores the request. An uploaded reference image replaces any
    /// `image` value in the payload.
    pub async fn create(&self, payload: Fields, upload: Option<&UploadedFile>) -> Result<Document> {
        let mut fields = strip_reserved(payload);
        if let Some(file) = upload {
            fields.insert("image".into(), Value::String(file.public_path()));
        }
        self.records
            .insert(DocumentWrite::new(fields).stamp("createdAt"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::upload::UploadKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_records_uploaded_image() {
        let repo = CustomRequestRepository::new(Arc::new(InMemoryStore::new()));
        let payload = json!({"name": "Lee", "design": "three-stone ring"});
        let upload = UploadedFile::new(UploadKind::CustomRequest, "custom-1.jpg");

        let with_image = repo
            .create(payload.as_object().cloned().unwrap(), Some(&upload))
            .await
            .unwrap();
        assert_eq!(with_image.fields["image"], json!("/uploads/custom/custom-1.jpg"));
        assert!(with_image.fields["createdAt"].is_string());

        let without = repo
            .create(payload.as_object().cloned().unwrap(), None)
            .await
            .unwrap();
        assert!(without.fields.get("image").is_none());
        assert_eq!(without.fields["design"], json!("three-stone ring"));
    }
}
