//! Gem-in-jewelry customization requests.
//!
//! A customization references one gem and one jewelry item, both of which
//! must exist when it is created. Their display names are copied onto the
//! customization; later changes or deletions of the referenced documents
//! are not propagated.

use std::sync::Arc;

use serde_json::Value;

use crate::document::{Document, DocumentWrite, Fields};
use crate::error::{Error, Result};
use crate::query::{ListParams, ListPolicy, Paging};
use crate::store::DocumentStore;
use crate::validate::validate_customization;

use super::{gem, jewelry, update_write, Listing, Records};

pub const COLLECTION: &str = "customizations";

const POLICY: ListPolicy = ListPolicy {
    equality: &["gemId", "jewelryId", "status"],
    boolean: &[],
    price_range: false,
    sortable: false,
    default_order: None,
};

#[derive(Clone)]
pub struct CustomizationRepository {
    records: Records,
    paging: Paging,
}

impl CustomizationRepository {
    pub fn new(store: Arc<dyn DocumentStore>, paging: Paging) -> Self {
        Self {
            records: Records::new(store, COLLECTION, "Customization"),
            paging,
        }
    }

    pub async fn list(&self, params: &ListParams) -> Result<Listing> {
        self.records.list(&POLICY, params, self.paging).await
    }

    pub async fn get(&self, id: &str) -> Result<Document> {
        self.records.get(id).await
    }

    pub async fn create(&self, payload: Fields) -> Result<Document> {
        let valid = validate_customization(payload)?;
        let store = self.records.store();

        let gem = store
            .get(gem::COLLECTION, &valid.gem_id)
            .await?
            .ok_or_else(|| Error::not_found("Gem", &valid.gem_id))?;
        let item = store
            .get(jewelry::COLLECTION, &valid.jewelry_id)
            .await?
            .ok_or_else(|| Error::not_found("Jewelry", &valid.jewelry_id))?;

        let display_name = |explicit: Option<String>, doc: &Document| match explicit {
            Some(name) => Value::String(name),
            None => doc.fields.get("name").cloned().unwrap_or(Value::Null),
        };

        let mut fields = Fields::new();
        fields.insert("gemId".into(), Value::String(valid.gem_id.clone()));
        fields.insert("gemName".into(), display_name(valid.gem_name, &gem));
        fields.insert("jewelryId".into(), Value::String(valid.jewelry_id.clone()));
        fields.insert("jewelryName".into(), display_name(valid.jewelry_name, &item));
        fields.insert("status".into(), Value::String("pending".into()));
        fields.extend(valid.extra);

        let created = self
            .records
            .insert(
                DocumentWrite::new(fields)
                    .stamp("createdAt")
                    .stamp("updatedAt"),
            )
            .await?;
        tracing::info!(customization_id = %created.id, gem_id = %valid.gem_id, "customization created");
        Ok(created)
    }

    pub async fn update(&self, id: &str, partial: Fields) -> Result<Document> {
        self.records.merge(id, update_write(partial)).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.records.remove(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    async fn setup() -> (CustomizationRepository, String, String) {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryStore::new());
        let gem_id = store
            .add("gems", DocumentWrite::default().set("name", "Ruby"))
            .await
            .unwrap();
        let jewelry_id = store
            .add("jewelry", DocumentWrite::default().set("name", "Gold ring"))
            .await
            .unwrap();
        let paging = Paging {
            enabled: false,
            default_limit: 10,
        };
        (CustomizationRepository::new(store, paging), gem_id, jewelry_id)
    }

    #[tokio::test]
    async fn test_create_copies_names_and_defaults_status() {
        let (repo, gem_id, jewelry_id) = setup().await;
        let created = repo
            .create(fields(json!({"gemId": gem_id, "jewelryId": jewelry_id, "size": 7})))
            .await
            .unwrap();
        assert_eq!(created.fields["gemName"], json!("Ruby"));
        assert_eq!(created.fields["jewelryName"], json!("Gold ring"));
        assert_eq!(created.fields["status"], json!("pending"));
        assert_eq!(created.fields["size"], json!(7));
    }

    #[tokio::test]
    async fn test_explicit_names_and_status_win() {
        let (repo, gem_id, jewelry_id) = setup().await;
        let created = repo
            .create(fields(json!({
                "gemId": gem_id, "jewelryId": jewelry_id,
                "gemName": "Pigeon blood", "status": "quoted"
            })))
            .await
            .unwrap();
        assert_eq!(created.fields["gemName"], json!("Pigeon blood"));
        assert_eq!(created.fields["status"], json!("quoted"));
    }

    #[tokio::test]
    async fn test_missing_references_are_not_found() {
        let (repo, gem_id, jewelry_id) = setup().await;
        let err = repo
            .create(fields(json!({"gemId": "nope", "jewelryId": jewelry_id})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { ref entity, .. } if entity == "Gem"));

        let err = repo
            .create(fields(json!({"gemId": gem_id, "jewelryId": "nope"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { ref entity, .. } if entity == "Jewelry"));
    }

    #[tokio::test]
    async fn test_missing_ids_are_validation_errors() {
        let (repo, _, _) = setup().await;
        let err = repo.create(fields(json!({"gemId": "g"}))).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let (repo, gem_id, jewelry_id) = setup().await;
        let a = repo
            .create(fields(json!({"gemId": gem_id, "jewelryId": jewelry_id})))
            .await
            .unwrap();
        repo.create(fields(json!({"gemId": gem_id, "jewelryId": jewelry_id})))
            .await
            .unwrap();
        repo.update(&a.id, fields(json!({"status": "done"})))
            .await
            .unwrap();
        let done = repo
            .list(&ListParams::default().with("status", "done"))
            .await
            .unwrap();
        assert_eq!(done.items.len(), 1);
        assert_eq!(done.items[0].id, a.id);
    }
}
