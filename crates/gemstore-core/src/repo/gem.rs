//! Gem catalog.
//!
//! The gem listing is not paginated by default: it returns the whole
//! filtered, ordered result set together with its size. Pagination can be
//! switched on per entity through [`ListingSettings`](super::ListingSettings).

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::document::{Document, DocumentWrite, Fields};
use crate::error::{Error, Result};
use crate::index::GEM_TYPES;
use crate::query::{Direction, ListParams, ListPolicy, Paging, Query};
use crate::store::DocumentStore;
use crate::upload::UploadedFile;
use crate::validate::require_search_term;

use super::{
    attach_images, maintain_index, strip_reserved, sync_image_count, update_write, Listing,
    Records,
};

pub const COLLECTION: &str = "gems";

const POLICY: ListPolicy = ListPolicy {
    equality: &["category", "treatment"],
    boolean: &["inStock"],
    price_range: true,
    sortable: true,
    default_order: Some(("createdAt", Direction::Desc)),
};

/// A created gem and the public paths of the files uploaded with it.
#[derive(Debug, Clone)]
pub struct CreatedGem {
    pub gem: Document,
    pub uploaded_images: Vec<String>,
}

/// Cart line returned by [`GemRepository::add_to_cart`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub gem_id: String,
    pub name: Value,
    pub price: Value,
    pub carat_weight: Value,
    pub color: Value,
    pub image: Value,
}

#[derive(Clone)]
pub struct GemRepository {
    records: Records,
    paging: Paging,
}

impl GemRepository {
    pub fn new(store: Arc<dyn DocumentStore>, paging: Paging) -> Self {
        Self {
            records: Records::new(store, COLLECTION, "Gem"),
            paging,
        }
    }

    pub async fn list(&self, params: &ListParams) -> Result<Listing> {
        self.records.list(&POLICY, params, self.paging).await
    }

    pub async fn get(&self, id: &str) -> Result<Document> {
        self.records.get(id).await
    }

    /// Creates a gem, records its own ID on the document, then makes sure
    /// its category is indexed in `gemTypes`.
    pub async fn create(&self, payload: Fields, uploads: &[UploadedFile]) -> Result<CreatedGem> {
        let mut fields = strip_reserved(payload);
        let uploaded_images = attach_images(&mut fields, uploads);

        let write = DocumentWrite::new(fields)
            .stamp("createdAt")
            .stamp("updatedAt");
        let created = self.records.insert(write).await?;
        self.records
            .store()
            .update(
                COLLECTION,
                &created.id,
                DocumentWrite::default().set("id", created.id.as_str()),
            )
            .await?;
        let gem = self.records.get(&created.id).await?;
        tracing::info!(gem_id = %gem.id, images = uploaded_images.len(), "gem created");

        maintain_index(GEM_TYPES, self.records.store(), &gem).await;

        Ok(CreatedGem {
            gem,
            uploaded_images,
        })
    }

    pub async fn update(&self, id: &str, partial: Fields) -> Result<Document> {
        let mut partial = partial;
        sync_image_count(&mut partial);
        self.records.merge(id, update_write(partial)).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.records.remove(id).await
    }

    /// Case-sensitive "name starts with `q`".
    pub async fn search(&self, q: Option<&str>) -> Result<Vec<Document>> {
        let q = require_search_term(q)?;
        self.records
            .query(&Query::prefix_search(COLLECTION, "name", q))
            .await
    }

    /// Checks stock and returns the cart line for a gem.
    pub async fn add_to_cart(&self, id: &str) -> Result<CartLine> {
        let gem = self.records.get(id).await?;
        if !gem.fields.get("inStock").is_some_and(is_truthy) {
            return Err(Error::invalid("Gem is out of stock"));
        }
        let field = |name: &str| gem.fields.get(name).cloned().unwrap_or(Value::Null);
        let image = gem
            .fields
            .get("images")
            .and_then(Value::as_array)
            .and_then(|a| a.first())
            .cloned()
            .unwrap_or(Value::Null);
        Ok(CartLine {
            gem_id: gem.id.clone(),
            name: field("name"),
            price: field("price"),
            carat_weight: field("caratWeight"),
            color: field("color"),
            image,
        })
    }
}

/// Stock flags may be stored as JSON booleans or, from form posts, as
/// strings.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty() && s != "false",
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::upload::UploadKind;
    use serde_json::json;

    fn repo() -> (GemRepository, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let paging = Paging {
            enabled: false,
            default_limit: 10,
        };
        (GemRepository::new(store.clone(), paging), store)
    }

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_then_get_is_superset_of_payload() {
        let (gems, _) = repo();
        let payload = fields(json!({"name": "Blue Sapphire", "category": "Sapphire", "price": 500}));
        let created = gems.create(payload.clone(), &[]).await.unwrap();
        let fetched = gems.get(&created.gem.id).await.unwrap();

        for (k, v) in &payload {
            assert_eq!(&fetched.fields[k], v);
        }
        assert_eq!(fetched.fields["id"], json!(created.gem.id));
        assert_eq!(fetched.fields["imageCount"], json!(0));
        assert!(fetched.fields["createdAt"].is_string());
        assert!(fetched.fields["updatedAt"].is_string());
    }

    #[tokio::test]
    async fn test_create_indexes_category_once() {
        let (gems, store) = repo();
        for name in ["Blue Sapphire", "Yellow Sapphire", "Padparadscha"] {
            gems.create(fields(json!({"name": name, "category": "Sapphire"})), &[])
                .await
                .unwrap();
        }
        let entries = GEM_TYPES.list(store.as_ref()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].fields["gemName"], json!("Blue Sapphire"));
    }

    #[tokio::test]
    async fn test_create_with_uploads() {
        let (gems, _) = repo();
        let uploads = [
            UploadedFile::new(UploadKind::Gem, "gem-a.jpg"),
            UploadedFile::new(UploadKind::Gem, "gem-b.jpg"),
        ];
        let created = gems
            .create(fields(json!({"name": "Ruby"})), &uploads)
            .await
            .unwrap();
        assert_eq!(created.uploaded_images.len(), 2);
        assert_eq!(created.gem.fields["imageCount"], json!(2));
        assert_eq!(
            created.gem.fields["images"],
            json!(["/uploads/gem/gem-a.jpg", "/uploads/gem/gem-b.jpg"])
        );
    }

    #[tokio::test]
    async fn test_list_newest_first_and_filters() {
        let (gems, _) = repo();
        for (name, price, stock) in [("A", 100, true), ("B", 300, false), ("C", 700, true)] {
            gems.create(
                fields(json!({"name": name, "price": price, "inStock": stock, "category": "Ruby"})),
                &[],
            )
            .await
            .unwrap();
        }

        let all = gems.list(&ListParams::default()).await.unwrap();
        let names: Vec<_> = all.items.iter().map(|d| d.fields["name"].clone()).collect();
        assert_eq!(names, vec![json!("C"), json!("B"), json!("A")]);
        assert!(all.page.is_none());

        let params = ListParams::default()
            .with("minPrice", "200")
            .with("maxPrice", "800")
            .with("inStock", "true");
        let filtered = gems.list(&params).await.unwrap();
        assert_eq!(filtered.items.len(), 1);
        assert_eq!(filtered.items[0].fields["name"], json!("C"));
    }

    #[tokio::test]
    async fn test_update_resyncs_image_count() {
        let (gems, _) = repo();
        let created = gems.create(fields(json!({"name": "Opal"})), &[]).await.unwrap();
        let updated = gems
            .update(
                &created.gem.id,
                fields(json!({"images": ["a", "b", "c"], "id": "hijack"})),
            )
            .await
            .unwrap();
        assert_eq!(updated.fields["imageCount"], json!(3));
        assert_eq!(updated.fields["id"], json!(created.gem.id));
        assert!(
            updated.fields["updatedAt"].as_str().unwrap()
                > created.gem.fields["updatedAt"].as_str().unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_gem_is_not_found() {
        let (gems, _) = repo();
        assert!(matches!(gems.get("nope").await, Err(Error::NotFound { .. })));
        assert!(matches!(
            gems.update("nope", Fields::new()).await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(gems.delete("nope").await, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_search_is_prefix_and_case_sensitive() {
        let (gems, _) = repo();
        for name in ["Blue Sapphire", "Blue Topaz", "blue spinel", "Ruby"] {
            gems.create(fields(json!({"name": name})), &[]).await.unwrap();
        }
        let hits = gems.search(Some("Blue")).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(matches!(gems.search(None).await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_add_to_cart() {
        let (gems, _) = repo();
        let out = gems
            .create(fields(json!({"name": "Ruby", "inStock": false})), &[])
            .await
            .unwrap();
        assert!(matches!(
            gems.add_to_cart(&out.gem.id).await,
            Err(Error::Validation(_))
        ));

        let uploads = [UploadedFile::new(UploadKind::Gem, "gem-r.jpg")];
        let ok = gems
            .create(
                fields(json!({"name": "Ruby", "inStock": true, "price": 900, "color": "red"})),
                &uploads,
            )
            .await
            .unwrap();
        let line = gems.add_to_cart(&ok.gem.id).await.unwrap();
        assert_eq!(line.price, json!(900));
        assert_eq!(line.image, json!("/uploads/gem/gem-r.jpg"));
        assert_eq!(line.carat_weight, Value::Null);
    }
}
