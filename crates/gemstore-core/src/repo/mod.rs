//! Entity repositories.
//!
//! Each repository wraps one collection of the [`DocumentStore`] with the
//! entity's validation and shaping rules. All of them share the same
//! primitive operations, implemented once in [`Records`]:
//!
//! | Operation | Behaviour |
//! |-----------|-----------|
//! | list | [`ListPolicy`] → query (+ count when paginated) |
//! | get | point read, [`Error::NotFound`] when absent |
//! | create | add with server-stamped timestamps, then re-read |
//! | update | existence check, merge, re-stamp `updatedAt`, re-read |
//! | delete | existence check, delete |
//!
//! [`Repositories`] builds every repository from a single store handle, so
//! the store is constructed once at startup and injected everywhere.

pub mod contact;
pub mod custom_request;
pub mod customization;
pub mod gem;
pub mod jewelry;
pub mod jewelry_type;
pub mod order;

use std::sync::Arc;

use serde_json::{json, Value};

use crate::document::{Document, DocumentWrite, Fields};
use crate::error::{Error, Result};
use crate::index::{CategoryIndex, ReconcileReport, GEM_TYPES, JEWELRY_TYPES};
use crate::query::{ListParams, ListPolicy, PageInfo, Paging, Query};
use crate::store::DocumentStore;
use crate::upload::UploadedFile;

pub use contact::ContactRepository;
pub use custom_request::CustomRequestRepository;
pub use customization::CustomizationRepository;
pub use gem::GemRepository;
pub use jewelry::JewelryRepository;
pub use jewelry_type::JewelryTypeRepository;
pub use order::OrderRepository;

/// Result of a list operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub items: Vec<Document>,
    /// Present when the entity paginates.
    pub page: Option<PageInfo>,
}

/// Per-entity pagination switches and the default page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingSettings {
    pub default_limit: usize,
    pub paginate_gems: bool,
    pub paginate_jewelry: bool,
    pub paginate_jewelry_types: bool,
    pub paginate_customizations: bool,
    pub paginate_contacts: bool,
    pub paginate_orders: bool,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            default_limit: 10,
            paginate_gems: false,
            paginate_jewelry: false,
            paginate_jewelry_types: true,
            paginate_customizations: false,
            paginate_contacts: true,
            paginate_orders: false,
        }
    }
}

impl ListingSettings {
    fn paging(&self, enabled: bool) -> Paging {
        Paging {
            enabled,
            default_limit: self.default_limit,
        }
    }
}

/// Shared collection primitives used by every repository.
#[derive(Clone)]
pub(crate) struct Records {
    store: Arc<dyn DocumentStore>,
    collection: &'static str,
    entity: &'static str,
}

impl Records {
    pub(crate) fn new(
        store: Arc<dyn DocumentStore>,
        collection: &'static str,
        entity: &'static str,
    ) -> Self {
        Self {
            store,
            collection,
            entity,
        }
    }

    pub(crate) fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub(crate) async fn get(&self, id: &str) -> Result<Document> {
        self.store
            .get(self.collection, id)
            .await?
            .ok_or_else(|| Error::not_found(self.entity, id))
    }

    pub(crate) async fn insert(&self, write: DocumentWrite) -> Result<Document> {
        let id = self.store.add(self.collection, write).await?;
        self.get(&id).await
    }

    pub(crate) async fn merge(&self, id: &str, write: DocumentWrite) -> Result<Document> {
        self.get(id).await?;
        self.store.update(self.collection, id, write).await?;
        self.get(id).await
    }

    pub(crate) async fn remove(&self, id: &str) -> Result<()> {
        self.get(id).await?;
        self.store.delete(self.collection, id).await
    }

    pub(crate) async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        self.store.query(query).await
    }

    pub(crate) async fn list(
        &self,
        policy: &ListPolicy,
        params: &ListParams,
        paging: Paging,
    ) -> Result<Listing> {
        let lq = policy.build(self.collection, params, paging)?;
        let items = self.store.query(&lq.windowed()).await?;
        let page = match lq.page {
            Some(page) => {
                let total = self.store.count(&lq.query).await?;
                Some(page.info(total))
            }
            None => None,
        };
        Ok(Listing { items, page })
    }
}

/// Removes keys a caller may not set directly.
pub(crate) fn strip_reserved(mut fields: Fields) -> Fields {
    fields.remove("id");
    fields
}

/// Applies the standard partial-update rules: reserved keys dropped,
/// `updatedAt` re-stamped.
pub(crate) fn update_write(partial: Fields) -> DocumentWrite {
    DocumentWrite::new(strip_reserved(partial)).stamp("updatedAt")
}

/// Sets `images` and `imageCount` on a new gem or jewelry payload.
///
/// Uploaded files win; without uploads, an inline `images` array of
/// strings is kept. Returns the public paths of the uploaded files.
pub(crate) fn attach_images(fields: &mut Fields, uploads: &[UploadedFile]) -> Vec<String> {
    let uploaded: Vec<String> = uploads.iter().map(UploadedFile::public_path).collect();
    let images = if uploaded.is_empty() {
        fields
            .get("images")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    } else {
        uploaded.clone()
    };
    fields.insert("imageCount".into(), json!(images.len()));
    fields.insert("images".into(), json!(images));
    uploaded
}

/// Keeps `imageCount` in step with an updated `images` array.
pub(crate) fn sync_image_count(fields: &mut Fields) {
    if let Some(count) = fields.get("images").and_then(Value::as_array).map(Vec::len) {
        fields.insert("imageCount".into(), json!(count));
    }
}

/// Runs category index maintenance for a freshly created entity. Failures
/// are logged and swallowed.
pub(crate) async fn maintain_index(index: CategoryIndex, store: &dyn DocumentStore, entity: &Document) {
    if let Err(err) = index.ensure_entry(store, entity).await {
        tracing::warn!(
            error = %err,
            collection = index.collection(),
            entity_id = %entity.id,
            "category index maintenance failed; primary record kept"
        );
    }
}

/// Every repository, built around one shared store.
#[derive(Clone)]
pub struct Repositories {
    pub gems: GemRepository,
    pub jewelry: JewelryRepository,
    pub jewelry_types: JewelryTypeRepository,
    pub customizations: CustomizationRepository,
    pub contacts: ContactRepository,
    pub orders: OrderRepository,
    pub custom_requests: CustomRequestRepository,
    store: Arc<dyn DocumentStore>,
}

impl Repositories {
    pub fn new(store: Arc<dyn DocumentStore>, settings: &ListingSettings) -> Self {
        Self {
            gems: GemRepository::new(store.clone(), settings.paging(settings.paginate_gems)),
            jewelry: JewelryRepository::new(
                store.clone(),
                settings.paging(settings.paginate_jewelry),
            ),
            jewelry_types: JewelryTypeRepository::new(
                store.clone(),
                settings.paging(settings.paginate_jewelry_types),
            ),
            customizations: CustomizationRepository::new(
                store.clone(),
                settings.paging(settings.paginate_customizations),
            ),
            contacts: ContactRepository::new(
                store.clone(),
                settings.paging(settings.paginate_contacts),
            ),
            orders: OrderRepository::new(store.clone(), settings.paging(settings.paginate_orders)),
            custom_requests: CustomRequestRepository::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// The gem category index, ordered by label.
    pub async fn gem_types(&self) -> Result<Vec<Document>> {
        GEM_TYPES.list(self.store.as_ref()).await
    }

    /// Merges duplicate entries in both category indexes.
    pub async fn reconcile_categories(&self) -> Result<Vec<ReconcileReport>> {
        let mut reports = Vec::new();
        for index in [GEM_TYPES, JEWELRY_TYPES] {
            reports.push(index.reconcile(self.store.as_ref()).await?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;

    /// Memory store whose category index collections are unreachable.
    struct IndexOutageStore {
        inner: InMemoryStore,
    }

    fn is_index(collection: &str) -> bool {
        collection == GEM_TYPES.collection() || collection == JEWELRY_TYPES.collection()
    }

    fn outage(collection: &str) -> Error {
        Error::Store(format!("{} unavailable", collection))
    }

    #[async_trait]
    impl DocumentStore for IndexOutageStore {
        fn backend(&self) -> &'static str {
            "index-outage"
        }

        async fn add(&self, collection: &str, write: DocumentWrite) -> Result<String> {
            if is_index(collection) {
                return Err(outage(collection));
            }
            self.inner.add(collection, write).await
        }

        async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
            self.inner.get(collection, id).await
        }

        async fn update(&self, collection: &str, id: &str, write: DocumentWrite) -> Result<()> {
            self.inner.update(collection, id, write).await
        }

        async fn delete(&self, collection: &str, id: &str) -> Result<()> {
            self.inner.delete(collection, id).await
        }

        async fn query(&self, query: &Query) -> Result<Vec<Document>> {
            if is_index(&query.collection) {
                return Err(outage(&query.collection));
            }
            self.inner.query(query).await
        }

        async fn count(&self, query: &Query) -> Result<usize> {
            self.inner.count(query).await
        }
    }

    fn outage_store() -> Arc<IndexOutageStore> {
        Arc::new(IndexOutageStore {
            inner: InMemoryStore::new(),
        })
    }

    fn unpaged() -> Paging {
        Paging {
            enabled: false,
            default_limit: 10,
        }
    }

    #[tokio::test]
    async fn test_gem_created_when_index_unreachable() {
        let store = outage_store();
        let gems = GemRepository::new(store.clone(), unpaged());

        let payload = json!({"name": "Ruby", "category": "Ruby"});
        let created = gems
            .create(payload.as_object().cloned().unwrap(), &[])
            .await
            .unwrap();

        let fetched = gems.get(&created.gem.id).await.unwrap();
        assert_eq!(fetched.str_field("category"), Some("Ruby"));
        let entries = store.inner.count(&Query::collection("gemTypes")).await.unwrap();
        assert_eq!(entries, 0);
    }

    #[tokio::test]
    async fn test_jewelry_created_when_index_unreachable() {
        let store = outage_store();
        let jewelry = JewelryRepository::new(store.clone(), unpaged());

        let payload = json!({"name": "Halo ring", "category": "Rings"});
        let created = jewelry
            .create(payload.as_object().cloned().unwrap(), &[])
            .await
            .unwrap();

        let fetched = jewelry.get(&created.item.id).await.unwrap();
        assert_eq!(fetched.str_field("category"), Some("Rings"));
        let entries = store
            .inner
            .count(&Query::collection("jewelryTypes"))
            .await
            .unwrap();
        assert_eq!(entries, 0);
    }

    #[test]
    fn test_attach_images_prefers_uploads() {
        use crate::upload::UploadKind;

        let mut fields = serde_json::json!({"images": ["http://a/x.png"]})
            .as_object()
            .cloned()
            .unwrap();
        let uploaded = attach_images(
            &mut fields,
            &[UploadedFile::new(UploadKind::Gem, "gem-1.png")],
        );
        assert_eq!(uploaded, vec!["/uploads/gem/gem-1.png"]);
        assert_eq!(fields["images"], json!(["/uploads/gem/gem-1.png"]));
        assert_eq!(fields["imageCount"], json!(1));
    }

    #[test]
    fn test_attach_images_keeps_inline_urls() {
        let mut fields = serde_json::json!({"images": ["http://a/x.png", 3, "http://a/y.png"]})
            .as_object()
            .cloned()
            .unwrap();
        let uploaded = attach_images(&mut fields, &[]);
        assert!(uploaded.is_empty());
        assert_eq!(fields["imageCount"], json!(2));
    }

    #[test]
    fn test_attach_images_defaults_to_empty() {
        let mut fields = Fields::new();
        attach_images(&mut fields, &[]);
        assert_eq!(fields["images"], json!([]));
        assert_eq!(fields["imageCount"], json!(0));
    }
}
