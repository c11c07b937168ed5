//! Document store abstraction.
//!
//! The [`DocumentStore`] trait is the only shared mutable resource in the
//! system. It exposes collection-scoped CRUD, equality/range filtering,
//! ordering, offset/limit windows, and server-side timestamps. There are no
//! transactions and no conditional writes: every method is a single
//! independent step, and concurrent updates to one document are
//! last-write-wins per field.
//!
//! Implementations must be `Send + Sync`; repositories hold them as
//! `Arc<dyn DocumentStore>`.

pub mod memory;

use async_trait::async_trait;

use crate::document::{Document, DocumentWrite};
use crate::error::Result;
use crate::query::Query;

/// Abstract document store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](DocumentStore::add) | Insert a document under a generated ID |
/// | [`get`](DocumentStore::get) | Point read by ID |
/// | [`update`](DocumentStore::update) | Merge fields into an existing document |
/// | [`delete`](DocumentStore::delete) | Remove a document (no-op when absent) |
/// | [`query`](DocumentStore::query) | Filtered, ordered, windowed read |
/// | [`count`](DocumentStore::count) | Number of documents a query selects |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name, reported by the health endpoint.
    fn backend(&self) -> &'static str;

    /// Inserts a document and returns its generated ID.
    async fn add(&self, collection: &str, write: DocumentWrite) -> Result<String>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Merges `write` into the top-level fields of an existing document.
    ///
    /// Fails with [`Error::NotFound`](crate::Error::NotFound) when the
    /// document does not exist.
    async fn update(&self, collection: &str, id: &str, write: DocumentWrite) -> Result<()>;

    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Runs a query. Invalid field paths fail with
    /// [`Error::Query`](crate::Error::Query).
    async fn query(&self, query: &Query) -> Result<Vec<Document>>;

    /// Number of documents `query` selects, ignoring its offset and limit.
    /// Ordering fields count as filters: documents lacking one are not
    /// counted, matching what [`query`](DocumentStore::query) returns.
    async fn count(&self, query: &Query) -> Result<usize>;
}
