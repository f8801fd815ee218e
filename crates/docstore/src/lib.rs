//! Document store primitives for the Academy backoffice.
//!
//! The backoffice keeps all of its state in an external document database.
//! This crate describes the small slice of that database the admin workflows
//! rely on, as a trait, plus an in-memory backend for tests and tooling.
//!
//! | Piece | Role |
//! |-------|------|
//! | `Document` | An id plus a JSON object of fields |
//! | `Query`, `Filter` | Equality and array-contains filters, one sort key |
//! | `Batch` | Writes and counter increments applied all-or-nothing by `DocumentStore::commit` |
//! | `MemoryStore` | `BTreeMap`-backed store with sequential ids |
//!
//! # Example
//!
//! ```
//! use docstore::{DocumentStore, Filter, MemoryStore, Query};
//! use serde_json::json;
//!
//! let mut store = MemoryStore::new();
//! let id = store.insert("levels", docstore::fields(json!({ "title": "Green", "order": 1 }))).unwrap();
//!
//! let found = store.query("levels", &Query::new().filter(Filter::eq("title", "Green"))).unwrap();
//! assert_eq!(found[0].id, id);
//! ```

mod batch;
mod document;
mod memory;
mod query;

pub use batch::{Batch, Write};
pub use document::{Document, Fields, fields};
pub use memory::MemoryStore;
pub use query::{Direction, Filter, OrderBy, Query, compare_values};

/// Errors surfaced by a document store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// An update or delete referenced a document that does not exist.
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    /// The backend rejected the request.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// The operations the backoffice needs from its document database.
///
/// Reads return owned snapshots. Writes outside of `commit` apply
/// immediately; `commit` applies a whole batch or nothing.
pub trait DocumentStore {
    /// Fetch a single document.
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Run a query against one collection.
    fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Reserve a fresh document id in a collection without writing anything.
    fn new_id(&mut self, collection: &str) -> String;

    /// Create or overwrite a document.
    fn set(&mut self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// Merge fields into an existing document.
    fn update(&mut self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// Delete a document. Deleting a missing document is not an error.
    fn delete(&mut self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Apply every write in the batch, or none of them.
    fn commit(&mut self, batch: Batch) -> Result<(), StoreError>;

    /// Create a document with a store-assigned id.
    fn insert(&mut self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let id = self.new_id(collection);
        self.set(collection, &id, fields)?;
        return Ok(id);
    }
}
