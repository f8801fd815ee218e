use std::collections::BTreeMap;

use serde_json::Value;
use serde_json::json;
use tracing::debug;

use crate::DocumentStore;
use crate::StoreError;
use crate::batch::Batch;
use crate::batch::Write;
use crate::document::Document;
use crate::document::Fields;
use crate::query::Query;

type Collections = BTreeMap<String, BTreeMap<String, Fields>>;

/// An in-memory document store.
///
/// Documents are kept per collection in id order. Generated ids are
/// sequential per store (`<collection>-000001`, ...), so tests are
/// deterministic.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    collections: Collections,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        return MemoryStore::default();
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        return self.collections.get(collection).map_or(0, BTreeMap::len);
    }

    /// Every document in a collection, in id order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        return match self.collections.get(collection) {
            Some(docs) => docs
                .iter()
                .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                .collect(),
            None => Vec::new(),
        };
    }
}

fn apply(collections: &mut Collections, write: Write) -> Result<(), StoreError> {
    match write {
        Write::Set { collection, id, fields } => {
            collections.entry(collection).or_default().insert(id, fields);
        }
        Write::Update { collection, id, fields } => {
            let existing = collections
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(&id));
            match existing {
                Some(current) => {
                    for (key, value) in fields {
                        current.insert(key, value);
                    }
                }
                None => return Err(StoreError::NotFound { collection, id }),
            }
        }
        Write::Delete { collection, id } => {
            if let Some(docs) = collections.get_mut(&collection) {
                docs.remove(&id);
            }
        }
        Write::Increment { collection, id, field, by } => {
            let Some(current) = collections.get_mut(&collection).and_then(|docs| docs.get_mut(&id)) else {
                return Err(StoreError::NotFound { collection, id });
            };
            let next = match current.get(&field) {
                Some(Value::Number(n)) => match n.as_i64() {
                    Some(whole) => json!(whole.saturating_add(by)),
                    None => json!(n.as_f64().unwrap_or(0.0) + by as f64),
                },
                _ => json!(by),
            };
            current.insert(field, next);
        }
    }
    return Ok(());
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let found = self
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone()));
        return Ok(found);
    }

    fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        return Ok(query.run(self.documents(collection)));
    }

    fn new_id(&mut self, collection: &str) -> String {
        self.next_id += 1;
        return format!("{}-{:06}", collection, self.next_id);
    }

    fn set(&mut self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let write = Write::Set { collection: collection.to_string(), id: id.to_string(), fields };
        return apply(&mut self.collections, write);
    }

    fn update(&mut self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let write = Write::Update { collection: collection.to_string(), id: id.to_string(), fields };
        return apply(&mut self.collections, write);
    }

    fn delete(&mut self, collection: &str, id: &str) -> Result<(), StoreError> {
        let write = Write::Delete { collection: collection.to_string(), id: id.to_string() };
        return apply(&mut self.collections, write);
    }

    fn commit(&mut self, batch: Batch) -> Result<(), StoreError> {
        let count = batch.len();
        // Stage against a copy so a failing write leaves the store untouched.
        let mut staged = self.collections.clone();
        for write in batch.into_writes() {
            apply(&mut staged, write)?;
        }
        self.collections = staged;
        debug!(writes = count, "committed batch");
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fields;
    use crate::query::Filter;
    use serde_json::json;

    #[test]
    fn insert_assigns_sequential_ids() {
        let mut store = MemoryStore::new();
        let a = store.insert("levels", fields(json!({ "title": "A" }))).unwrap();
        let b = store.insert("levels", fields(json!({ "title": "B" }))).unwrap();
        assert_eq!(a, "levels-000001");
        assert_eq!(b, "levels-000002");
        assert_eq!(store.count("levels"), 2);
    }

    #[test]
    fn update_merges_fields() {
        let mut store = MemoryStore::new();
        store.set("seances", "s1", fields(json!({ "title": "Turns", "order": 1 }))).unwrap();
        store.update("seances", "s1", fields(json!({ "order": 2 }))).unwrap();

        let doc = store.get("seances", "s1").unwrap().unwrap();
        assert_eq!(doc.str_field("title"), Some("Turns"));
        assert_eq!(doc.f64_field("order"), Some(2.0));
    }

    #[test]
    fn update_missing_document_fails() {
        let mut store = MemoryStore::new();
        let err = store.update("seances", "nope", Fields::new()).unwrap_err();
        assert_eq!(err, StoreError::NotFound { collection: "seances".into(), id: "nope".into() });
    }

    #[test]
    fn failed_batch_applies_nothing() {
        let mut store = MemoryStore::new();
        store.set("exercises", "e1", fields(json!({ "order": 10 }))).unwrap();

        let mut batch = Batch::new();
        batch.update("exercises", "e1", fields(json!({ "order": 15 })));
        batch.update("exercises", "ghost", fields(json!({ "order": 20 })));
        assert!(store.commit(batch).is_err());

        let doc = store.get("exercises", "e1").unwrap().unwrap();
        assert_eq!(doc.f64_field("order"), Some(10.0));
    }

    #[test]
    fn increment_counts_missing_field_as_zero() {
        let mut store = MemoryStore::new();
        store.set("users", "u1", fields(json!({ "postsCount": 3, "score": 1.5, "bio": "x" }))).unwrap();

        let mut batch = Batch::new();
        batch.increment("users", "u1", "postsCount", -1);
        batch.increment("users", "u1", "score", 2);
        batch.increment("users", "u1", "likes", -1);
        batch.increment("users", "u1", "bio", 4);
        store.commit(batch).unwrap();

        let doc = store.get("users", "u1").unwrap().unwrap();
        assert_eq!(doc.get("postsCount"), Some(&json!(2)));
        assert_eq!(doc.f64_field("score"), Some(3.5));
        assert_eq!(doc.get("likes"), Some(&json!(-1)));
        assert_eq!(doc.get("bio"), Some(&json!(4)));

        let mut missing = Batch::new();
        missing.increment("users", "ghost", "postsCount", -1);
        assert!(matches!(store.commit(missing), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn batch_sees_its_own_earlier_writes() {
        let mut store = MemoryStore::new();
        let mut batch = Batch::new();
        batch.set("challenges", "c2", fields(json!({ "status": "non_active" })));
        batch.update("challenges", "c2", fields(json!({ "status": "active" })));
        store.commit(batch).unwrap();

        let found = store
            .query("challenges", &Query::new().filter(Filter::eq("status", "active")))
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
