use crate::document::Fields;

/// One write inside a batch.
#[derive(Clone, Debug, PartialEq)]
pub enum Write {
    Set { collection: String, id: String, fields: Fields },
    Update { collection: String, id: String, fields: Fields },
    Delete { collection: String, id: String },
    /// Add `by` to a numeric field of an existing document. A missing or
    /// non-numeric field counts as zero.
    Increment { collection: String, id: String, field: String, by: i64 },
}

/// An ordered list of writes committed together.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    writes: Vec<Write>,
}

impl Batch {
    pub fn new() -> Batch {
        return Batch::default();
    }

    pub fn set(&mut self, collection: &str, id: &str, fields: Fields) {
        self.writes.push(Write::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        });
    }

    pub fn update(&mut self, collection: &str, id: &str, fields: Fields) {
        self.writes.push(Write::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        });
    }

    pub fn delete(&mut self, collection: &str, id: &str) {
        self.writes.push(Write::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
    }

    pub fn increment(&mut self, collection: &str, id: &str, field: &str, by: i64) {
        self.writes.push(Write::Increment {
            collection: collection.to_string(),
            id: id.to_string(),
            field: field.to_string(),
            by,
        });
    }

    pub fn len(&self) -> usize {
        return self.writes.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.writes.is_empty();
    }

    pub fn writes(&self) -> &[Write] {
        return &self.writes;
    }

    pub fn into_writes(self) -> Vec<Write> {
        return self.writes;
    }
}
