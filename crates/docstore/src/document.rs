use serde_json::Map;
use serde_json::Value;

/// The field map of a document.
pub type Fields = Map<String, Value>;

/// Convert a JSON object literal into a field map.
/// Anything other than an object yields an empty map.
pub fn fields(value: Value) -> Fields {
    return match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    };
}

/// A snapshot of one stored document.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Document {
        return Document { id: id.into(), fields };
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        return self.fields.get(field);
    }

    /// A string field, if present and a string.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        return self.get(field).and_then(Value::as_str);
    }

    /// A numeric field as `f64`, if present and a number.
    pub fn f64_field(&self, field: &str) -> Option<f64> {
        return self.get(field).and_then(Value::as_f64);
    }

    /// A boolean field, if present and a boolean.
    pub fn bool_field(&self, field: &str) -> Option<bool> {
        return self.get(field).and_then(Value::as_bool);
    }

    /// The string elements of an array field. Non-string elements are skipped,
    /// and a missing or non-array field reads as empty.
    pub fn str_array(&self, field: &str) -> Vec<&str> {
        return match self.get(field) {
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
    }
}
