//! # Data Context
//!
//! A [`DataContext`] is the snapshot a batch of controls is evaluated
//! against: named collections of records gathered from connectors, e.g.
//! `users`, `resources`, `hr_employees`. It is read-only during evaluation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RuleError;

/// Named collections of JSON records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataContext {
    collections: BTreeMap<String, Value>,
}

impl DataContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON object of collections.
    ///
    /// Returns `None` when `value` is not an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self {
                collections: map.into_iter().collect(),
            }),
            _ => None,
        }
    }

    /// Insert or replace a collection.
    pub fn insert(&mut self, name: impl Into<String>, collection: Value) {
        self.collections.insert(name.into(), collection);
    }

    /// Merge another set of collections into this one.
    ///
    /// Lists under the same name are concatenated, existing records first.
    /// Any other combination replaces the existing value.
    pub fn merge(&mut self, other: impl IntoIterator<Item = (String, Value)>) {
        for (name, incoming) in other {
            match (self.collections.get_mut(&name), incoming) {
                (Some(Value::Array(existing)), Value::Array(more)) => existing.extend(more),
                (_, incoming) => {
                    self.collections.insert(name, incoming);
                }
            }
        }
    }

    /// Raw access to a collection.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.collections.get(name)
    }

    /// The records of a collection.
    ///
    /// A missing collection yields no records. A collection that is not a
    /// list of objects is an error.
    pub fn records(&self, name: &str) -> Result<Vec<&Map<String, Value>>, RuleError> {
        let Some(value) = self.collections.get(name) else {
            return Ok(Vec::new());
        };
        let Value::Array(items) = value else {
            return Err(RuleError::MalformedCollection {
                collection: name.to_string(),
                detail: format!("expected a list, found {}", type_name(value)),
            });
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_object().ok_or_else(|| RuleError::MalformedCollection {
                    collection: name.to_string(),
                    detail: format!("record {i} is {}, expected an object", type_name(item)),
                })
            })
            .collect()
    }

    /// Collection names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }
}

impl FromIterator<(String, Value)> for DataContext {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut ctx = Self::new();
        ctx.merge(iter);
        ctx
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_collection_has_no_records() {
        let ctx = DataContext::new();
        assert!(ctx.records("users").unwrap().is_empty());
    }

    #[test]
    fn non_list_collection_is_malformed() {
        let mut ctx = DataContext::new();
        ctx.insert("users", json!({"id": "u1"}));
        let err = ctx.records("users").unwrap_err();
        assert!(err.to_string().contains("expected a list"));
    }

    #[test]
    fn non_object_record_is_malformed() {
        let mut ctx = DataContext::new();
        ctx.insert("users", json!([{"id": "u1"}, 7]));
        let err = ctx.records("users").unwrap_err();
        assert!(err.to_string().contains("record 1"));
    }

    #[test]
    fn merge_concatenates_lists() {
        let mut ctx = DataContext::new();
        ctx.insert("users", json!([{"id": "aws-1"}]));
        ctx.merge(vec![
            ("users".to_string(), json!([{"id": "okta-1"}])),
            ("hr_employees".to_string(), json!([])),
        ]);
        let users = ctx.records("users").unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[1]["id"], "okta-1");
        assert!(ctx.get("hr_employees").is_some());
    }

    #[test]
    fn from_value_requires_object() {
        assert!(DataContext::from_value(json!([1])).is_none());
        let ctx = DataContext::from_value(json!({"users": []})).unwrap();
        assert_eq!(ctx.names().collect::<Vec<_>>(), vec!["users"]);
    }
}
