//! Content items as seen by the host publishing pipeline.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Metadata property carrying a per-item max-age override in seconds.
pub const CACHE_CONTROL_PROPERTY: &str = "cacheControlMaxAge";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

impl ContentItem {
    pub fn new(id: Uuid, name: impl Into<String>, published: bool) -> Self {
        Self {
            id,
            name: name.into(),
            published,
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Whether the property exists and carries a populated value.
    pub fn has_value(&self, name: &str) -> bool {
        match self.properties.get(name) {
            None | Some(Value::Null) => false,
            Some(Value::String(text)) => !text.trim().is_empty(),
            Some(_) => true,
        }
    }

    /// Per-item max-age override read from [`CACHE_CONTROL_PROPERTY`].
    ///
    /// A populated value that is not an `i32` (fractional, out of range,
    /// non-numeric) reads as `0`, which disables caching for the item.
    pub fn cache_override(&self) -> Option<i32> {
        if !self.has_value(CACHE_CONTROL_PROPERTY) {
            return None;
        }

        let value = self.properties.get(CACHE_CONTROL_PROPERTY)?;
        let parsed = match value {
            Value::Number(number) => number.as_i64().and_then(|n| i32::try_from(n).ok()),
            Value::String(text) => text.trim().parse::<i32>().ok(),
            _ => None,
        };

        Some(parsed.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> ContentItem {
        ContentItem::new(Uuid::new_v4(), "home", true)
    }

    #[test]
    fn missing_property_has_no_override() {
        assert_eq!(item().cache_override(), None);
    }

    #[test]
    fn null_and_blank_values_have_no_override() {
        let null = item().with_property(CACHE_CONTROL_PROPERTY, Value::Null);
        let blank = item().with_property(CACHE_CONTROL_PROPERTY, json!("  "));
        assert_eq!(null.cache_override(), None);
        assert_eq!(blank.cache_override(), None);
    }

    #[test]
    fn numeric_values_override() {
        let number = item().with_property(CACHE_CONTROL_PROPERTY, json!(120));
        let text = item().with_property(CACHE_CONTROL_PROPERTY, json!(" 45 "));
        let negative = item().with_property(CACHE_CONTROL_PROPERTY, json!(-5));
        assert_eq!(number.cache_override(), Some(120));
        assert_eq!(text.cache_override(), Some(45));
        assert_eq!(negative.cache_override(), Some(-5));
    }

    #[test]
    fn unreadable_values_override_to_zero() {
        for value in [json!("soon"), json!(1.5), json!(true), json!(i64::MAX)] {
            let content = item().with_property(CACHE_CONTROL_PROPERTY, value);
            assert_eq!(content.cache_override(), Some(0));
        }
    }

    #[test]
    fn deserializes_with_defaults() {
        let content: ContentItem = serde_json::from_value(json!({
            "id": "7f2c8a34-5d2b-4c55-9d4e-0c74c07d7c11",
            "name": "about"
        }))
        .expect("content item");
        assert!(!content.published);
        assert!(content.properties.is_empty());
    }
}
