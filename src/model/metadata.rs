//! Document metadata collected by the adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A metadata value. Only scalar values reach the frontmatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    /// Boolean flag
    Bool(bool),
    /// Integer
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// Text
    Text(String),
    /// Timestamp
    DateTime(DateTime<Utc>),
    /// List of values
    List(Vec<MetaValue>),
    /// Nested key/value pairs
    Map(Vec<(String, MetaValue)>),
}

impl MetaValue {
    /// Whether this value is scalar (renderable as a single YAML value).
    pub fn is_scalar(&self) -> bool {
        !matches!(self, MetaValue::List(_) | MetaValue::Map(_))
    }

    /// Borrow the text, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::Text(value)
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Bool(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        MetaValue::Integer(value)
    }
}

impl From<u32> for MetaValue {
    fn from(value: u32) -> Self {
        MetaValue::Integer(i64::from(value))
    }
}

impl From<usize> for MetaValue {
    fn from(value: usize) -> Self {
        MetaValue::Integer(value as i64)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        MetaValue::Float(value)
    }
}

impl From<DateTime<Utc>> for MetaValue {
    fn from(value: DateTime<Utc>) -> Self {
        MetaValue::DateTime(value)
    }
}

/// Ordered key/value metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    entries: Vec<(String, MetaValue)>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing an existing key in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Set a text value if present and non-blank.
    pub fn set_text(&mut self, key: &str, value: Option<String>) {
        if let Some(value) = value {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                self.set(key, trimmed.to_string());
            }
        }
    }

    /// Get a value.
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Get a text value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetaValue::as_str)
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut meta = Metadata::new();
        meta.set("title", "First");
        meta.set("pages", 3u32);
        meta.set("title", "Second");
        assert_eq!(meta.len(), 2);
        assert_eq!(meta.get_str("title"), Some("Second"));
        let keys: Vec<&str> = meta.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["title", "pages"]);
    }

    #[test]
    fn test_set_text_skips_blank() {
        let mut meta = Metadata::new();
        meta.set_text("author", Some("   ".to_string()));
        meta.set_text("subject", None);
        assert!(meta.is_empty());
    }

    #[test]
    fn test_scalar_classification() {
        assert!(MetaValue::from("x").is_scalar());
        assert!(MetaValue::from(1.5).is_scalar());
        assert!(!MetaValue::List(vec![]).is_scalar());
        assert!(!MetaValue::Map(vec![]).is_scalar());
    }
}
