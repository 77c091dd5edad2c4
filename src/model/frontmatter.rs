//! YAML frontmatter: an ordered map of scalar values.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{MetaValue, Metadata};
use crate::error::Result;

/// A scalar frontmatter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean
    Bool(bool),
    /// Integer
    Integer(i64),
    /// Float
    Float(f64),
    /// String
    Text(String),
}

impl Scalar {
    /// Borrow the text, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the value is an empty or blank string.
    pub fn is_blank(&self) -> bool {
        matches!(self, Scalar::Text(s) if s.trim().is_empty())
    }

    fn to_yaml(&self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Integer(i) => i.to_string(),
            Scalar::Float(f) if f.is_finite() => f.to_string(),
            Scalar::Float(_) => "null".to_string(),
            Scalar::Text(s) => format!("\"{}\"", escape_yaml(s)),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

/// Ordered key to scalar map rendered as a `---` delimited YAML block.
///
/// Serializes as a map in entry order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    entries: Vec<(String, Scalar)>,
}

impl Serialize for Frontmatter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Frontmatter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Frontmatter;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of scalar values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Frontmatter, A::Error> {
                let mut frontmatter = Frontmatter::new();
                while let Some((key, value)) = access.next_entry::<String, Scalar>()? {
                    frontmatter.set(key, value);
                }
                Ok(frontmatter)
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

impl Frontmatter {
    /// Create an empty frontmatter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from adapter metadata, keeping scalar values only.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let mut frontmatter = Self::new();
        for (key, value) in metadata.iter() {
            let scalar = match value {
                MetaValue::Bool(b) => Scalar::Bool(*b),
                MetaValue::Integer(i) => Scalar::Integer(*i),
                MetaValue::Float(f) => Scalar::Float(*f),
                MetaValue::Text(s) => Scalar::Text(s.clone()),
                MetaValue::DateTime(dt) => Scalar::Text(dt.to_rfc3339()),
                MetaValue::List(_) | MetaValue::Map(_) => {
                    log::debug!("Dropping non-scalar metadata key '{}'", key);
                    continue;
                }
            };
            frontmatter.set(key, scalar);
        }
        frontmatter
    }

    /// Parse YAML text (without the `---` delimiters).
    ///
    /// Non-scalar values are dropped; a non-mapping document yields an
    /// empty frontmatter.
    pub fn parse(yaml: &str) -> Result<Self> {
        let mut frontmatter = Self::new();
        if yaml.trim().is_empty() {
            return Ok(frontmatter);
        }
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let serde_yaml::Value::Mapping(mapping) = value else {
            return Ok(frontmatter);
        };
        for (key, value) in mapping {
            let key = match key {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            let scalar = match value {
                serde_yaml::Value::Bool(b) => Scalar::Bool(b),
                serde_yaml::Value::Number(n) => match n.as_i64() {
                    Some(i) => Scalar::Integer(i),
                    None => match n.as_f64() {
                        Some(f) => Scalar::Float(f),
                        None => continue,
                    },
                },
                serde_yaml::Value::String(s) => Scalar::Text(s),
                _ => continue,
            };
            frontmatter.set(key, scalar);
        }
        Ok(frontmatter)
    }

    /// Render as a `---` delimited block followed by a newline.
    pub fn render(&self) -> String {
        let mut lines = vec!["---".to_string()];
        for (key, value) in &self.entries {
            lines.push(format!("{}: {}", render_key(key), value.to_yaml()));
        }
        lines.push("---".to_string());
        lines.push(String::new());
        lines.join("\n")
    }

    /// Set a value, replacing an existing key in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Get a value.
    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Get a string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Scalar::as_str)
    }

    /// Whether a key holds a usable (non-blank) value.
    pub fn has_value(&self, key: &str) -> bool {
        self.get(key).map(|v| !v.is_blank()).unwrap_or(false)
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Iterate entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Reorder keys: listed keys first in the given order, the rest after
    /// in their existing order.
    pub fn reorder(&mut self, order: &[String]) {
        let mut remaining = std::mem::take(&mut self.entries);
        let mut ordered = Vec::with_capacity(remaining.len());
        for key in order {
            if let Some(pos) = remaining.iter().position(|(k, _)| k == key) {
                ordered.push(remaining.remove(pos));
            }
        }
        ordered.extend(remaining);
        self.entries = ordered;
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

/// Split a Markdown document into its frontmatter YAML and body.
///
/// Returns `(None, text)` when the text does not open with a `---` block.
pub fn split_frontmatter(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = text.strip_prefix("---\n") else {
        return (None, text);
    };
    if let Some(body) = rest.strip_prefix("---\n") {
        return (Some(""), body);
    }
    match rest.find("\n---\n") {
        Some(end) => (Some(&rest[..end]), &rest[end + 5..]),
        None => match rest.strip_suffix("\n---") {
            Some(yaml) => (Some(yaml), ""),
            None => (None, text),
        },
    }
}

fn render_key(key: &str) -> String {
    let plain = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if plain {
        key.to_string()
    } else {
        format!("\"{}\"", escape_yaml(key))
    }
}

/// Escape special characters for YAML strings.
fn escape_yaml(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let mut fm = Frontmatter::new();
        fm.set("title", "Test \"Doc\"");
        fm.set("pages", 10i64);
        fm.set("ocr_required", true);

        let yaml = fm.render();
        assert!(yaml.starts_with("---\n"));
        assert!(yaml.contains("title: \"Test \\\"Doc\\\"\""));
        assert!(yaml.contains("pages: 10"));
        assert!(yaml.contains("ocr_required: true"));
        assert!(yaml.ends_with("---\n"));
    }

    #[test]
    fn test_parse_round_trip() {
        let mut fm = Frontmatter::new();
        fm.set("title", "A: tricky\nvalue");
        fm.set("score", Scalar::Float(0.75));
        fm.set("count", 3i64);
        let rendered = fm.render();

        let (yaml, body) = split_frontmatter(&rendered);
        assert_eq!(body, "");
        let parsed = Frontmatter::parse(yaml.unwrap()).unwrap();
        assert_eq!(parsed, fm);
    }

    #[test]
    fn test_parse_drops_non_scalars() {
        let parsed = Frontmatter::parse("title: Doc\ntags:\n  - a\n  - b\nnested:\n  k: v\n").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.get_str("title"), Some("Doc"));
    }

    #[test]
    fn test_from_metadata_drops_non_scalars() {
        let mut meta = Metadata::new();
        meta.set("title", "Report");
        meta.set("sheets", MetaValue::List(vec!["a".into(), "b".into()]));
        meta.set("pages", 4u32);
        let fm = Frontmatter::from_metadata(&meta);
        let keys: Vec<&str> = fm.keys().collect();
        assert_eq!(keys, vec!["title", "pages"]);
    }

    #[test]
    fn test_serde_as_ordered_map() {
        let mut fm = Frontmatter::new();
        fm.set("title", "Doc");
        fm.set("pages", 2i64);
        fm.set("draft", false);

        let json = serde_json::to_string(&fm).unwrap();
        assert_eq!(json, r#"{"title":"Doc","pages":2,"draft":false}"#);
        let back: Frontmatter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fm);
    }

    #[test]
    fn test_reorder_unknown_keys_last() {
        let mut fm = Frontmatter::new();
        fm.set("zeta", "z");
        fm.set("original_format", "pdf");
        fm.set("alpha", "a");
        fm.set("title", "T");
        fm.reorder(&["title".to_string(), "original_format".to_string()]);
        let keys: Vec<&str> = fm.keys().collect();
        assert_eq!(keys, vec!["title", "original_format", "zeta", "alpha"]);
    }

    #[test]
    fn test_split_frontmatter() {
        let text = "---\ntitle: \"X\"\n---\n\n# Body\n";
        let (yaml, body) = split_frontmatter(text);
        assert_eq!(yaml, Some("title: \"X\""));
        assert_eq!(body, "\n# Body\n");

        let (yaml, body) = split_frontmatter("# No frontmatter\n");
        assert!(yaml.is_none());
        assert_eq!(body, "# No frontmatter\n");
    }

    #[test]
    fn test_has_value() {
        let mut fm = Frontmatter::new();
        fm.set("title", "  ");
        assert!(!fm.has_value("title"));
        fm.set("title", "Real");
        assert!(fm.has_value("title"));
    }
}
