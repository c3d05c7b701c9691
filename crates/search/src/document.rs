use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Metadata keys tried in order for the document key anchor
const ANCHOR_KEYS: [&str; 3] = ["chunk_id", "line_start", "page"];

pub const CATEGORY_KEY: &str = "category";
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Document metadata: a required `source` plus free-form fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMetadata")]
pub struct DocumentMetadata {
    source: String,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct RawMetadata {
    #[serde(default)]
    source: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl TryFrom<RawMetadata> for DocumentMetadata {
    type Error = SearchError;

    fn try_from(raw: RawMetadata) -> Result<Self> {
        let mut metadata = Self::new(raw.source.unwrap_or_default())?;
        metadata.extra = raw.extra;
        Ok(metadata)
    }
}

impl DocumentMetadata {
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(SearchError::MissingSource);
        }
        Ok(Self {
            source,
            extra: BTreeMap::new(),
        })
    }

    /// Metadata for documents built inside this crate with a known non-empty source
    pub(crate) fn synthetic(source: String) -> Self {
        Self {
            source,
            extra: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != "source" {
            self.extra.insert(key, value.into());
        }
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    pub fn extra(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }

    /// First truthy anchor field rendered as text
    ///
    /// Null, `false`, zero and empty strings, arrays or objects are skipped.
    fn anchor(&self) -> String {
        ANCHOR_KEYS
            .iter()
            .filter_map(|key| self.extra.get(*key))
            .find_map(|value| match value {
                Value::Null | Value::Bool(false) => None,
                Value::Number(n) if n.as_f64() == Some(0.0) => None,
                Value::String(s) if s.is_empty() => None,
                Value::Array(items) if items.is_empty() => None,
                Value::Object(map) if map.is_empty() => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .unwrap_or_default()
    }
}

/// Retrievable unit of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(alias = "page_content")]
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        Ok(Self::with_metadata(content, DocumentMetadata::new(source)?))
    }

    pub fn with_metadata(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    pub fn source(&self) -> &str {
        self.metadata.source()
    }

    /// Category tag, `unknown` when absent
    pub fn category(&self) -> &str {
        self.metadata
            .get_str(CATEGORY_KEY)
            .unwrap_or(UNKNOWN_CATEGORY)
    }

    /// Copy of this document tagged with `category`
    #[must_use]
    pub fn with_category(&self, category: &str) -> Self {
        Self {
            content: self.content.clone(),
            metadata: self.metadata.clone().with(CATEGORY_KEY, category),
        }
    }

    pub fn key(&self) -> String {
        document_key(self)
    }
}

/// `source|anchor|digest` where digest is the first 12 hex chars of SHA-256(content)
pub fn document_key(document: &Document) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.content.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!(
        "{}|{}|{}",
        document.source(),
        document.metadata.anchor(),
        &digest[..12]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn key_uses_first_present_anchor() {
        let doc = Document::with_metadata(
            "fn main() {}",
            DocumentMetadata::new("src/main.rs")
                .unwrap()
                .with("line_start", 10)
                .with("page", 2),
        );
        let key = doc.key();
        assert!(key.starts_with("src/main.rs|10|"));
        assert_eq!(key.rsplit('|').next().unwrap().len(), 12);

        let chunked = Document::with_metadata(
            "fn main() {}",
            doc.metadata.clone().with("chunk_id", "c-7"),
        );
        assert!(chunked.key().starts_with("src/main.rs|c-7|"));
    }

    #[test]
    fn falsy_anchors_are_skipped() {
        let metadata = DocumentMetadata::new("notes.md")
            .unwrap()
            .with("chunk_id", "")
            .with("line_start", 0)
            .with("page", 4);
        let doc = Document::with_metadata("intro", metadata);
        assert!(doc.key().starts_with("notes.md|4|"));

        let bare = Document::with_metadata(
            "intro",
            DocumentMetadata::new("notes.md").unwrap().with("line_start", 0.0),
        );
        assert!(bare.key().starts_with("notes.md||"));
    }

    #[test]
    fn key_is_stable_and_content_sensitive() {
        let a = Document::new("alpha", "a.md").unwrap();
        let b = Document::new("alpha", "a.md").unwrap();
        let c = Document::new("alpha!", "a.md").unwrap();
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
        assert!(a.key().starts_with("a.md||"));
    }

    #[test]
    fn category_tag_is_a_new_value() {
        let doc = Document::new("text", "guide.md").unwrap();
        let tagged = doc.with_category("text");
        assert_eq!(doc.category(), "unknown");
        assert_eq!(tagged.category(), "text");
        assert_eq!(tagged.source(), "guide.md");
    }

    #[test]
    fn source_is_required() {
        assert!(matches!(Document::new("x", "  "), Err(SearchError::MissingSource)));

        let missing = serde_json::from_value::<Document>(json!({
            "content": "x",
            "metadata": {"page": 1}
        }));
        assert!(missing.is_err());

        let parsed: Document = serde_json::from_value(json!({
            "page_content": "body",
            "metadata": {"source": "doc.pdf", "page": 3}
        }))
        .unwrap();
        assert_eq!(parsed.source(), "doc.pdf");
        assert_eq!(parsed.metadata.get("page"), Some(&json!(3)));
    }

    #[test]
    fn serializes_metadata_flat() {
        let doc = Document::with_metadata(
            "body",
            DocumentMetadata::new("a.py").unwrap().with("category", "code"),
        );
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            json!({"content": "body", "metadata": {"source": "a.py", "category": "code"}})
        );
    }
}
