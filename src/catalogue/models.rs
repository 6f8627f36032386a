//! Input records for a catalogue export.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::images::ImageResolver;

/// Shortest embedded payload accepted as a table-of-contents thumbnail.
/// Anything shorter is a placeholder or a truncated upload.
pub const MIN_THUMBNAIL_PAYLOAD_LEN: usize = 100;

pub const DEFAULT_CLIENT_NAME: &str = "Valued Client";

/// One catalogue line item selected for export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductRecord {
    /// Top-level grouping, usually the source catalogue.
    pub collection_name: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub display_name: String,
    /// Free-text fragrance or description.
    #[serde(default)]
    pub descriptor: String,
    #[serde(default)]
    pub sku_code: String,
    /// Embedded base64 payload, `data:` URI, or a fetchable URL.
    #[serde(default)]
    #[schema(value_type = String)]
    pub image: ImageReference,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_flagged_new: bool,
    /// Caller's display order, 0-based.
    pub sequence_index: usize,
}

impl ProductRecord {
    pub fn new(
        collection_name: impl Into<String>,
        category: impl Into<String>,
        display_name: impl Into<String>,
        sequence_index: usize,
    ) -> Self {
        Self {
            collection_name: collection_name.into(),
            category: category.into(),
            subcategory: None,
            display_name: display_name.into(),
            descriptor: String::new(),
            sku_code: String::new(),
            image: ImageReference::Missing,
            is_flagged_new: false,
            sequence_index,
        }
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn with_image(mut self, image: ImageReference) -> Self {
        self.image = image;
        self
    }

    pub fn flagged_new(mut self) -> Self {
        self.is_flagged_new = true;
        self
    }
}

/// Where a record's picture comes from.
///
/// A `Remote` reference is replaced in place by `Embedded` (or `Missing` when
/// the fetch fails) the first time it is resolved, so a record is fetched at
/// most once per export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImageReference {
    #[default]
    Missing,
    Remote(String),
    Embedded(String),
}

impl ImageReference {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Missing;
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Self::Remote(trimmed.to_string());
        }
        if let Some(rest) = trimmed.strip_prefix("data:") {
            return match rest.split_once(',') {
                Some((_, payload)) if !payload.is_empty() => Self::Embedded(payload.to_string()),
                _ => Self::Missing,
            };
        }
        Self::Embedded(trimmed.to_string())
    }

    pub fn embedded(&self) -> Option<&str> {
        match self {
            Self::Embedded(payload) => Some(payload),
            _ => None,
        }
    }

    /// Embedded payload long enough to stand in for its category in the index.
    pub fn thumbnail(&self) -> Option<&str> {
        self.embedded()
            .filter(|payload| payload.len() > MIN_THUMBNAIL_PAYLOAD_LEN)
    }

    /// Resolve a remote reference through `resolver`, memoizing the outcome.
    /// Already-embedded and missing references are returned untouched.
    pub fn resolve_with(&mut self, resolver: &dyn ImageResolver) -> Option<&str> {
        if let Self::Remote(url) = self {
            *self = match resolver.resolve(url) {
                Some(payload) if !payload.is_empty() => Self::Embedded(payload),
                _ => {
                    log::warn!("image could not be resolved: {}", url);
                    Self::Missing
                }
            };
        }
        self.embedded()
    }
}

impl From<String> for ImageReference {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<ImageReference> for String {
    fn from(reference: ImageReference) -> Self {
        match reference {
            ImageReference::Missing => String::new(),
            ImageReference::Remote(url) => url,
            ImageReference::Embedded(payload) => payload,
        }
    }
}

/// Packing specification for one category.
///
/// Keys are free-form spreadsheet headers ("Gross Wt (Kg)", "CBM per Ctn", ...)
/// kept in their original order; see [`super::attributes`] for lookups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseSizeEntry {
    fields: Map<String, Value>,
}

impl CaseSizeEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, label: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(label.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Labels and their display text, in the entry's own order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, String)> {
        self.fields
            .iter()
            .map(|(label, value)| (label.as_str(), value_text(value)))
    }
}

/// Category name to packing specification.
pub type CaseSizeTable = HashMap<String, CaseSizeEntry>;

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Body of `POST /api/catalogue/export`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ExportRequest {
    #[serde(default = "default_client_name")]
    pub client_name: String,
    #[serde(default)]
    pub products: Vec<ProductRecord>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub case_sizes: CaseSizeTable,
}

fn default_client_name() -> String {
    DEFAULT_CLIENT_NAME.to_string()
}

/// Accepts `true`, `1`, `"1"`, `"yes"`, `"new"` and friends; the product
/// sheets this comes from mark new items inconsistently.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "1.0" | "true" | "yes" | "y" | "new"
        ),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_reference_parsing() {
        assert_eq!(ImageReference::parse("  "), ImageReference::Missing);
        assert_eq!(
            ImageReference::parse("https://cdn.example.com/a.jpg"),
            ImageReference::Remote("https://cdn.example.com/a.jpg".to_string())
        );
        assert_eq!(
            ImageReference::parse("data:image/png;base64,iVBORw0K"),
            ImageReference::Embedded("iVBORw0K".to_string())
        );
        assert_eq!(
            ImageReference::parse("/9j/4AAQ"),
            ImageReference::Embedded("/9j/4AAQ".to_string())
        );
    }

    #[test]
    fn test_resolve_memoizes_and_is_idempotent() {
        use std::cell::Cell;

        let calls = Cell::new(0);
        let resolver = |_: &str| {
            calls.set(calls.get() + 1);
            Some("cGF5bG9hZA==".to_string())
        };

        let mut image = ImageReference::parse("https://cdn.example.com/a.jpg");
        assert_eq!(image.resolve_with(&resolver), Some("cGF5bG9hZA=="));
        assert_eq!(image.resolve_with(&resolver), Some("cGF5bG9hZA=="));
        assert_eq!(calls.get(), 1);
        assert_eq!(image, ImageReference::Embedded("cGF5bG9hZA==".to_string()));
    }

    #[test]
    fn test_failed_resolution_becomes_missing() {
        let resolver = |_: &str| -> Option<String> { None };
        let mut image = ImageReference::Remote("https://cdn.example.com/gone.jpg".to_string());
        assert_eq!(image.resolve_with(&resolver), None);
        assert_eq!(image, ImageReference::Missing);
    }

    #[test]
    fn test_thumbnail_requires_minimum_length() {
        assert!(ImageReference::Embedded("abc".to_string()).thumbnail().is_none());
        let long = "A".repeat(MIN_THUMBNAIL_PAYLOAD_LEN + 1);
        assert!(ImageReference::Embedded(long).thumbnail().is_some());
        assert!(ImageReference::Remote("https://x".to_string()).thumbnail().is_none());
    }

    #[test]
    fn test_product_record_deserialization() {
        let json = r#"{
            "collection_name": "HEM Product Catalogue",
            "category": "Masala Sticks",
            "subcategory": "N/A",
            "display_name": "Rose Stick",
            "image": "https://cdn.example.com/rose.jpg",
            "is_flagged_new": 1,
            "sequence_index": 4
        }"#;

        let record: ProductRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.display_name, "Rose Stick");
        assert!(record.is_flagged_new);
        assert!(matches!(record.image, ImageReference::Remote(_)));
        assert_eq!(record.sequence_index, 4);
    }

    #[test]
    fn test_case_size_entry_keeps_key_order() {
        let json = r#"{"Packing": "25 doz", "CBM": 0.045, "Carton Suffix": null}"#;
        let entry: CaseSizeEntry = serde_json::from_str(json).unwrap();
        let pairs: Vec<(&str, String)> = entry.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("Packing", "25 doz".to_string()),
                ("CBM", "0.045".to_string()),
                ("Carton Suffix", String::new()),
            ]
        );
    }

    #[test]
    fn test_export_request_defaults() {
        let request: ExportRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.client_name, DEFAULT_CLIENT_NAME);
        assert!(request.products.is_empty());
        assert!(request.case_sizes.is_empty());
    }
}
