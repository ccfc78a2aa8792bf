//! Catalog types

use crate::error::{Error, Result};
use crate::schema::Transformer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::Path;

// ============================================================================
// Catalog Types
// ============================================================================

/// Singer catalog: every stream the tap can sync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Catalog entries, in sync order
    pub streams: Vec<CatalogEntry>,
}

/// One stream in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stream identifier
    pub tap_stream_id: String,

    /// Stream name
    pub stream: String,

    /// JSON schema for the stream's records
    #[serde(default)]
    pub schema: Value,

    /// Primary key fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_properties: Vec<String>,

    /// Metadata entries keyed by breadcrumb
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
}

/// Metadata attached to the stream (empty breadcrumb) or one of its fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Path to the node, e.g. `[]` or `["properties", "id"]`
    pub breadcrumb: Vec<String>,

    /// Metadata values (`selected`, `inclusion`, ...)
    pub metadata: Map<String, Value>,
}

impl MetadataEntry {
    /// Stream-level metadata
    pub fn root(metadata: Map<String, Value>) -> Self {
        Self {
            breadcrumb: Vec::new(),
            metadata,
        }
    }

    /// Field-level metadata
    pub fn field(name: &str, metadata: Map<String, Value>) -> Self {
        Self {
            breadcrumb: vec!["properties".to_string(), name.to_string()],
            metadata,
        }
    }

    /// Field name for a `["properties", name]` breadcrumb
    pub fn field_name(&self) -> Option<&str> {
        match self.breadcrumb.as_slice() {
            [properties, name] if properties == "properties" => Some(name),
            _ => None,
        }
    }

    fn flag(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(Value::as_bool)
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

// ============================================================================
// Catalog
// ============================================================================

impl Catalog {
    /// Parse a catalog from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::config(format!("Invalid catalog JSON: {e}")))
    }

    /// Read a catalog file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config(format!(
                "Failed to read catalog file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_json(&content)
    }

    /// Look up an entry by stream id
    pub fn get(&self, tap_stream_id: &str) -> Option<&CatalogEntry> {
        self.streams.iter().find(|s| s.tap_stream_id == tap_stream_id)
    }

    /// Check if a stream is selected
    ///
    /// Streams missing from the catalog are not selected.
    pub fn is_selected(&self, tap_stream_id: &str) -> bool {
        self.get(tap_stream_id).is_some_and(CatalogEntry::is_selected)
    }

    /// Mark the named streams selected, and every other stream unselected
    pub fn select(&mut self, names: &[&str]) {
        for entry in &mut self.streams {
            let selected = names.contains(&entry.tap_stream_id.as_str());
            entry.set_selected(selected);
        }
    }

    /// Pretty JSON for `discover`
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// Catalog Entry
// ============================================================================

impl CatalogEntry {
    /// Stream-level metadata, if present
    pub fn root_metadata(&self) -> Option<&MetadataEntry> {
        self.metadata.iter().find(|m| m.breadcrumb.is_empty())
    }

    /// Check the root `selected` flag
    pub fn is_selected(&self) -> bool {
        self.root_metadata()
            .and_then(|m| m.flag("selected"))
            .unwrap_or(false)
    }

    /// Set the root `selected` flag
    pub fn set_selected(&mut self, selected: bool) {
        match self.metadata.iter_mut().find(|m| m.breadcrumb.is_empty()) {
            Some(root) => {
                root.metadata
                    .insert("selected".to_string(), Value::Bool(selected));
            }
            None => {
                let mut metadata = Map::new();
                metadata.insert("selected".to_string(), Value::Bool(selected));
                self.metadata.insert(0, MetadataEntry::root(metadata));
            }
        }
    }

    /// Primary keys, preferring `table-key-properties` metadata
    pub fn key_properties(&self) -> Vec<String> {
        self.root_metadata()
            .and_then(|m| m.metadata.get("table-key-properties"))
            .and_then(Value::as_array)
            .map(|keys| {
                keys.iter()
                    .filter_map(Value::as_str)
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_else(|| self.key_properties.clone())
    }

    /// Fields that must not be emitted
    ///
    /// A field is dropped when its inclusion is `unsupported`, or when it
    /// is deselected and not `automatic`.
    pub fn excluded_fields(&self) -> BTreeSet<String> {
        self.metadata
            .iter()
            .filter_map(|entry| {
                let name = entry.field_name()?;
                let inclusion = entry.text("inclusion");
                let excluded = inclusion == Some("unsupported")
                    || (entry.flag("selected") == Some(false) && inclusion != Some("automatic"));
                excluded.then(|| name.to_string())
            })
            .collect()
    }

    /// Transformer for this entry's records
    pub fn transformer(&self) -> Transformer {
        Transformer::new(
            self.tap_stream_id.clone(),
            self.schema.clone(),
            self.excluded_fields(),
        )
    }
}
