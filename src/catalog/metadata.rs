//! Generated schemas and catalog metadata

use super::types::{CatalogEntry, MetadataEntry};
use crate::schema::{JsonSchema, JsonType, JsonTypeOrArray, SchemaProperty};
use crate::streams::{RecordHook, StreamDescriptor};
use serde_json::{json, Map, Value};

/// Integer or string identifiers
fn identifier() -> SchemaProperty {
    SchemaProperty {
        json_type: JsonTypeOrArray::Multiple(vec![JsonType::Integer, JsonType::String, JsonType::Null]),
        ..SchemaProperty::new(JsonType::Integer)
    }
}

/// Permissive schema typing only the fields the tap relies on
///
/// Keys, the replication key and any attached parent id are typed; all
/// other fields pass through untouched.
pub fn generated_schema(descriptor: &StreamDescriptor) -> JsonSchema {
    let mut schema = JsonSchema::new();

    for key in descriptor.key_properties {
        let property = if *key == "id" {
            identifier()
        } else {
            SchemaProperty::nullable(JsonType::String)
        };
        schema.add_property(key, property);
    }

    if let RecordHook::AttachParentId(field) = descriptor.record_hook {
        schema.add_property(field, identifier());
    }

    if let Some(key) = descriptor.replication_key {
        let property = if key == "generated_timestamp" {
            SchemaProperty::nullable(JsonType::Integer)
        } else {
            SchemaProperty::date_time()
        };
        schema.add_property(key, property);
    }

    schema
}

/// Catalog metadata for a stream and every field of its schema
///
/// Keys and the replication key are `automatic`; all other fields are
/// `available`.
pub fn load_metadata(descriptor: &StreamDescriptor, schema: &JsonSchema) -> Vec<MetadataEntry> {
    let mut root = Map::new();
    root.insert(
        "table-key-properties".to_string(),
        json!(descriptor.key_properties),
    );
    root.insert(
        "forced-replication-method".to_string(),
        json!(descriptor.replication_method.as_str()),
    );
    if let Some(key) = descriptor.replication_key {
        root.insert("valid-replication-keys".to_string(), json!([key]));
    }
    if let Some(parent) = descriptor.parent {
        root.insert("parent-tap-stream-id".to_string(), json!(parent));
    }

    let mut entries = vec![MetadataEntry::root(root)];
    for name in schema.properties.keys() {
        let automatic = descriptor.key_properties.iter().any(|k| k == name)
            || descriptor.replication_key == Some(name.as_str());
        let mut field = Map::new();
        field.insert(
            "inclusion".to_string(),
            Value::from(if automatic { "automatic" } else { "available" }),
        );
        entries.push(MetadataEntry::field(name, field));
    }
    entries
}

impl CatalogEntry {
    /// Discovered, unselected entry for a registered stream
    pub fn for_descriptor(descriptor: &StreamDescriptor) -> Self {
        Self::with_schema(descriptor, generated_schema(descriptor))
    }

    /// Discovered, unselected entry with an explicit schema
    pub fn with_schema(descriptor: &StreamDescriptor, schema: JsonSchema) -> Self {
        let metadata = load_metadata(descriptor, &schema);
        Self {
            tap_stream_id: descriptor.name.to_string(),
            stream: descriptor.name.to_string(),
            schema: schema.to_json(),
            key_properties: descriptor
                .key_properties
                .iter()
                .map(ToString::to_string)
                .collect(),
            metadata,
        }
    }
}
