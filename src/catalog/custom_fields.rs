//! Account-defined custom fields
//!
//! `users` and `organizations` carry a free-form object (`user_fields`,
//! `organization_fields`) whose keys each account defines. Discovery types
//! that object from the field definitions; the users sync merges the
//! definitions into every record.

use crate::error::{ErrorClass, Result};
use crate::pagination::{extract_records, paginate, NextPagePaginator};
use crate::schema::{JsonType, SchemaProperty};
use crate::streams::SyncContext;
use futures::StreamExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// User field definitions, also the users property they describe
pub const USER_FIELDS: &str = "user_fields";
/// Organization field definitions, also the organizations property they describe
pub const ORGANIZATION_FIELDS: &str = "organization_fields";

/// Streams with a custom fields object, and the resource defining it
pub const CUSTOM_FIELD_STREAMS: &[(&str, &str)] =
    &[("users", USER_FIELDS), ("organizations", ORGANIZATION_FIELDS)];

const PAGE_SIZE: u32 = 100;

/// Every definition of `resource`, following `next_page`
pub async fn fetch_definitions(ctx: &SyncContext, resource: &str) -> Result<Vec<Value>> {
    let paginator = Arc::new(NextPagePaginator::new(PAGE_SIZE, Vec::new()));
    let mut pages = paginate(ctx.client.clone(), resource, paginator);
    let mut definitions = Vec::new();

    while let Some(page) = pages.next().await {
        definitions.extend(extract_records(&page?, resource));
    }

    debug!(resource, count = definitions.len(), "Fetched custom field definitions");
    Ok(definitions)
}

/// Definitions of `resource`, or `None` when the credentials cannot read them
///
/// Only a permission failure is tolerated.
pub async fn readable_definitions(
    ctx: &SyncContext,
    stream: &str,
    resource: &str,
) -> Result<Option<Vec<Value>>> {
    match fetch_definitions(ctx, resource).await {
        Ok(definitions) => Ok(Some(definitions)),
        Err(e) if e.class() == ErrorClass::PermissionDenied => {
            warn!(
                stream,
                "The account credentials supplied do not have access to `{stream}` custom fields: {e}"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Schema of one field definition
///
/// Unknown types are logged and typed as strings.
pub fn custom_field_schema(field: &Value) -> SchemaProperty {
    let field_type = field.get("type").and_then(Value::as_str).unwrap_or_default();
    let json_type = match field_type {
        "text" | "textarea" | "date" | "regexp" | "dropdown" => JsonType::String,
        "integer" | "lookup" => JsonType::Integer,
        "decimal" => JsonType::Number,
        "checkbox" => JsonType::Boolean,
        other => {
            error!(
                key = %field["key"],
                title = %field["title"],
                "Discovered unsupported custom field type: {other}"
            );
            JsonType::String
        }
    };

    let property = SchemaProperty::nullable(json_type);
    match field_type {
        "date" => property.with_format("date-time"),
        "dropdown" => {
            let values = field
                .get("custom_field_options")
                .and_then(Value::as_array)
                .map(|options| {
                    options
                        .iter()
                        .filter_map(|option| option.get("value").cloned())
                        .collect()
                })
                .unwrap_or_default();
            property.with_enum(values)
        }
        _ => property,
    }
}

/// Object property with one typed entry per definition `key`
///
/// Without definitions the object stays untyped.
pub fn custom_fields_property(definitions: Option<&[Value]>) -> SchemaProperty {
    let Some(definitions) = definitions else {
        return SchemaProperty::nullable(JsonType::Object);
    };

    let properties = definitions
        .iter()
        .filter_map(|field| {
            let key = field.get("key")?.as_str()?;
            Some((key.to_string(), custom_field_schema(field)))
        })
        .collect();
    SchemaProperty::object(properties)
}

/// Definitions indexed by `key`, later ones winning
pub fn definitions_by_key(definitions: Vec<Value>) -> BTreeMap<String, Value> {
    definitions
        .into_iter()
        .filter_map(|field| {
            let key = field.get("key")?.as_str()?.to_string();
            Some((key, field))
        })
        .collect()
}

/// Replace every custom field of `record` with its definition plus `value`
///
/// Fields the record lacks get a null `value`. A record without the
/// `property` object is left as is.
pub fn merge_custom_fields(
    record: &mut Value,
    property: &str,
    definitions: &BTreeMap<String, Value>,
) {
    let Some(fields) = record.get_mut(property).and_then(Value::as_object_mut) else {
        return;
    };

    for (key, definition) in definitions {
        let value = fields.remove(key).unwrap_or(Value::Null);
        let mut merged = definition.clone();
        if let Value::Object(merged) = &mut merged {
            merged.insert("value".to_string(), value);
        }
        fields.insert(key.clone(), merged);
    }
}
