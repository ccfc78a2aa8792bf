//! Record transformation
//!
//! Coerces record values to the types their stream schema declares and
//! drops the fields the catalog excludes.

use super::types::{JsonType, JsonTypeOrArray};
use crate::error::{Error, Result};
use crate::state::{format_timestamp, parse_timestamp};
use serde_json::{Map, Number, Value};
use std::collections::BTreeSet;

/// Schema-driven record transformer for one stream
#[derive(Debug, Clone)]
pub struct Transformer {
    stream: String,
    schema: Value,
    excluded: BTreeSet<String>,
}

impl Transformer {
    /// Create a transformer
    ///
    /// `excluded` lists top-level fields that must never be emitted.
    pub fn new(stream: impl Into<String>, schema: Value, excluded: BTreeSet<String>) -> Self {
        Self {
            stream: stream.into(),
            schema,
            excluded,
        }
    }

    /// Transformer that only passes records through
    pub fn passthrough(stream: impl Into<String>) -> Self {
        Self::new(stream, Value::Null, BTreeSet::new())
    }

    /// Transform one record
    pub fn transform(&self, record: Value) -> Result<Value> {
        let Value::Object(fields) = record else {
            return Err(Error::transform(
                &self.stream,
                "",
                format!("record is not an object: {record}"),
            ));
        };

        let mut out = Map::with_capacity(fields.len());
        for (name, value) in fields {
            if self.excluded.contains(&name) {
                continue;
            }
            let value = match self.schema.get("properties").and_then(|p| p.get(&name)) {
                Some(field_schema) => self.coerce(value, field_schema, &name)?,
                None => value,
            };
            out.insert(name, value);
        }
        Ok(Value::Object(out))
    }

    fn coerce(&self, value: Value, schema: &Value, path: &str) -> Result<Value> {
        if let Some(Value::Array(options)) = schema.get("anyOf") {
            for option in options {
                if let Ok(coerced) = self.coerce(value.clone(), option, path) {
                    return Ok(coerced);
                }
            }
            return Err(self.mismatch(&value, "anyOf", path));
        }

        let Some(types) = JsonTypeOrArray::from_schema(schema) else {
            return Ok(value);
        };

        if value.is_null() {
            return if types.is_nullable() {
                Ok(Value::Null)
            } else {
                Err(self.mismatch(&value, &types.to_string(), path))
            };
        }

        for json_type in types.types() {
            if let Some(coerced) = self.try_type(&value, json_type, schema, path)? {
                return Ok(coerced);
            }
        }

        Err(self.mismatch(&value, &types.to_string(), path))
    }

    /// Convert `value` to `json_type`, `None` when it does not fit
    fn try_type(
        &self,
        value: &Value,
        json_type: JsonType,
        schema: &Value,
        path: &str,
    ) -> Result<Option<Value>> {
        let coerced = match (json_type, value) {
            (JsonType::Null, _) => None,
            (JsonType::Integer, Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    Some(value.clone())
                } else {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| Value::from(f as i64))
                }
            }
            (JsonType::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
            (JsonType::Number, Value::Number(_)) => Some(value.clone()),
            (JsonType::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            (JsonType::Boolean, Value::Bool(_)) => Some(value.clone()),
            (JsonType::Boolean, Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            (JsonType::String, Value::String(s)) => {
                if schema.get("format").and_then(Value::as_str) == Some("date-time") {
                    match parse_timestamp(value) {
                        Some(dt) => Some(Value::String(format_timestamp(dt))),
                        None => {
                            return Err(Error::transform(
                                &self.stream,
                                path,
                                format!("'{s}' is not a valid date-time"),
                            ))
                        }
                    }
                } else {
                    Some(value.clone())
                }
            }
            (JsonType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (JsonType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
            (JsonType::Object, Value::Object(fields)) => {
                Some(self.coerce_object(fields, schema, path)?)
            }
            (JsonType::Array, Value::Array(items)) => {
                let item_schema = schema.get("items");
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{path}[{i}]");
                    out.push(match item_schema {
                        Some(s) => self.coerce(item.clone(), s, &item_path)?,
                        None => item.clone(),
                    });
                }
                Some(Value::Array(out))
            }
            _ => None,
        };
        Ok(coerced)
    }

    fn coerce_object(&self, fields: &Map<String, Value>, schema: &Value, path: &str) -> Result<Value> {
        let properties = schema.get("properties");
        let mut out = Map::with_capacity(fields.len());
        for (name, value) in fields {
            let field_path = format!("{path}.{name}");
            let value = match properties.and_then(|p| p.get(name)) {
                Some(field_schema) => self.coerce(value.clone(), field_schema, &field_path)?,
                None => value.clone(),
            };
            out.insert(name.clone(), value);
        }
        Ok(Value::Object(out))
    }

    fn mismatch(&self, value: &Value, expected: &str, path: &str) -> Error {
        Error::transform(
            &self.stream,
            path,
            format!("cannot coerce {value} to {expected}"),
        )
    }
}
