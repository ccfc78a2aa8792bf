//! Schema module
//!
//! JSON Schema types for generated stream schemas and the transformer
//! that conforms records to a catalog schema before they are emitted.
//!
//! # Features
//!
//! - **Type Coercion**: numeric strings, booleans and numbers are converted
//!   to the declared type
//! - **Timestamps**: `date-time` strings are normalised to RFC 3339 UTC
//! - **Field Selection**: unselected and unsupported fields are dropped
//! - **Nested Object Support**: objects and arrays are handled recursively

mod transform;
mod types;

pub use transform::Transformer;
pub use types::{JsonSchema, JsonType, JsonTypeOrArray, SchemaProperty};
