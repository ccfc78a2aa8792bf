//! Catalog module
//!
//! Singer catalogs: discovery output and the selection input of a sync.
//!
//! # Overview
//!
//! - `discover` probes the account and lists every registered stream
//! - Custom field definitions type the `users` and `organizations` schemas
//! - Root `selected` metadata chooses the streams to sync
//! - Field metadata (`inclusion`, `selected`) chooses the fields to emit

mod custom_fields;
mod discover;
mod metadata;
mod types;

pub use custom_fields::{
    custom_field_schema, definitions_by_key, fetch_definitions, merge_custom_fields,
    readable_definitions, CUSTOM_FIELD_STREAMS, ORGANIZATION_FIELDS, USER_FIELDS,
};
pub use discover::discover;
pub use metadata::{generated_schema, load_metadata};
pub use types::{Catalog, CatalogEntry, MetadataEntry};
