//! Catalog discovery

use super::custom_fields::{custom_fields_property, readable_definitions, CUSTOM_FIELD_STREAMS};
use super::metadata::generated_schema;
use super::types::{Catalog, CatalogEntry};
use crate::error::{ApiErrorKind, Error, ErrorClass, Result};
use crate::streams::{registry, Stream, SyncContext};
use tracing::{info, warn};

/// Discover the catalog, probing every top-level stream's endpoint
///
/// Streams the credentials cannot read are reported with a warning and
/// still listed. If every probe is denied the discovery fails; any other
/// probe error propagates as is. The custom fields objects of `users` and
/// `organizations` are typed from the account's field definitions.
pub async fn discover(ctx: &SyncContext) -> Result<Catalog> {
    info!("Starting discover");

    let mut probed = 0;
    let mut denied = Vec::new();
    for descriptor in registry::top_level() {
        let stream = Stream::new(descriptor, false);
        probed += 1;
        match stream.check_access(ctx).await {
            Ok(()) => {}
            Err(e) if e.class() == ErrorClass::PermissionDenied => {
                warn!(stream = descriptor.name, "No read access: {e}");
                denied.push(descriptor.name);
            }
            Err(e) => return Err(e),
        }
    }

    if !denied.is_empty() {
        let message = format!(
            "HTTP-error-code: 403, Error: You are missing the following required scopes: read. \
             The account credentials supplied do not have read access for the following \
             stream(s): {}",
            denied.join(", ")
        );
        if denied.len() == probed {
            return Err(Error::Api {
                status: 403,
                kind: ApiErrorKind::Forbidden,
                message,
            });
        }
        warn!("{message}");
    }

    let mut catalog = Catalog {
        streams: registry::all()
            .iter()
            .map(CatalogEntry::for_descriptor)
            .collect(),
    };

    for (name, resource) in CUSTOM_FIELD_STREAMS {
        let Some(descriptor) = registry::get(name) else {
            continue;
        };
        let definitions = readable_definitions(ctx, name, resource).await?;
        let mut schema = generated_schema(descriptor);
        schema.add_property(resource, custom_fields_property(definitions.as_deref()));

        if let Some(entry) = catalog.streams.iter_mut().find(|e| e.tap_stream_id == *name) {
            *entry = CatalogEntry::with_schema(descriptor, schema);
        }
    }
    info!(streams = catalog.streams.len(), "Finished discover");
    Ok(catalog)
}
