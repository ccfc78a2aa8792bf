//! Stream descriptors
//!
//! A descriptor is the static, data-driven definition of one resource:
//! where it lives, how it pages and how it replicates. Behaviour that differs
//! between resources is expressed with the small enums below instead of
//! per-resource code.

use crate::types::{PaginationType, ReplicationMethod};
use serde_json::{Map, Value};

// ============================================================================
// Behaviour selectors
// ============================================================================

/// Sync algorithm used for a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Page through the endpoint, filter client-side by bookmark
    Paginated,
    /// Incremental export seeded with `start_time`, bookmark advanced per record
    CursorExport,
    /// Hand-written algorithm
    Custom(CustomSync),
}

/// Streams with their own sync algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomSync {
    /// Ticket export plus the audits/comments/metrics fan-out
    Tickets,
    /// Metric event export that re-reads one second before the bookmark
    TicketMetricEvents,
    /// Only produced by the tickets fan-out
    TicketSideLoad,
}

/// Per-record rewrite applied before filtering and emission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordHook {
    None,
    /// Bare strings become `{"name": <string>}`
    WrapName,
    /// Copy the parent record's `id` into the named field
    AttachParentId(&'static str),
}

/// Extra request parameters derived from the bookmark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamsHook {
    None,
    /// `start_time=<bookmark epoch seconds>`
    StartTime,
}

/// What to do with an INCREMENTAL record lacking its replication key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingKeyPolicy {
    /// Fail the stream
    Fail,
    /// Emit the record when it has an `id`, drop it otherwise
    EmitIfKeyed,
}

/// How discovery probes a stream's endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessCheck {
    /// Any error fails the probe
    Probe,
    /// A 404 still proves access
    IgnoreNotFound,
    /// Reached only through a parent, nothing to probe
    Skip,
}

// ============================================================================
// Descriptor
// ============================================================================

/// Static definition of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Stream name, also the catalog `tap_stream_id`
    pub name: &'static str,
    pub replication_method: ReplicationMethod,
    /// Field bookmarked for INCREMENTAL streams
    pub replication_key: Option<&'static str>,
    /// Natural key, may be empty
    pub key_properties: &'static [&'static str],
    /// Path relative to the API root, may contain `{placeholder}`s
    pub endpoint: &'static str,
    /// Dot path to the records inside a page
    pub item_key: &'static str,
    pub pagination: PaginationType,
    pub strategy: SyncStrategy,
    /// Parent stream for sub-streams
    pub parent: Option<&'static str>,
    /// Endpoint placeholder filled with the parent record's `id`
    pub parent_key: Option<&'static str>,
    pub record_hook: RecordHook,
    pub params: ParamsHook,
    pub missing_key_policy: MissingKeyPolicy,
    pub access_check: AccessCheck,
    /// Related resource requested with `include=`
    pub side_load: Option<&'static str>,
}

impl StreamDescriptor {
    /// INCREMENTAL stream keyed on `id` and bookmarked on `updated_at`
    pub const fn incremental(
        name: &'static str,
        endpoint: &'static str,
        item_key: &'static str,
        pagination: PaginationType,
    ) -> Self {
        Self {
            name,
            replication_method: ReplicationMethod::Incremental,
            replication_key: Some("updated_at"),
            key_properties: &["id"],
            endpoint,
            item_key,
            pagination,
            strategy: SyncStrategy::Paginated,
            parent: None,
            parent_key: None,
            record_hook: RecordHook::None,
            params: ParamsHook::None,
            missing_key_policy: MissingKeyPolicy::Fail,
            access_check: AccessCheck::Probe,
            side_load: None,
        }
    }

    /// FULL_TABLE stream keyed on `id`
    pub const fn full_table(
        name: &'static str,
        endpoint: &'static str,
        item_key: &'static str,
        pagination: PaginationType,
    ) -> Self {
        let mut descriptor = Self::incremental(name, endpoint, item_key, pagination);
        descriptor.replication_method = ReplicationMethod::FullTable;
        descriptor.replication_key = None;
        descriptor
    }

    /// Bookmark a different field
    pub const fn replication_key(mut self, key: &'static str) -> Self {
        self.replication_key = Some(key);
        self
    }

    /// Set the natural key
    pub const fn keys(mut self, keys: &'static [&'static str]) -> Self {
        self.key_properties = keys;
        self
    }

    /// Set the sync algorithm
    pub const fn strategy(mut self, strategy: SyncStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Make this a sub-stream of `parent`, reached through `placeholder`
    ///
    /// Sub-streams are only reachable through their parent, so their
    /// access probe is skipped.
    pub const fn child_of(mut self, parent: &'static str, placeholder: &'static str) -> Self {
        self.parent = Some(parent);
        self.parent_key = Some(placeholder);
        self.access_check = AccessCheck::Skip;
        self
    }

    /// Set the record hook
    pub const fn record_hook(mut self, hook: RecordHook) -> Self {
        self.record_hook = hook;
        self
    }

    /// Set the request params hook
    pub const fn params(mut self, hook: ParamsHook) -> Self {
        self.params = hook;
        self
    }

    /// Set the missing replication key policy
    pub const fn missing_key_policy(mut self, policy: MissingKeyPolicy) -> Self {
        self.missing_key_policy = policy;
        self
    }

    /// Set the discovery probe behaviour
    pub const fn access_check(mut self, check: AccessCheck) -> Self {
        self.access_check = check;
        self
    }

    /// Request a side-loaded resource
    pub const fn side_load(mut self, resource: &'static str) -> Self {
        self.side_load = Some(resource);
        self
    }

    /// Check if this stream is bookmark-driven
    pub fn is_incremental(&self) -> bool {
        self.replication_method == ReplicationMethod::Incremental
    }

    /// Bookmark key, only for INCREMENTAL streams
    pub fn bookmark_key(&self) -> Option<&'static str> {
        if self.is_incremental() {
            self.replication_key
        } else {
            None
        }
    }

    /// Check if this stream has a parent
    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    /// Apply the record hook
    pub fn modify_record(&self, record: Value, parent: Option<&Value>) -> Value {
        match self.record_hook {
            RecordHook::None => record,
            RecordHook::WrapName => match record {
                Value::String(name) => {
                    let mut wrapped = Map::new();
                    wrapped.insert("name".to_string(), Value::String(name));
                    Value::Object(wrapped)
                }
                other => other,
            },
            RecordHook::AttachParentId(field) => {
                let mut record = record;
                if let (Value::Object(fields), Some(parent)) = (&mut record, parent) {
                    let parent_id = parent.get("id").cloned().unwrap_or(Value::Null);
                    fields.insert(field.to_string(), parent_id);
                }
                record
            }
        }
    }
}
