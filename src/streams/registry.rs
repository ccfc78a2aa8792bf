//! Stream registry
//!
//! Every resource the tap knows about, in catalog order.

use super::descriptor::{
    AccessCheck, CustomSync, MissingKeyPolicy, ParamsHook, RecordHook, StreamDescriptor,
    SyncStrategy,
};
use crate::types::PaginationType::{Cursor, CursorExport, Offset, TimeExport};
use crate::types::PaginationType;

const fn incremental(
    name: &'static str,
    endpoint: &'static str,
    item_key: &'static str,
    pagination: PaginationType,
) -> StreamDescriptor {
    StreamDescriptor::incremental(name, endpoint, item_key, pagination)
}

const fn full_table(
    name: &'static str,
    endpoint: &'static str,
    item_key: &'static str,
    pagination: PaginationType,
) -> StreamDescriptor {
    StreamDescriptor::full_table(name, endpoint, item_key, pagination)
}

static STREAMS: &[StreamDescriptor] = &[
    full_table("account_attribute_definitions", "routing/attributes/definitions", "definitions", Offset)
        .keys(&[]),
    incremental("account_attributes", "routing/attributes", "attributes", Offset),
    incremental("activities", "activities", "activities", Offset),
    incremental("audit_logs", "audit_logs", "audit_logs", Offset).replication_key("created_at"),
    incremental("automations", "automations", "automations", Cursor),
    incremental("bookmarks", "bookmarks", "bookmarks", Offset).replication_key("created_at"),
    incremental("brands", "brands", "brands", Offset),
    incremental("custom_objects", "custom_objects", "custom_objects", Offset).keys(&["key"]),
    incremental("custom_roles", "custom_roles", "custom_roles", Offset),
    incremental("deleted_tickets", "deleted_tickets", "deleted_tickets", Offset),
    incremental("deleted_users", "deleted_users", "deleted_users", Cursor),
    incremental("dynamic_content_items", "dynamic_content/items", "items", Offset),
    incremental("groups", "groups", "groups", Cursor),
    incremental("group_memberships", "group_memberships", "group_memberships", Cursor)
        .missing_key_policy(MissingKeyPolicy::EmitIfKeyed),
    incremental("incremental_ticket_events", "incremental/ticket_events", "ticket_events", CursorExport)
        .replication_key("created_at")
        .strategy(SyncStrategy::CursorExport),
    full_table("job_statuses", "job_statuses", "job_statuses", Cursor),
    incremental("locales", "locales", "locales", Offset),
    full_table("macro_actions", "macros/actions", "actions", Offset).keys(&["field"]),
    full_table("macro_attachments", "macros/{macro_id}/attachments", "macro_attachments", Offset)
        .keys(&["id"])
        .child_of("macros", "macro_id")
        .record_hook(RecordHook::AttachParentId("macro_id")),
    full_table("macro_categories", "macros/categories", "categories", Offset)
        .keys(&["name"])
        .record_hook(RecordHook::WrapName),
    full_table("macro_definitions", "macros/definitions", "definitions.actions", Offset)
        .keys(&["subject"]),
    incremental("macros", "macros", "macros", Cursor),
    incremental("monitored_twitter_handles", "channels/twitter/monitored_twitter_handles", "monitored_twitter_handles", Offset),
    incremental("organization_memberships", "organization_memberships", "organization_memberships", Cursor),
    incremental("organization_subscriptions", "organization_subscriptions", "organization_subscriptions", Cursor)
        .replication_key("created_at"),
    incremental("organizations", "incremental/organizations.json", "organizations", TimeExport)
        .params(ParamsHook::StartTime),
    incremental("recipient_addresses", "recipient_addresses", "recipient_addresses", Offset),
    incremental("requests", "requests", "requests", Offset),
    incremental("resource_collections", "resource_collections", "resource_collections", Offset),
    incremental("satisfaction_ratings", "satisfaction_ratings", "satisfaction_ratings", Cursor)
        .params(ParamsHook::StartTime),
    incremental("satisfaction_reasons", "satisfaction_reasons", "reasons", Offset),
    incremental("schedule_holidays", "business_hours/schedules/{schedule_id}/holidays", "holidays", Offset)
        .replication_key("start_date")
        .child_of("schedules", "schedule_id")
        .record_hook(RecordHook::AttachParentId("schedule_id")),
    incremental("schedules", "business_hours/schedules", "schedules", Offset),
    incremental("sessions", "sessions", "sessions", Offset).replication_key("last_seen_at"),
    incremental("sharing_agreements", "sharing_agreements", "sharing_agreements", Offset),
    incremental("side_conversations", "tickets/{ticket_id}/side_conversations", "side_conversations", Offset)
        .child_of("tickets", "ticket_id"),
    incremental("side_conversations_events", "tickets/side_conversations/events", "events", Offset)
        .replication_key("created_at"),
    full_table("sla_policies", "slas/policies", "sla_policies", Offset),
    incremental("support_requests", "requests", "requests", Cursor),
    incremental("suspended_tickets", "suspended_tickets", "suspended_tickets", Offset),
    full_table("tags", "tags", "tags", Cursor).keys(&["name"]),
    full_table("talk_phone_numbers", "channels/voice/phone_numbers", "phone_numbers", Offset)
        .access_check(AccessCheck::IgnoreNotFound),
    incremental("target_failures", "target_failures", "target_failures", Offset)
        .replication_key("created_at"),
    full_table("targets", "targets", "targets", Offset),
    incremental("ticket_audits", "tickets/{ticket_id}/audits.json", "audits", Offset)
        .replication_key("created_at")
        .strategy(SyncStrategy::Custom(CustomSync::TicketSideLoad))
        .child_of("tickets", "ticket_id")
        .access_check(AccessCheck::IgnoreNotFound),
    incremental("ticket_comments", "tickets/{ticket_id}/audits.json", "audits", Offset)
        .replication_key("created_at")
        .strategy(SyncStrategy::Custom(CustomSync::TicketSideLoad))
        .child_of("tickets", "ticket_id"),
    incremental("ticket_fields", "ticket_fields", "ticket_fields", Cursor),
    incremental("ticket_forms", "ticket_forms", "ticket_forms", Offset),
    incremental("ticket_metric_events", "incremental/ticket_metric_events.json", "ticket_metric_events", TimeExport)
        .replication_key("time")
        .strategy(SyncStrategy::Custom(CustomSync::TicketMetricEvents))
        .access_check(AccessCheck::IgnoreNotFound),
    incremental("ticket_metrics", "tickets/{ticket_id}/metrics", "ticket_metric", Offset)
        .strategy(SyncStrategy::Custom(CustomSync::TicketSideLoad))
        .child_of("tickets", "ticket_id"),
    incremental("ticket_skips", "skips", "skips", Cursor),
    incremental("tickets", "incremental/tickets/cursor.json", "tickets", CursorExport)
        .replication_key("generated_timestamp")
        .strategy(SyncStrategy::Custom(CustomSync::Tickets))
        .side_load("metric_sets"),
    incremental("trigger_categories", "trigger_categories", "trigger_categories", Cursor),
    incremental("trigger_revisions", "triggers/{trigger_id}/revisions", "trigger_revisions", Offset)
        .replication_key("created_at")
        .keys(&["id", "trigger_id"])
        .child_of("triggers", "trigger_id")
        .record_hook(RecordHook::AttachParentId("trigger_id")),
    incremental("triggers", "triggers", "triggers", Cursor),
    incremental("user_attribute_values", "routing/agents/{user_id}/instance_values", "attribute_values", Offset)
        .child_of("users", "user_id"),
    incremental("user_identities", "users/{user_id}/identities", "identities", Cursor)
        .child_of("users", "user_id"),
    incremental("users", "incremental/users/cursor.json", "users", CursorExport)
        .strategy(SyncStrategy::CursorExport),
    incremental("views", "views", "views", Cursor),
    incremental("workspaces", "workspaces", "workspaces", Offset),
];

/// Every registered stream, in catalog order
pub fn all() -> &'static [StreamDescriptor] {
    STREAMS
}

/// Look up a stream by name
pub fn get(name: &str) -> Option<&'static StreamDescriptor> {
    STREAMS.iter().find(|d| d.name == name)
}

/// Sub-streams of `parent`
pub fn children_of(parent: &str) -> impl Iterator<Item = &'static StreamDescriptor> + '_ {
    STREAMS.iter().filter(move |d| d.parent == Some(parent))
}

/// Streams without a parent
pub fn top_level() -> impl Iterator<Item = &'static StreamDescriptor> {
    STREAMS.iter().filter(|d| d.parent.is_none())
}
