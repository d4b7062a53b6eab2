//! Dispatch audit trail
//!
//! One structured record per dispatch decision, emitted on the
//! `dispatch_events` target so it can be routed to its own sink.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchAuditEvent {
    Invoked {
        command: String,
        alias: String,
        arguments: String,
    },
    PermissionDenied {
        command: String,
    },
    ChannelRestricted {
        command: String,
        required_channel: u64,
    },
    Failed {
        command: String,
        error_msg: String,
    },
}

#[derive(Debug, Serialize)]
pub struct DispatchAuditEntry {
    pub actor_id: u64,
    pub channel_id: u64,
    pub guild_id: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub event: DispatchAuditEvent,
}

pub struct DispatchAudit;

impl DispatchAudit {
    /// Redact user-controlled text and emit the record through `tracing`.
    pub fn record(
        actor_id: u64,
        channel_id: u64,
        guild_id: Option<u64>,
        event: DispatchAuditEvent,
    ) -> DispatchAuditEntry {
        let event = match event {
            DispatchAuditEvent::Invoked { command, alias, arguments } => DispatchAuditEvent::Invoked {
                command,
                alias,
                arguments: redact_sensitive_data(&arguments),
            },
            DispatchAuditEvent::Failed { command, error_msg } => DispatchAuditEvent::Failed {
                command,
                error_msg: redact_sensitive_data(&error_msg),
            },
            other => other,
        };

        let entry = DispatchAuditEntry {
            actor_id,
            channel_id,
            guild_id,
            timestamp: Utc::now(),
            event,
        };

        info!(target: "dispatch_events", event = ?entry, "Dispatch audit event");
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoked_arguments_are_redacted() {
        let entry = DispatchAudit::record(
            1,
            2,
            Some(3),
            DispatchAuditEvent::Invoked {
                command: "say".into(),
                alias: "echo".into(),
                arguments: "Bearer abcdef123456".into(),
            },
        );
        match entry.event {
            DispatchAuditEvent::Invoked { arguments, .. } => {
                assert_eq!(arguments, "[REDACTED_TOKEN]");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn serializes_with_type_tag() {
        let entry = DispatchAudit::record(
            1,
            2,
            None,
            DispatchAuditEvent::PermissionDenied { command: "ban".into() },
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["event"]["type"], "permission_denied");
        assert!(json["guild_id"].is_null());
    }
}
