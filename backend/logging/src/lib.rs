//! Telemetry and structured logging components for Herald.
//!
//! Handles log redaction, console/JSON file output, and the dispatch audit trail.

pub mod audit;
pub mod logger;
pub mod redact;

pub use audit::{DispatchAudit, DispatchAuditEntry, DispatchAuditEvent};
pub use logger::init_logger;
pub use redact::redact_sensitive_data;
