//! Per-request audit events.
//!
//! Every request that reaches the gate produces exactly one [`AuditEvent`],
//! whether it succeeded, was denied or failed. Events hold identifiers and
//! status codes only; credentials and record bodies never appear in them.
//!
//! - [`AuditSink`]: where events go
//! - [`TracingAudit`]: structured `tracing` output on the `fhir_guard::audit` target
//! - [`AuditTrail`]: in-memory recorder, also usable as a sink

mod event;
mod sink;
mod trail;

pub use event::{AuditEvent, AuditEventKind, AuditOutcome};
pub use sink::{AuditSink, TracingAudit};
pub use trail::AuditTrail;
