//! Audit event destinations.

use std::sync::Arc;

use super::{AuditEvent, AuditTrail};

/// Receives one event per finished request.
pub trait AuditSink: Send + Sync {
    /// Delivers `event`. Must not fail the request it describes.
    fn emit(&self, event: &AuditEvent);
}

impl<S: AuditSink + ?Sized> AuditSink for Arc<S> {
    fn emit(&self, event: &AuditEvent) {
        (**self).emit(event);
    }
}

/// Emits audit events as structured `tracing` events on the
/// `fhir_guard::audit` target, optionally copying them into a trail.
///
/// ```
/// use std::sync::Arc;
/// use fhir_guard::audit::{AuditEvent, AuditOutcome, AuditSink, AuditTrail, TracingAudit};
///
/// let trail = Arc::new(AuditTrail::new());
/// let audit = TracingAudit::new().with_trail(Arc::clone(&trail));
///
/// audit.emit(&AuditEvent::new("req-1", AuditOutcome::Success));
/// assert_eq!(trail.len(), 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct TracingAudit {
    trail: Option<Arc<AuditTrail>>,
}

impl TracingAudit {
    /// Emits through `tracing` only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also records every event in `trail`.
    pub fn with_trail(mut self, trail: Arc<AuditTrail>) -> Self {
        self.trail = Some(trail);
        self
    }

    /// Returns the attached trail.
    pub fn trail(&self) -> Option<&Arc<AuditTrail>> {
        self.trail.as_ref()
    }
}

impl AuditSink for TracingAudit {
    fn emit(&self, event: &AuditEvent) {
        tracing::info!(
            target: "fhir_guard::audit",
            request_id = %event.request_id(),
            username = ?event.username(),
            role = ?event.role(),
            kind = %event.kind(),
            outcome = %event.outcome(),
            operation = ?event.operation(),
            resource_type = ?event.resource_type(),
            resource_id = ?event.resource_id(),
            status = ?event.status(),
            "audit event"
        );
        if let Some(trail) = &self.trail {
            trail.record(event.clone());
        }
    }
}
