//! In-memory audit event recorder.

use parking_lot::Mutex;

use super::{AuditEvent, AuditSink};

/// Keeps every recorded event in memory, in recording order.
///
/// Safe to share between request threads.
///
/// ```
/// use fhir_guard::audit::{AuditEvent, AuditOutcome, AuditTrail};
///
/// let trail = AuditTrail::new();
/// trail.record(AuditEvent::new("req-123", AuditOutcome::Success));
///
/// assert_eq!(trail.events().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct AuditTrail {
    events: Mutex<Vec<AuditEvent>>,
}

impl AuditTrail {
    /// Creates an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn record(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Events recorded for one request.
    pub fn for_request(&self, request_id: &str) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.request_id() == request_id)
            .cloned()
            .collect()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Drops every recorded event.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl AuditSink for AuditTrail {
    fn emit(&self, event: &AuditEvent) {
        self.record(event.clone());
    }
}
