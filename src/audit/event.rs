//! Audit event schema.

use std::fmt;

use crate::error::{Error, ErrorKind};
use crate::identity::{Identity, Role};
use crate::policy::Operation;

/// Category of an audited request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEventKind {
    /// Credentials were checked and rejected
    Authentication,
    /// An authenticated caller was refused by policy
    Authorization,
    /// A read or search ran
    ResourceAccess,
    /// A create, update or delete ran
    StateChange,
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEventKind::Authentication => write!(f, "authentication"),
            AuditEventKind::Authorization => write!(f, "authorization"),
            AuditEventKind::ResourceAccess => write!(f, "resource_access"),
            AuditEventKind::StateChange => write!(f, "state_change"),
        }
    }
}

/// How an audited request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    /// The operation completed
    Success,
    /// Authentication or authorization refused the request
    Denied,
    /// The operation failed for another reason
    Error,
}

impl AuditOutcome {
    /// Classifies a request error.
    pub fn from_error(error: &Error) -> Self {
        match error.kind() {
            ErrorKind::Authentication | ErrorKind::Forbidden => AuditOutcome::Denied,
            _ => AuditOutcome::Error,
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Denied => write!(f, "denied"),
            AuditOutcome::Error => write!(f, "error"),
        }
    }
}

/// One audited request.
///
/// Events carry identifiers and status only. Credentials and payload bodies
/// are never part of an event.
///
/// ```
/// use fhir_guard::audit::{AuditEvent, AuditEventKind, AuditOutcome};
/// use fhir_guard::{Identity, Operation};
///
/// let event = AuditEvent::new("req-1", AuditOutcome::Success)
///     .with_identity(&Identity::admin("admin"))
///     .with_operation(Operation::Delete)
///     .with_resource("Patient", Some("123"))
///     .with_status(204);
///
/// assert_eq!(event.kind(), AuditEventKind::StateChange);
/// assert_eq!(event.username(), Some("admin"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    request_id: String,
    username: Option<String>,
    role: Option<Role>,
    operation: Option<Operation>,
    resource_type: Option<String>,
    resource_id: Option<String>,
    outcome: AuditOutcome,
    status: Option<u16>,
    error: Option<ErrorKind>,
}

impl AuditEvent {
    /// Creates an event with only the request id and outcome filled in.
    pub fn new(request_id: impl Into<String>, outcome: AuditOutcome) -> Self {
        Self {
            request_id: request_id.into(),
            username: None,
            role: None,
            operation: None,
            resource_type: None,
            resource_id: None,
            outcome,
            status: None,
            error: None,
        }
    }

    /// Records who made the request.
    pub fn with_identity(mut self, identity: &Identity) -> Self {
        self.username = Some(identity.username().to_string());
        self.role = Some(identity.role());
        self
    }

    /// Records a username that could not be authenticated.
    pub fn with_claimed_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Records the requested operation.
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Records the targeted resource type and, if known, id.
    pub fn with_resource(mut self, resource_type: impl Into<String>, id: Option<&str>) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = id.map(str::to_string);
        self
    }

    /// Records the response status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Records the error kind and derives status and outcome from it.
    pub fn with_error(mut self, error: &Error) -> Self {
        self.error = Some(error.kind());
        self.status = Some(error.status());
        self.outcome = AuditOutcome::from_error(error);
        self
    }

    /// Derived category of the event.
    pub fn kind(&self) -> AuditEventKind {
        match self.error {
            Some(ErrorKind::Authentication) => AuditEventKind::Authentication,
            Some(ErrorKind::Forbidden) => AuditEventKind::Authorization,
            _ => match self.operation {
                Some(op) if op.is_write() => AuditEventKind::StateChange,
                _ => AuditEventKind::ResourceAccess,
            },
        }
    }

    /// Returns the request id.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the username, authenticated or merely claimed.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Returns the role of an authenticated caller.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Returns the operation.
    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    /// Returns the resource type.
    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }

    /// Returns the resource id.
    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    /// Returns the outcome.
    pub fn outcome(&self) -> AuditOutcome {
        self.outcome
    }

    /// Returns the response status.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns the error kind of a failed request.
    pub fn error(&self) -> Option<ErrorKind> {
        self.error
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AuditEvent[kind={}, outcome={}, request_id={}, username={}",
            self.kind(),
            self.outcome,
            self.request_id,
            self.username.as_deref().unwrap_or("<none>")
        )?;
        if let Some(op) = self.operation {
            write!(f, ", operation={op}")?;
        }
        if let Some(ty) = &self.resource_type {
            match &self.resource_id {
                Some(id) => write!(f, ", resource={ty}/{id}")?,
                None => write!(f, ", resource={ty}")?,
            }
        }
        if let Some(status) = self.status {
            write!(f, ", status={status}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_error_then_operation() {
        let read = AuditEvent::new("r", AuditOutcome::Success).with_operation(Operation::Read);
        assert_eq!(read.kind(), AuditEventKind::ResourceAccess);

        let write = read.clone().with_operation(Operation::Create);
        assert_eq!(write.kind(), AuditEventKind::StateChange);

        let denied = write.with_error(&Error::forbidden("no"));
        assert_eq!(denied.kind(), AuditEventKind::Authorization);
        assert_eq!(denied.outcome(), AuditOutcome::Denied);
        assert_eq!(denied.status(), Some(403));

        let unauthenticated = AuditEvent::new("r", AuditOutcome::Success)
            .with_claimed_username("mallory")
            .with_error(&Error::Authentication);
        assert_eq!(unauthenticated.kind(), AuditEventKind::Authentication);
        assert!(unauthenticated.role().is_none());
    }

    #[test]
    fn non_policy_errors_are_error_outcomes() {
        let event = AuditEvent::new("r", AuditOutcome::Success)
            .with_error(&Error::not_found("Patient", "1"));
        assert_eq!(event.outcome(), AuditOutcome::Error);
        assert_eq!(event.error(), Some(ErrorKind::NotFound));
    }

    #[test]
    fn display_lists_identifiers_only() {
        let event = AuditEvent::new("req-7", AuditOutcome::Success)
            .with_identity(&Identity::user("alice", Some("123")))
            .with_operation(Operation::Read)
            .with_resource("Patient", Some("123"))
            .with_status(200);

        let display = event.to_string();
        assert!(display.contains("request_id=req-7"));
        assert!(display.contains("username=alice"));
        assert!(display.contains("resource=Patient/123"));
        assert!(display.contains("status=200"));
    }

    #[test]
    fn anonymous_event_displays_placeholder() {
        let display = AuditEvent::new("req-anon", AuditOutcome::Denied).to_string();
        assert!(display.contains("<none>"));
    }
}
