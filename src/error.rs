use std::fmt;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the access-control core.
///
/// Every variant maps to exactly one stable outcome (see [`Error::status`]),
/// so a transport binding never has to inspect messages to decide how to
/// answer a request.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing, malformed or wrong credentials.
    ///
    /// The message is identical for an unknown username and a wrong
    /// password so the outcome cannot be used to enumerate accounts.
    #[error("authentication failed: invalid credentials")]
    Authentication,

    /// The role or the ownership relation denies an otherwise valid operation.
    #[error("forbidden: {reason}")]
    Forbidden {
        /// Why access was denied
        reason: String,
    },

    /// No record exists under the given id.
    #[error("{resource_type} with id '{id}' not found")]
    NotFound {
        /// Resource type or entity name
        resource_type: &'static str,
        /// The id that was looked up
        id: String,
    },

    /// An id (or username) is already taken.
    #[error("{resource_type} with id '{id}' already exists")]
    Conflict {
        /// Resource type or entity name
        resource_type: &'static str,
        /// The colliding id
        id: String,
    },

    /// The external validator rejected a payload.
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    /// Malformed transport input (unknown resource type, missing body).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Anything unexpected, including persistence failures.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn forbidden(reason: impl Into<String>) -> Self {
        Error::Forbidden {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    pub(crate) fn conflict(resource_type: &'static str, id: impl Into<String>) -> Self {
        Error::Conflict {
            resource_type,
            id: id.into(),
        }
    }

    /// Returns the coarse category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Authentication => ErrorKind::Authentication,
            Error::Forbidden { .. } => ErrorKind::Forbidden,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::Validation(_) => ErrorKind::Validation,
            Error::BadRequest(_) => ErrorKind::BadRequest,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status code a transport binding should answer with.
    pub fn status(&self) -> u16 {
        self.kind().status()
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

/// Coarse error category, stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad or missing credentials
    Authentication,
    /// Role or ownership denial
    Forbidden,
    /// Unknown id
    NotFound,
    /// Id collision
    Conflict,
    /// Payload rejected by the validator
    Validation,
    /// Malformed transport input
    BadRequest,
    /// Unexpected failure
    Internal,
}

impl ErrorKind {
    /// HTTP status code for this category.
    pub fn status(self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Authentication => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Validation => 422,
            ErrorKind::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Severity of a single validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational, does not fail validation on its own
    Information,
    /// Suspicious but acceptable
    Warning,
    /// Invalid content
    Error,
    /// Unprocessable content
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Information => "INFORMATION",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        };
        f.write_str(name)
    }
}

/// One message reported by a validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// How serious the issue is
    pub severity: Severity,
    /// Human-readable description
    pub message: String,
    /// Where in the payload the issue was found
    pub location: String,
}

impl ValidationIssue {
    /// Creates a new issue.
    pub fn new(severity: Severity, message: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            location: location.into(),
        }
    }
}

/// A rejected payload together with every issue the validator reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    issues: Vec<ValidationIssue>,
}

impl ValidationFailure {
    /// Wraps a list of issues.
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    /// Shorthand for a failure with a single error-level issue.
    pub fn single(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::new(vec![ValidationIssue::new(Severity::Error, message, location)])
    }

    /// Returns the reported issues.
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "resource failed validation:")?;
        for issue in &self.issues {
            writeln!(
                f,
                "- {}: {} (at: {})",
                issue.severity, issue.message, issue.location
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_kind_has_a_stable_status() {
        assert_eq!(Error::Authentication.status(), 401);
        assert_eq!(Error::forbidden("nope").status(), 403);
        assert_eq!(Error::not_found("Patient", "1").status(), 404);
        assert_eq!(Error::conflict("Patient", "1").status(), 409);
        assert_eq!(
            Error::from(ValidationFailure::single("bad", "Patient.name")).status(),
            422
        );
        assert_eq!(Error::BadRequest("x".into()).status(), 400);
        assert_eq!(Error::Internal("x".into()).status(), 500);
    }

    #[test]
    fn authentication_message_does_not_mention_the_cause() {
        let msg = Error::Authentication.to_string();
        assert!(!msg.contains("unknown"));
        assert!(!msg.contains("password"));
    }

    #[test]
    fn validation_failure_lists_every_issue() {
        let failure = ValidationFailure::new(vec![
            ValidationIssue::new(Severity::Error, "missing status", "Observation.status"),
            ValidationIssue::new(Severity::Warning, "no text", "Observation.text"),
        ]);

        let rendered = failure.to_string();
        assert!(rendered.contains("- ERROR: missing status (at: Observation.status)"));
        assert!(rendered.contains("- WARNING: no text (at: Observation.text)"));
        assert_eq!(failure.issues().len(), 2);
    }

    #[test]
    fn not_found_names_type_and_id() {
        let err = Error::not_found("Observation", "obs-1");
        assert_eq!(err.to_string(), "Observation with id 'obs-1' not found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
