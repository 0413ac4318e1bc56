//! Transport-neutral responses.

use serde_json::{json, Value};

use crate::error::{Error, ErrorKind};

/// Status code plus optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Resource, bundle or `OperationOutcome` document
    pub body: Option<Value>,
}

impl Response {
    /// A response carrying a JSON document.
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    /// `204 No Content`.
    pub fn no_content() -> Self {
        Self {
            status: 204,
            body: None,
        }
    }

    /// A `searchset` bundle wrapping `resources`.
    pub fn bundle(resources: Vec<Value>) -> Self {
        let entries: Vec<Value> = resources
            .into_iter()
            .map(|resource| json!({ "resource": resource }))
            .collect();
        Self::json(
            200,
            json!({
                "resourceType": "Bundle",
                "type": "searchset",
                "total": entries.len(),
                "entry": entries,
            }),
        )
    }

    /// Renders `error` as an `OperationOutcome` with the matching status.
    ///
    /// Internal errors are reported without their message.
    pub fn from_error(error: &Error) -> Self {
        let issues = match error {
            Error::Validation(failure) => failure
                .issues()
                .iter()
                .map(|issue| {
                    json!({
                        "severity": issue.severity.to_string().to_lowercase(),
                        "code": "invalid",
                        "diagnostics": issue.message,
                        "expression": [issue.location],
                    })
                })
                .collect(),
            Error::Internal(_) => vec![issue(error.kind(), "internal server error")],
            other => vec![issue(other.kind(), &other.to_string())],
        };
        Self::json(
            error.status(),
            json!({ "resourceType": "OperationOutcome", "issue": issues }),
        )
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn issue(kind: ErrorKind, diagnostics: &str) -> Value {
    let code = match kind {
        ErrorKind::Authentication => "login",
        ErrorKind::Forbidden => "forbidden",
        ErrorKind::NotFound => "not-found",
        ErrorKind::Conflict => "duplicate",
        ErrorKind::Validation => "invalid",
        ErrorKind::BadRequest => "structure",
        ErrorKind::Internal => "exception",
    };
    json!({ "severity": "error", "code": code, "diagnostics": diagnostics })
}
