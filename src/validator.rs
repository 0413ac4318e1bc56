//! Payload validation collaborators.
//!
//! Full clinical schema validation lives outside this crate. The service
//! only needs a yes/no answer plus the issue list, which is what
//! [`Validator`] provides.

use crate::error::{Severity, ValidationFailure, ValidationIssue};
use crate::resource::Resource;
use crate::tainted::Tainted;
use crate::verified::Verified;

/// Checks a record before it is written.
///
/// Any implementor can be plugged into a
/// [`ResourceService`](crate::ResourceService). Plain closures work too:
///
/// ```
/// use fhir_guard::{Patient, Tainted, ValidationFailure, Validator};
/// use serde_json::json;
///
/// let has_name = |p: &Patient| {
///     if p.body.get("name").is_some() {
///         Ok(())
///     } else {
///         Err(ValidationFailure::single("name is required", "Patient.name"))
///     }
/// };
///
/// assert!(has_name.verify(Tainted::new(Patient::new(json!({"name": "Ana"})))).is_ok());
/// assert!(has_name.verify(Tainted::new(Patient::new(json!({})))).is_err());
/// ```
pub trait Validator<R>: Send + Sync {
    /// Returns every issue found in `record`, or `Ok` if there are none.
    fn validate(&self, record: &R) -> Result<(), ValidationFailure>;

    /// Validates an inbound payload and, on success, marks it verified.
    fn verify(&self, input: Tainted<R>) -> Result<Verified<R>, ValidationFailure> {
        let record = input.into_inner();
        self.validate(&record)?;
        Ok(Verified::new_unchecked(record))
    }
}

/// Accepts every payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl<R> Validator<R> for AcceptAll {
    fn validate(&self, _record: &R) -> Result<(), ValidationFailure> {
        Ok(())
    }
}

/// Requires a set of top-level keys in the record body.
///
/// Reports one issue per missing key; a body that is not a JSON object
/// fails with a single issue.
#[derive(Debug, Clone)]
pub struct RequireFields {
    fields: Vec<String>,
}

impl RequireFields {
    /// Requires every key in `fields`.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl<R: Resource> Validator<R> for RequireFields {
    fn validate(&self, record: &R) -> Result<(), ValidationFailure> {
        let Some(body) = record.body().as_object() else {
            return Err(ValidationFailure::single(
                "body must be a JSON object",
                R::TYPE,
            ));
        };

        let issues: Vec<ValidationIssue> = self
            .fields
            .iter()
            .filter(|field| !body.contains_key(field.as_str()))
            .map(|field| {
                ValidationIssue::new(
                    Severity::Error,
                    format!("missing required field '{field}'"),
                    format!("{}.{field}", R::TYPE),
                )
            })
            .collect();

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailure::new(issues))
        }
    }
}

impl<R, F> Validator<R> for F
where
    F: Fn(&R) -> Result<(), ValidationFailure> + Send + Sync,
{
    fn validate(&self, record: &R) -> Result<(), ValidationFailure> {
        self(record)
    }
}
