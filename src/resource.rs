//! The two clinical resource types and the ownership fields they expose.
//!
//! Only the fields the access-control core needs are modelled: the id and,
//! for dependent records, the reference to the owning patient. Everything
//! else travels in an opaque JSON `body` that the external validator owns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Whether a resource type is itself a unit of ownership or points at one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// The record is owned directly: its own id is the ownership key.
    Owner,
    /// The record belongs to the Owner record it references.
    Dependent,
}

/// A record type the store and the service can manage.
pub trait Resource: Clone + Send + Sync + 'static {
    /// Type name used in ids (`"Patient/123"`), logs and errors.
    const TYPE: &'static str;

    /// Ownership shape of this type.
    const KIND: ResourceKind;

    /// The id carried inside the payload, if any.
    fn id(&self) -> Option<&str>;

    /// Overwrites the payload id.
    fn set_id(&mut self, id: String);

    /// The id of the Owner record this record belongs to.
    ///
    /// For Owner records this is the record's own id.
    fn owner_id(&self) -> Option<&str>;

    /// The opaque remainder of the payload.
    fn body(&self) -> &Value;

    /// Builds a record from a resource document such as
    /// `{"resourceType": "Patient", "id": "123", ...}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] if the document is not an object, names
    /// another `resourceType`, or carries a non-string id.
    fn from_json(document: Value) -> Result<Self>;

    /// Renders the record back into a resource document.
    fn to_json(&self) -> Value;
}

/// Strips any `Type/` prefix from an id: `"Patient/123"` becomes `"123"`.
///
/// Everything up to and including the last `/` is dropped, so versioned or
/// absolute references reduce to their final segment as well.
pub fn normalize_id(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.rfind('/') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}

fn document_fields(document: Value, resource_type: &str) -> Result<(Option<String>, Map<String, Value>)> {
    let Value::Object(mut fields) = document else {
        return Err(Error::BadRequest(format!("{resource_type} payload must be a JSON object")));
    };
    match fields.remove("resourceType") {
        None => {}
        Some(Value::String(ty)) if ty == resource_type => {}
        Some(other) => {
            return Err(Error::BadRequest(format!(
                "expected resourceType {resource_type}, got {other}"
            )))
        }
    }
    let id = match fields.remove("id") {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) => Some(id),
        Some(_) => return Err(Error::BadRequest(format!("{resource_type}.id must be a string"))),
    };
    Ok((id, fields))
}

fn document(resource_type: &str, id: Option<&str>, body: &Value) -> Map<String, Value> {
    let mut fields = body.as_object().cloned().unwrap_or_default();
    fields.insert("resourceType".to_string(), Value::from(resource_type));
    if let Some(id) = id {
        fields.insert("id".to_string(), Value::from(id));
    }
    fields
}

/// The Owner resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Logical id, absent until assigned on create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Remaining content, validated externally
    #[serde(default)]
    pub body: Value,
}

impl Patient {
    /// Creates a patient without an id.
    pub fn new(body: Value) -> Self {
        Self { id: None, body }
    }

    /// Creates a patient with a caller-chosen id.
    pub fn with_id(id: impl Into<String>, body: Value) -> Self {
        Self {
            id: Some(id.into()),
            body,
        }
    }
}

impl Resource for Patient {
    const TYPE: &'static str = "Patient";
    const KIND: ResourceKind = ResourceKind::Owner;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn owner_id(&self) -> Option<&str> {
        self.id()
    }

    fn body(&self) -> &Value {
        &self.body
    }

    fn from_json(document: Value) -> Result<Self> {
        let (id, fields) = document_fields(document, Self::TYPE)?;
        Ok(Self {
            id,
            body: Value::Object(fields),
        })
    }

    fn to_json(&self) -> Value {
        Value::Object(document(Self::TYPE, self.id(), &self.body))
    }
}

/// The Dependent resource type. Belongs to the patient named by `subject`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Logical id, absent until assigned on create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Reference to the owning patient, `"Patient/123"` or `"123"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Remaining content, validated externally
    #[serde(default)]
    pub body: Value,
}

impl Observation {
    /// Creates an observation about `subject` without an id.
    pub fn about(subject: impl Into<String>, body: Value) -> Self {
        Self {
            id: None,
            subject: Some(subject.into()),
            body,
        }
    }

    /// Sets a caller-chosen id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl Resource for Observation {
    const TYPE: &'static str = "Observation";
    const KIND: ResourceKind = ResourceKind::Dependent;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn owner_id(&self) -> Option<&str> {
        self.subject
            .as_deref()
            .map(normalize_id)
            .filter(|id| !id.is_empty())
    }

    fn body(&self) -> &Value {
        &self.body
    }

    /// The subject may be a bare reference string or a
    /// `{"reference": "Patient/123"}` object.
    fn from_json(document: Value) -> Result<Self> {
        let (id, mut fields) = document_fields(document, Self::TYPE)?;
        let subject = match fields.remove("subject") {
            None | Some(Value::Null) => None,
            Some(Value::String(reference)) => Some(reference),
            Some(Value::Object(reference)) => match reference.get("reference") {
                Some(Value::String(reference)) => Some(reference.clone()),
                _ => None,
            },
            Some(_) => {
                return Err(Error::BadRequest(
                    "Observation.subject must be a reference".to_string(),
                ))
            }
        };
        Ok(Self {
            id,
            subject,
            body: Value::Object(fields),
        })
    }

    fn to_json(&self) -> Value {
        let mut fields = document(Self::TYPE, self.id(), &self.body);
        if let Some(subject) = &self.subject {
            fields.insert(
                "subject".to_string(),
                serde_json::json!({ "reference": subject }),
            );
        }
        Value::Object(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_strips_type_prefix() {
        assert_eq!(normalize_id("Patient/123"), "123");
        assert_eq!(normalize_id("123"), "123");
        assert_eq!(normalize_id(" Observation/abc "), "abc");
        assert_eq!(normalize_id("http://host/fhir/Patient/9"), "9");
        assert_eq!(normalize_id("Patient/"), "");
    }

    #[test]
    fn patient_owns_itself() {
        let patient = Patient::with_id("123", json!({"name": "Ana"}));
        assert_eq!(patient.owner_id(), Some("123"));
        assert_eq!(Patient::KIND, ResourceKind::Owner);
    }

    #[test]
    fn observation_owner_accepts_both_reference_forms() {
        let full = Observation::about("Patient/123", json!({}));
        let bare = Observation::about("123", json!({}));

        assert_eq!(full.owner_id(), Some("123"));
        assert_eq!(bare.owner_id(), Some("123"));
    }

    #[test]
    fn observation_without_subject_has_no_owner() {
        let orphan = Observation {
            id: Some("o1".into()),
            subject: None,
            body: json!({}),
        };
        assert_eq!(orphan.owner_id(), None);

        let empty = Observation::about("Patient/", json!({}));
        assert_eq!(empty.owner_id(), None);
    }

    #[test]
    fn patient_documents_split_out_the_id() {
        let patient = Patient::from_json(json!({
            "resourceType": "Patient",
            "id": "123",
            "name": [{"family": "Ruiz"}]
        }))
        .unwrap();

        assert_eq!(patient.id.as_deref(), Some("123"));
        assert_eq!(patient.body, json!({"name": [{"family": "Ruiz"}]}));
        assert_eq!(patient.to_json()["resourceType"], "Patient");
        assert_eq!(patient.to_json()["id"], "123");
    }

    #[test]
    fn observation_documents_accept_reference_objects() {
        let obs = Observation::from_json(json!({
            "resourceType": "Observation",
            "status": "final",
            "subject": {"reference": "Patient/123"}
        }))
        .unwrap();

        assert!(obs.id.is_none());
        assert_eq!(obs.owner_id(), Some("123"));
        assert_eq!(obs.to_json()["subject"]["reference"], "Patient/123");
        assert_eq!(obs.to_json()["status"], "final");
    }

    #[test]
    fn malformed_documents_are_bad_requests() {
        use crate::error::ErrorKind;

        let wrong_type = Patient::from_json(json!({"resourceType": "Observation"}));
        let not_object = Observation::from_json(json!([1]));
        let numeric_id = Patient::from_json(json!({"id": 5}));

        for err in [wrong_type.unwrap_err(), not_object.unwrap_err(), numeric_id.unwrap_err()] {
            assert_eq!(err.kind(), ErrorKind::BadRequest);
        }
    }

    #[test]
    fn payloads_deserialize_with_missing_fields() {
        let patient: Patient = serde_json::from_value(json!({"body": {"active": true}})).unwrap();
        assert!(patient.id.is_none());

        let obs: Observation =
            serde_json::from_value(json!({"id": "o1", "subject": "Patient/1"})).unwrap();
        assert_eq!(obs.owner_id(), Some("1"));
        assert_eq!(obs.body, Value::Null);
    }
}
