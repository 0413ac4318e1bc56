//! Framework-agnostic view of an inbound resource request.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::policy::Operation;
use crate::resource::Resource;
use crate::tainted::Tainted;

use super::{BasicCredentials, ExtractCredentials};

/// Path prefix stripped by [`RequestAdapter::from_path`].
const BASE_PATH: &str = "fhir";

/// HTTP verbs the resource endpoints answer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(Error::BadRequest(format!("unsupported method {other}"))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Owned, framework-independent copy of one request.
///
/// Framework integrations build one of these from their native request
/// type and hand it to the [`Dispatcher`](super::Dispatcher). Header names
/// are stored lowercased and looked up case-insensitively. The body is kept
/// as raw text and only decoded into a [`Tainted`] record on demand.
///
/// ```
/// use fhir_guard::web::{Method, RequestAdapter};
/// use fhir_guard::Operation;
///
/// let adapter = RequestAdapter::from_path("req-1", Method::Get, "/fhir/Patient/123").unwrap();
/// assert_eq!(adapter.resource_type(), "Patient");
/// assert_eq!(adapter.path_id(), Some("123"));
/// assert_eq!(adapter.operation().unwrap(), Operation::Read);
/// ```
#[derive(Debug, Clone)]
pub struct RequestAdapter {
    request_id: String,
    method: Method,
    resource_type: String,
    path_id: Option<String>,
    headers: HashMap<String, String>,
    body: Option<String>,
}

impl RequestAdapter {
    /// Creates a request for the collection endpoint of `resource_type`.
    pub fn new(request_id: impl Into<String>, method: Method, resource_type: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            method,
            resource_type: resource_type.into(),
            path_id: None,
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Creates a request from a URL path such as `/fhir/Patient/123`.
    ///
    /// The `fhir` prefix is optional. Query strings are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] for paths that are not `Type` or
    /// `Type/id`.
    pub fn from_path(request_id: impl Into<String>, method: Method, path: &str) -> Result<Self> {
        let path = path.split('?').next().unwrap_or_default();
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.first() == Some(&BASE_PATH) {
            segments.remove(0);
        }

        match segments.as_slice() {
            [resource_type] => Ok(Self::new(request_id, method, *resource_type)),
            [resource_type, id] => Ok(Self::new(request_id, method, *resource_type).with_id(*id)),
            _ => Err(Error::BadRequest(format!("unrecognised path {path}"))),
        }
    }

    /// Targets one record.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.path_id = Some(id.into());
        self
    }

    /// Adds a header, replacing any earlier value of the same name.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    /// Adds a header in place.
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Attaches a raw JSON body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns the request id.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the verb.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the resource type segment of the path.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the id segment of the path, if any.
    pub fn path_id(&self) -> Option<&str> {
        self.path_id.as_deref()
    }

    /// Looks up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Maps verb and path shape to an operation.
    ///
    /// | verb   | `Type`  | `Type/id` |
    /// |--------|---------|-----------|
    /// | GET    | Search  | Read      |
    /// | POST   | Create  | -         |
    /// | PUT    | -       | Update    |
    /// | DELETE | -       | Delete    |
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] for the combinations marked `-`.
    pub fn operation(&self) -> Result<Operation> {
        match (self.method, self.path_id.is_some()) {
            (Method::Get, false) => Ok(Operation::Search),
            (Method::Get, true) => Ok(Operation::Read),
            (Method::Post, false) => Ok(Operation::Create),
            (Method::Put, true) => Ok(Operation::Update),
            (Method::Delete, true) => Ok(Operation::Delete),
            (method, _) => Err(Error::BadRequest(format!(
                "{method} is not supported on this path"
            ))),
        }
    }

    /// Decodes the body into an unvalidated record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] if the body is missing, is not JSON,
    /// or is not a document of type `R`.
    pub fn tainted_body<R: Resource>(&self) -> Result<Tainted<R>> {
        let raw = self
            .body
            .as_deref()
            .filter(|body| !body.trim().is_empty())
            .ok_or_else(|| Error::BadRequest("request body is required".to_string()))?;
        let document: serde_json::Value = serde_json::from_str(raw)
            .map_err(|err| Error::BadRequest(format!("request body is not valid JSON: {err}")))?;
        Ok(Tainted::new(R::from_json(document)?))
    }
}

impl ExtractCredentials for RequestAdapter {
    fn extract_credentials(&self) -> Result<BasicCredentials> {
        let header = self.header("authorization").ok_or_else(|| {
            tracing::debug!(request_id = %self.request_id, "no authorization header");
            Error::Authentication
        })?;
        BasicCredentials::from_header(header)
    }
}
