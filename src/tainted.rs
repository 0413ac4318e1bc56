use std::fmt;

/// A payload that arrived from outside and has not been validated yet.
///
/// Request bodies are wrapped in `Tainted<T>` as soon as they are decoded.
/// The value cannot be read back out by code outside this crate; the only
/// way forward is [`Validator::verify`](crate::Validator::verify), which
/// yields a [`Verified<T>`](crate::Verified) that the service accepts.
///
/// # Examples
///
/// ```
/// use fhir_guard::{Patient, Tainted};
/// use serde_json::json;
///
/// let inbound = Tainted::new(Patient::new(json!({"name": "Ana"})));
/// println!("{:?}", inbound); // Tainted { inner: Patient { .. } }
///
/// // There is no Deref and no accessor: this does not compile.
/// // let id = inbound.id;
/// ```
#[derive(Clone)]
pub struct Tainted<T> {
    // Must stay private: a public field would let unvalidated payloads
    // reach the store.
    inner: T,
}

impl<T> Tainted<T> {
    /// Marks `value` as unvalidated input.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Unwraps the value for validation.
    ///
    /// Only validator plumbing in this crate calls this, immediately before
    /// deciding whether to wrap the value in `Verified`.
    pub(crate) fn into_inner(self) -> T {
        self.inner
    }
}

// No Deref, AsRef, Borrow or From/Into impls: each one would be a way
// around validation.

impl<T: fmt::Debug> fmt::Debug for Tainted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tainted")
            .field("inner", &self.inner)
            .finish()
    }
}
