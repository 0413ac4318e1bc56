/// A payload that passed validation.
///
/// `Verified<T>` has no public constructor. Values only come out of
/// [`Validator::verify`](crate::Validator::verify), so a function that takes
/// `Verified<R>` can rely on the payload having been checked.
///
/// ```compile_fail
/// use fhir_guard::{Patient, Verified};
/// use serde_json::json;
///
/// // No public constructor:
/// let verified = Verified::new(Patient::new(json!({})));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Verified<T> {
    inner: T,
}

impl<T> Verified<T> {
    /// Wraps a value the caller has already validated.
    pub(crate) fn new_unchecked(value: T) -> Self {
        Self { inner: value }
    }

    /// Consumes the wrapper and returns the validated value.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> AsRef<T> for Verified<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_ref_does_not_consume() {
        let verified = Verified::new_unchecked(vec![1, 2, 3]);

        assert_eq!(verified.as_ref(), &vec![1, 2, 3]);
        assert_eq!(verified.into_inner(), vec![1, 2, 3]);
    }
}
