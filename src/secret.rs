use std::fmt;

/// A wrapper that keeps credential material out of logs and error output.
///
/// Account passwords live inside `Secret<String>` from the moment they are
/// loaded or registered. The value is never printed: `Debug` and `Display`
/// both render `[REDACTED]`, and reading the raw value requires the
/// deliberately loud [`expose_secret`](Self::expose_secret).
///
/// Credential checks should use [`matches`](Self::matches), which compares
/// without exposing the value to the caller.
///
/// # Examples
///
/// ```
/// use fhir_guard::Secret;
///
/// let password = Secret::new("admin123".to_string());
///
/// assert_eq!(format!("{:?}", password), "[REDACTED]");
/// assert!(password.matches("admin123"));
/// assert!(!password.matches("admin124"));
/// ```
// Do NOT derive Clone, Copy or Default: duplicating credentials must stay explicit.
pub struct Secret<T> {
    // Must remain private, otherwise redaction is bypassed.
    inner: T,
}

impl<T> Secret<T> {
    /// Wraps a sensitive value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Explicitly exposes the secret value.
    ///
    /// Only persistence code should need this. Never log the result.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }
}

impl<T: AsRef<[u8]>> Secret<T> {
    /// Compares the secret with `candidate` byte-for-byte.
    ///
    /// The comparison touches every byte of equal-length inputs instead of
    /// returning at the first mismatch.
    pub fn matches(&self, candidate: impl AsRef<[u8]>) -> bool {
        let stored = self.inner.as_ref();
        let candidate = candidate.as_ref();
        if stored.len() != candidate.len() {
            return false;
        }
        stored
            .iter()
            .zip(candidate)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl<T> fmt::Debug for Secret<T> {
    // MUST unconditionally print "[REDACTED]".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Secret<T> {
    // MUST unconditionally print "[REDACTED]".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}
