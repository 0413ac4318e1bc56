//! Credential extraction at the transport boundary.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{Error, Result};
use crate::secret::Secret;

/// A username and password presented by a caller.
///
/// The password stays wrapped in [`Secret`] so it cannot leak through
/// `Debug` output or log fields.
pub struct BasicCredentials {
    username: String,
    password: Secret<String>,
}

impl BasicCredentials {
    /// Wraps an already-decoded username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password.into()),
        }
    }

    /// Parses an `Authorization: Basic <base64(user:password)>` header value.
    ///
    /// The scheme name is matched case-insensitively. The decoded text is
    /// split on the first `:`, so passwords may themselves contain colons.
    ///
    /// # Errors
    ///
    /// Every malformed header yields [`Error::Authentication`], the same
    /// error as a wrong password.
    ///
    /// ```
    /// use fhir_guard::web::BasicCredentials;
    ///
    /// // "admin:admin123"
    /// let creds = BasicCredentials::from_header("Basic YWRtaW46YWRtaW4xMjM=").unwrap();
    /// assert_eq!(creds.username(), "admin");
    /// assert!(creds.password().matches("admin123"));
    /// ```
    pub fn from_header(value: &str) -> Result<Self> {
        let value = value.trim();
        let (scheme, encoded) = value.split_once(' ').ok_or(Error::Authentication)?;
        if !scheme.eq_ignore_ascii_case("basic") {
            tracing::debug!(scheme, "unsupported authorization scheme");
            return Err(Error::Authentication);
        }

        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| Error::Authentication)?;
        let decoded = String::from_utf8(decoded).map_err(|_| Error::Authentication)?;
        let (username, password) = decoded.split_once(':').ok_or(Error::Authentication)?;

        Ok(Self::new(username, password))
    }

    /// Returns the claimed username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the presented password.
    pub fn password(&self) -> &Secret<String> {
        &self.password
    }
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &self.password)
            .finish()
    }
}

/// Pulls caller credentials out of a transport request.
///
/// Framework integrations implement this for their own request type;
/// [`RequestAdapter`](super::RequestAdapter) implements it by reading the
/// `Authorization` header.
pub trait ExtractCredentials {
    /// Returns the presented credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] if none are present or they are
    /// malformed.
    fn extract_credentials(&self) -> Result<BasicCredentials>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    fn header(raw: &str) -> String {
        format!("Basic {}", STANDARD.encode(raw))
    }

    #[test]
    fn splits_on_first_colon_only() {
        let creds = BasicCredentials::from_header(&header("alice:pa:ss")).unwrap();
        assert_eq!(creds.username(), "alice");
        assert!(creds.password().matches("pa:ss"));
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let value = format!("bAsIc {}", STANDARD.encode("u:p"));
        assert!(BasicCredentials::from_header(&value).is_ok());
    }

    #[test]
    fn malformed_headers_are_authentication_errors() {
        let cases = [
            String::new(),
            "Bearer abc".to_string(),
            "Basic".to_string(),
            "Basic !!!not-base64".to_string(),
            header("no-colon-here"),
            format!("Basic {}", STANDARD.encode([0xff, 0xfe, b':', b'x'])),
        ];
        for case in cases {
            let err = BasicCredentials::from_header(&case).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Authentication, "{case:?}");
        }
    }

    #[test]
    fn debug_redacts_password() {
        let creds = BasicCredentials::new("alice", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }

    proptest! {
        #[test]
        fn header_round_trips_any_colon_free_username(
            username in "[^:]{0,24}",
            password in ".{0,24}",
        ) {
            let value = header(&format!("{username}:{password}"));
            let creds = BasicCredentials::from_header(&value).unwrap();
            prop_assert_eq!(creds.username(), username.as_str());
            prop_assert!(creds.password().matches(&password));
        }
    }
}
