use std::fmt;

/// Request-scoped logging handle.
///
/// `RequestLog` is obtained from [`BoundContext::log`](crate::BoundContext::log)
/// and borrows from it, so it cannot outlive the request it describes.
/// Every event carries the request id and the bound username as fields.
///
/// Secret values stay redacted when logged through their `Debug` and
/// `Display` implementations.
#[derive(Debug, Clone, Copy)]
pub struct RequestLog<'a> {
    request_id: &'a str,
    username: &'a str,
}

impl<'a> RequestLog<'a> {
    pub(crate) fn new(request_id: &'a str, username: &'a str) -> Self {
        Self {
            request_id,
            username,
        }
    }

    /// Returns the request id stamped on every event.
    pub fn request_id(&self) -> &str {
        self.request_id
    }

    /// Returns the username stamped on every event.
    pub fn username(&self) -> &str {
        self.username
    }

    /// Logs an info-level message.
    ///
    /// ```no_run
    /// # use fhir_guard::{Identity, RequestContext};
    /// let mut ctx = RequestContext::new("req-1");
    /// let bound = ctx.bind(Identity::admin("admin"));
    /// bound.log().info(format_args!("reading Patient/{}", "123"));
    /// ```
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(request_id = %self.request_id, username = %self.username, "{}", args);
    }

    /// Logs a warning-level message.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(request_id = %self.request_id, username = %self.username, "{}", args);
    }

    /// Logs an error-level message.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(request_id = %self.request_id, username = %self.username, "{}", args);
    }

    /// Logs a debug-level message.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(request_id = %self.request_id, username = %self.username, "{}", args);
    }
}
