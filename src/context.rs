use uuid::Uuid;

use crate::identity::Identity;
use crate::logging::RequestLog;

/// Per-request binding of the authenticated identity.
///
/// One `RequestContext` exists per logical request and is passed explicitly
/// to whatever handles that request. There is no global or thread-local
/// slot: two requests running on the same worker thread, or at the same
/// time on different ones, each hold their own context value.
///
/// # Lifecycle
///
/// ```text
/// RequestContext::new --bind--> BoundContext --drop / release--> RequestContext (unbound)
/// ```
///
/// [`bind`](Self::bind) returns a [`BoundContext`] guard. The identity is
/// readable through the guard for as long as it lives and is cleared when
/// the guard is dropped, on every exit path including `?` propagation and
/// panics. While the guard is alive the context is mutably borrowed, so
/// nothing can observe it half-released or bind it twice.
///
/// # Examples
///
/// ```
/// use fhir_guard::{Identity, RequestContext};
///
/// let mut ctx = RequestContext::new("req-1");
/// assert!(ctx.current().is_none());
///
/// {
///     let bound = ctx.bind(Identity::admin("admin"));
///     assert_eq!(bound.identity().username(), "admin");
/// }
///
/// assert!(ctx.current().is_none());
/// ```
#[derive(Debug)]
pub struct RequestContext {
    request_id: String,
    identity: Option<Identity>,
}

impl RequestContext {
    /// Creates an unbound context for the request `request_id`.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            identity: None,
        }
    }

    /// Creates an unbound context with a random request id.
    pub fn generate() -> Self {
        Self::new(format!("req-{}", Uuid::new_v4().simple()))
    }

    /// Returns the request id used to correlate logs and audit events.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the bound identity.
    ///
    /// Outside a [`BoundContext`] this is always `None`.
    pub fn current(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Binds `identity` for the lifetime of the returned guard.
    pub fn bind(&mut self, identity: Identity) -> BoundContext<'_> {
        tracing::trace!(
            request_id = %self.request_id,
            username = identity.username(),
            "request context bound"
        );
        self.identity = Some(identity.clone());
        BoundContext {
            ctx: self,
            identity,
        }
    }
}

/// Guard proving an identity is bound to a request.
///
/// Dropping the guard releases the binding. It can be shared by reference
/// with sub-steps of the same request, including scoped threads.
#[derive(Debug)]
pub struct BoundContext<'a> {
    ctx: &'a mut RequestContext,
    identity: Identity,
}

impl BoundContext<'_> {
    /// Returns the bound identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Same as [`identity`](Self::identity), in the optional shape of
    /// [`RequestContext::current`].
    pub fn current(&self) -> Option<&Identity> {
        Some(&self.identity)
    }

    /// Returns the request id.
    pub fn request_id(&self) -> &str {
        &self.ctx.request_id
    }

    /// Returns a logger that stamps this request's id and username.
    pub fn log(&self) -> RequestLog<'_> {
        RequestLog::new(&self.ctx.request_id, self.identity.username())
    }

    /// Releases the binding now instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for BoundContext<'_> {
    fn drop(&mut self) {
        self.ctx.identity = None;
        tracing::trace!(request_id = %self.ctx.request_id, "request context released");
    }
}
