use std::sync::Arc;

use crate::audit::{AuditEvent, AuditOutcome, AuditSink, TracingAudit};
use crate::context::{BoundContext, RequestContext};
use crate::credentials::CredentialStore;
use crate::error::{Error, ErrorKind, Result};
use crate::persistence::AccountPersistence;
use crate::policy::{AuthorizationPolicy, Operation};
use crate::web::BasicCredentials;

/// What a request asks to do, as far as the gate needs to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access<'a> {
    /// Requested operation
    pub operation: Operation,
    /// Targeted resource type
    pub resource_type: &'a str,
    /// Targeted record, for single-record operations
    pub resource_id: Option<&'a str>,
}

impl<'a> Access<'a> {
    /// Describes `operation` on the whole of `resource_type`.
    pub fn new(operation: Operation, resource_type: &'a str) -> Self {
        Self {
            operation,
            resource_type,
            resource_id: None,
        }
    }

    /// Narrows the access to one record.
    pub fn on(mut self, id: &'a str) -> Self {
        self.resource_id = Some(id);
        self
    }
}

/// The single entry point a request passes through.
///
/// `RequestGate::run` performs, in order:
///
/// 1. credential verification against the [`CredentialStore`]
/// 2. binding the resulting identity into the caller's [`RequestContext`]
/// 3. the role check for the requested [`Operation`]
/// 4. the handler closure, which receives the bound context
/// 5. one audit event describing the outcome
///
/// The binding is released when `run` returns, on success, on error and
/// on panic alike.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use fhir_guard::{
///     Access, CredentialStore, MemoryPersistence, Operation, RequestContext, RequestGate,
///     Role, Account,
/// };
/// use fhir_guard::web::BasicCredentials;
///
/// let store = CredentialStore::open(MemoryPersistence::new(), &[]).unwrap();
/// store.provision(Account::new("admin", "admin123", Role::Admin)).unwrap();
/// let gate = RequestGate::new(Arc::new(store));
///
/// let mut ctx = RequestContext::new("req-1");
/// let creds = BasicCredentials::new("admin", "admin123");
/// let who = gate
///     .run(&mut ctx, &creds, Access::new(Operation::Search, "Patient"), |bound| {
///         Ok(bound.identity().username().to_string())
///     })
///     .unwrap();
///
/// assert_eq!(who, "admin");
/// assert!(ctx.current().is_none());
/// ```
pub struct RequestGate<P> {
    credentials: Arc<CredentialStore<P>>,
    policy: AuthorizationPolicy,
    audit: Arc<dyn AuditSink>,
}

impl<P: AccountPersistence> RequestGate<P> {
    /// Creates a gate that audits through `tracing`.
    pub fn new(credentials: Arc<CredentialStore<P>>) -> Self {
        Self {
            credentials,
            policy: AuthorizationPolicy::new(),
            audit: Arc::new(TracingAudit::new()),
        }
    }

    /// Replaces the audit sink.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the credential store requests are authenticated against.
    pub fn credentials(&self) -> &Arc<CredentialStore<P>> {
        &self.credentials
    }

    /// Audits a request turned away before [`run`](Self::run) could start,
    /// for example one without usable credentials or with an unknown route.
    pub fn refuse(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        resource_id: Option<&str>,
        claimed_username: Option<&str>,
        error: &Error,
    ) {
        let mut event = AuditEvent::new(ctx.request_id(), AuditOutcome::Denied)
            .with_resource(resource_type, resource_id)
            .with_error(error);
        if let Some(username) = claimed_username {
            event = event.with_claimed_username(username);
        }
        self.audit.emit(&event);
    }

    /// Runs `handler` for an authenticated, authorized request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`](crate::Error::Authentication) for bad
    /// credentials, [`Error::Forbidden`](crate::Error::Forbidden) when the role
    /// may not perform `access.operation`, or whatever `handler` returns.
    pub fn run<T, F>(
        &self,
        ctx: &mut RequestContext,
        credentials: &BasicCredentials,
        access: Access<'_>,
        handler: F,
    ) -> Result<T>
    where
        F: FnOnce(&BoundContext<'_>) -> Result<T>,
    {
        let event = AuditEvent::new(ctx.request_id(), AuditOutcome::Success)
            .with_operation(access.operation)
            .with_resource(access.resource_type, access.resource_id);

        let identity = match self
            .credentials
            .authenticate(credentials.username(), credentials.password().expose_secret())
        {
            Ok(identity) => identity,
            Err(err) => {
                self.audit.emit(
                    &event
                        .with_claimed_username(credentials.username())
                        .with_error(&err),
                );
                return Err(err);
            }
        };

        let bound = ctx.bind(identity);
        let result = self
            .policy
            .check_operation(bound.identity(), access.operation)
            .and_then(|()| handler(&bound));

        let event = event.with_identity(bound.identity());
        let event = match &result {
            Ok(_) => event.with_status(success_status(access.operation)),
            Err(err) => {
                let (log, op, rt) = (bound.log(), access.operation, access.resource_type);
                if err.kind() == ErrorKind::Internal {
                    log.error(format_args!("{op} {rt} failed: {err}"));
                } else {
                    log.warn(format_args!("{op} {rt} failed: {err}"));
                }
                event.with_error(err)
            }
        };
        self.audit.emit(&event);
        bound.release();

        result
    }
}

fn success_status(operation: Operation) -> u16 {
    match operation {
        Operation::Create => 201,
        Operation::Delete => 204,
        Operation::Read | Operation::Update | Operation::Search => 200,
    }
}
