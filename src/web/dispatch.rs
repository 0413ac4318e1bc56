//! Verb dispatch for the Patient and Observation endpoints.

use serde_json::Value;

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::gate::{Access, RequestGate};
use crate::persistence::AccountPersistence;
use crate::policy::Operation;
use crate::resource::{Observation, Patient, Resource};
use crate::service::ResourceService;
use crate::validator::{AcceptAll, Validator};

use super::{BasicCredentials, ExtractCredentials, RequestAdapter, Response};

/// Routes adapted requests to the matching [`ResourceService`].
///
/// Each call to [`handle`](Self::handle) is one request: a fresh
/// [`RequestContext`] is created, the request passes through the
/// [`RequestGate`] (or is refused and audited before reaching it), and every failure is rendered as an `OperationOutcome`
/// with the status from [`Error::status`]. `handle` never panics on bad
/// input and never returns with the context still bound.
pub struct Dispatcher<P, PV = AcceptAll, OV = AcceptAll> {
    gate: RequestGate<P>,
    patients: ResourceService<Patient, PV>,
    observations: ResourceService<Observation, OV>,
}

impl<P, PV, OV> Dispatcher<P, PV, OV>
where
    P: AccountPersistence,
    PV: Validator<Patient>,
    OV: Validator<Observation>,
{
    /// Wires the gate and both services together.
    pub fn new(
        gate: RequestGate<P>,
        patients: ResourceService<Patient, PV>,
        observations: ResourceService<Observation, OV>,
    ) -> Self {
        Self {
            gate,
            patients,
            observations,
        }
    }

    /// Returns the gate requests pass through.
    pub fn gate(&self) -> &RequestGate<P> {
        &self.gate
    }

    /// Returns the Patient service.
    pub fn patients(&self) -> &ResourceService<Patient, PV> {
        &self.patients
    }

    /// Returns the Observation service.
    pub fn observations(&self) -> &ResourceService<Observation, OV> {
        &self.observations
    }

    /// Answers one request.
    pub fn handle(&self, adapter: &RequestAdapter) -> Response {
        let mut ctx = RequestContext::new(adapter.request_id());
        let result = self.route(&mut ctx, adapter);
        debug_assert!(ctx.current().is_none());

        match result {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(
                    request_id = adapter.request_id(),
                    status = err.status(),
                    error = %err,
                    "request failed"
                );
                Response::from_error(&err)
            }
        }
    }

    fn route(&self, ctx: &mut RequestContext, adapter: &RequestAdapter) -> Result<Response> {
        let resource_type = adapter.resource_type();
        let refuse = |username: Option<&str>, err: Error| {
            self.gate
                .refuse(&*ctx, resource_type, adapter.path_id(), username, &err);
            err
        };

        let credentials = adapter.extract_credentials().map_err(|err| refuse(None, err))?;
        let claimed = Some(credentials.username());
        let operation = adapter.operation().map_err(|err| refuse(claimed, err))?;
        if resource_type != Patient::TYPE && resource_type != Observation::TYPE {
            let err = Error::BadRequest(format!("unknown resource type {resource_type}"));
            return Err(refuse(claimed, err));
        }

        if resource_type == Patient::TYPE {
            serve(&self.gate, &self.patients, ctx, &credentials, operation, adapter)
        } else {
            serve(&self.gate, &self.observations, ctx, &credentials, operation, adapter)
        }
    }
}

fn serve<P, R, V>(
    gate: &RequestGate<P>,
    service: &ResourceService<R, V>,
    ctx: &mut RequestContext,
    credentials: &BasicCredentials,
    operation: Operation,
    adapter: &RequestAdapter,
) -> Result<Response>
where
    P: AccountPersistence,
    R: Resource,
    V: Validator<R>,
{
    let mut access = Access::new(operation, R::TYPE);
    if let Some(id) = adapter.path_id() {
        access = access.on(id);
    }
    let path_id = || {
        adapter
            .path_id()
            .ok_or_else(|| Error::BadRequest(format!("{operation} requires an id")))
    };

    gate.run(ctx, credentials, access, |bound| match operation {
        Operation::Create => {
            let outcome = service.create(bound, adapter.tainted_body::<R>()?)?;
            Ok(Response::json(201, outcome.resource.to_json()))
        }
        Operation::Read => {
            let record = service.read(bound, path_id()?)?;
            Ok(Response::json(200, record.to_json()))
        }
        Operation::Update => {
            let outcome = service.update(bound, path_id()?, adapter.tainted_body::<R>()?)?;
            Ok(Response::json(200, outcome.resource.to_json()))
        }
        Operation::Delete => {
            service.delete(bound, path_id()?)?;
            Ok(Response::no_content())
        }
        Operation::Search => {
            let records: Vec<Value> = service.search(bound)?.iter().map(R::to_json).collect();
            Ok(Response::bundle(records))
        }
    })
}
