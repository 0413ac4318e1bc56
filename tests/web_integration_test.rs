//! Integration tests for the web boundary.
//!
//! These tests drive complete requests through `RequestAdapter` and
//! `Dispatcher`: header extraction, routing, the request gate, the
//! services and response rendering.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use fhir_guard::audit::{AuditEventKind, AuditOutcome, AuditTrail};
use fhir_guard::web::{Dispatcher, Method, RequestAdapter, Response};
use fhir_guard::{
    Account, AccountPersistence, CredentialStore, GuardConfig, MemoryPersistence, RequestGate,
    RequireFields, ResourceService, ResourceStore, Role,
};
use serde_json::Value;

fn basic(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn guard(config: GuardConfig) -> (Dispatcher<Box<dyn AccountPersistence>>, Arc<AuditTrail>) {
    init_tracing();
    let trail = Arc::new(AuditTrail::new());
    let guard = config
        .with_demo_accounts()
        .build_with_audit(trail.clone())
        .unwrap();
    guard
        .gate()
        .credentials()
        .associate_owned_resource("user", "123")
        .unwrap();
    (guard, trail)
}

fn send(
    guard: &Dispatcher<Box<dyn AccountPersistence>>,
    user: (&str, &str),
    method: Method,
    path: &str,
    body: Option<&str>,
) -> Response {
    let mut adapter = RequestAdapter::from_path("req-web", method, path)
        .unwrap()
        .with_header("Authorization", basic(user.0, user.1));
    if let Some(body) = body {
        adapter = adapter.with_body(body);
    }
    guard.handle(&adapter)
}

const ADMIN: (&str, &str) = ("admin", "admin123");
const USER: (&str, &str) = ("user", "user123");

fn issue_code(response: &Response) -> Value {
    response.body.as_ref().unwrap()["issue"][0]["code"].clone()
}

#[test]
fn crud_status_codes_for_admin() {
    let (guard, _) = guard(GuardConfig::default());

    let created = send(&guard, ADMIN, Method::Post, "/fhir/Patient", Some(r#"{"resourceType":"Patient","id":"123","active":true}"#));
    assert_eq!(created.status, 201);
    assert_eq!(created.body.as_ref().unwrap()["id"], "123");

    let read = send(&guard, ADMIN, Method::Get, "/fhir/Patient/123", None);
    assert_eq!(read.status, 200);
    assert_eq!(read.body.unwrap()["active"], true);

    let updated = send(&guard, ADMIN, Method::Put, "/fhir/Patient/123", Some(r#"{"resourceType":"Patient","active":false}"#));
    assert_eq!(updated.status, 200);
    assert_eq!(updated.body.unwrap()["id"], "123");

    let deleted = send(&guard, ADMIN, Method::Delete, "/fhir/Patient/123", None);
    assert_eq!(deleted.status, 204);
    assert!(deleted.body.is_none());

    let gone = send(&guard, ADMIN, Method::Get, "/fhir/Patient/123", None);
    assert_eq!(gone.status, 404);
    assert_eq!(issue_code(&gone), "not-found");
}

#[test]
fn generated_ids_are_returned() {
    let (guard, _) = guard(GuardConfig::from_json_str(r#"{"id_strategy": "sequential"}"#).unwrap());

    let created = send(&guard, ADMIN, Method::Post, "/fhir/Patient", Some(r#"{"resourceType":"Patient"}"#));

    assert_eq!(created.status, 201);
    assert_eq!(created.body.unwrap()["id"], "Patient-1");
}

#[test]
fn authentication_failures_are_401() {
    let (guard, _) = guard(GuardConfig::default());

    let wrong = send(&guard, ("admin", "nope"), Method::Get, "/fhir/Patient", None);
    assert_eq!(wrong.status, 401);
    assert_eq!(issue_code(&wrong), "login");

    let missing = guard.handle(&RequestAdapter::from_path("r", Method::Get, "/fhir/Patient").unwrap());
    assert_eq!(missing.status, 401);

    let bearer = RequestAdapter::from_path("r", Method::Get, "/fhir/Patient")
        .unwrap()
        .with_header("authorization", "Bearer abc");
    assert_eq!(guard.handle(&bearer).status, 401);

    let lowercase_scheme = RequestAdapter::from_path("r", Method::Get, "/fhir/Patient")
        .unwrap()
        .with_header("AUTHORIZATION", basic("admin", "admin123").replacen("Basic", "basic", 1));
    assert_eq!(guard.handle(&lowercase_scheme).status, 200);
}

#[test]
fn user_is_scoped_to_its_patient() {
    let (guard, _) = guard(GuardConfig::default());
    for id in ["123", "999"] {
        let body = format!(r#"{{"resourceType":"Patient","id":"{id}"}}"#);
        assert_eq!(send(&guard, ADMIN, Method::Post, "/fhir/Patient", Some(&body)).status, 201);
    }
    let observation = r#"{"resourceType":"Observation","status":"final","subject":{"reference":"Patient/123"}}"#;
    assert_eq!(send(&guard, ADMIN, Method::Post, "/fhir/Observation", Some(observation)).status, 201);

    assert_eq!(send(&guard, USER, Method::Get, "/fhir/Patient/123", None).status, 200);

    let denied = send(&guard, USER, Method::Get, "/fhir/Patient/999", None);
    assert_eq!(denied.status, 403);
    assert_eq!(issue_code(&denied), "forbidden");

    let patients = send(&guard, USER, Method::Get, "/fhir/Patient", None).body.unwrap();
    assert_eq!(patients["resourceType"], "Bundle");
    assert_eq!(patients["total"], 1);
    assert_eq!(patients["entry"][0]["resource"]["id"], "123");

    let observations = send(&guard, USER, Method::Get, "/fhir/Observation", None).body.unwrap();
    assert_eq!(observations["total"], 1);
    assert_eq!(observations["entry"][0]["resource"]["subject"]["reference"], "Patient/123");

    let all = send(&guard, ADMIN, Method::Get, "/fhir/Patient", None).body.unwrap();
    assert_eq!(all["total"], 2);
}

#[test]
fn users_may_not_write() {
    let (guard, _) = guard(GuardConfig::default());

    for (method, path) in [
        (Method::Post, "/fhir/Patient"),
        (Method::Put, "/fhir/Patient/123"),
        (Method::Delete, "/fhir/Patient/123"),
    ] {
        let response = send(&guard, USER, method, path, Some(r#"{"resourceType":"Patient"}"#));
        assert_eq!(response.status, 403, "{method} {path}");
    }
    assert!(guard.patients().store().is_empty());
}

#[test]
fn role_is_checked_before_the_body() {
    let (guard, _) = guard(GuardConfig::default());

    let response = send(&guard, USER, Method::Post, "/fhir/Patient", Some("not json"));

    assert_eq!(response.status, 403);
}

#[test]
fn malformed_requests_are_400() {
    let (guard, _) = guard(GuardConfig::default());

    let bad_json = send(&guard, ADMIN, Method::Post, "/fhir/Patient", Some("{"));
    assert_eq!(bad_json.status, 400);
    assert_eq!(issue_code(&bad_json), "structure");

    let wrong_type = send(&guard, ADMIN, Method::Post, "/fhir/Patient", Some(r#"{"resourceType":"Observation"}"#));
    assert_eq!(wrong_type.status, 400);

    assert_eq!(send(&guard, ADMIN, Method::Post, "/fhir/Patient", None).status, 400);
    assert_eq!(send(&guard, ADMIN, Method::Get, "/fhir/Encounter", None).status, 400);
    assert_eq!(send(&guard, ADMIN, Method::Put, "/fhir/Patient", Some("{}")).status, 400);
}

#[test]
fn duplicate_create_is_409() {
    let (guard, _) = guard(GuardConfig::default());
    let body = r#"{"resourceType":"Patient","id":"123"}"#;

    assert_eq!(send(&guard, ADMIN, Method::Post, "/fhir/Patient", Some(body)).status, 201);
    let duplicate = send(&guard, ADMIN, Method::Post, "/fhir/Patient", Some(body));

    assert_eq!(duplicate.status, 409);
    assert_eq!(issue_code(&duplicate), "duplicate");
}

#[test]
fn concealed_reads_are_404() {
    let (guard, _) = guard(GuardConfig::from_json_str(r#"{"conceal_denied_reads": true}"#).unwrap());
    assert_eq!(
        send(&guard, ADMIN, Method::Post, "/fhir/Patient", Some(r#"{"resourceType":"Patient","id":"999"}"#)).status,
        201
    );

    let hidden = send(&guard, USER, Method::Get, "/fhir/Patient/999", None);
    let missing = send(&guard, USER, Method::Get, "/fhir/Patient/555", None);

    assert_eq!(hidden.status, 404);
    assert_eq!(hidden.status, missing.status);
}

#[test]
fn validation_failures_are_422() {
    let credentials = CredentialStore::open(MemoryPersistence::new(), &[]).unwrap();
    credentials
        .provision(Account::new("admin", "admin123", Role::Admin))
        .unwrap();
    let guard = Dispatcher::new(
        RequestGate::new(Arc::new(credentials)),
        ResourceService::new(Arc::new(ResourceStore::new())),
        ResourceService::with_validator(
            Arc::new(ResourceStore::new()),
            RequireFields::new(["status", "code"]),
        ),
    );

    let adapter = RequestAdapter::from_path("req-422", Method::Post, "/fhir/Observation")
        .unwrap()
        .with_header("Authorization", basic("admin", "admin123"))
        .with_body(r#"{"resourceType":"Observation","status":"final"}"#);
    let response = guard.handle(&adapter);

    assert_eq!(response.status, 422);
    let outcome = response.body.unwrap();
    assert_eq!(outcome["issue"][0]["code"], "invalid");
    assert_eq!(outcome["issue"][0]["expression"][0], "Observation.code");
    assert!(guard.observations().store().is_empty());
}

#[test]
fn every_request_is_audited_once() {
    let (guard, trail) = guard(GuardConfig::default());

    send(&guard, ADMIN, Method::Post, "/fhir/Patient", Some(r#"{"resourceType":"Patient","id":"123"}"#));
    send(&guard, USER, Method::Get, "/fhir/Patient/123", None);
    send(&guard, USER, Method::Delete, "/fhir/Patient/123", None);
    send(&guard, ("user", "wrong"), Method::Get, "/fhir/Patient", None);
    let no_header = RequestAdapter::from_path("req-anon", Method::Get, "/fhir/Patient").unwrap();
    assert_eq!(guard.handle(&no_header).status, 401);
    let bearer = RequestAdapter::from_path("req-bearer", Method::Get, "/fhir/Patient/123")
        .unwrap()
        .with_header("Authorization", "Bearer x");
    assert_eq!(guard.handle(&bearer).status, 401);
    assert_eq!(send(&guard, ADMIN, Method::Get, "/fhir/Encounter", None).status, 400);

    let events = trail.events();
    assert_eq!(events.len(), 7);
    assert_eq!(events[0].outcome(), AuditOutcome::Success);
    assert_eq!(events[0].status(), Some(201));
    assert_eq!(events[1].outcome(), AuditOutcome::Success);
    assert_eq!(events[1].resource_id(), Some("123"));
    assert_eq!(events[2].outcome(), AuditOutcome::Denied);
    assert_eq!(events[3].outcome(), AuditOutcome::Denied);
    assert_eq!(events[3].username(), Some("user"));

    let anonymous = &trail.for_request("req-anon")[0];
    assert_eq!(anonymous.kind(), AuditEventKind::Authentication);
    assert_eq!(anonymous.outcome(), AuditOutcome::Denied);
    assert_eq!(anonymous.status(), Some(401));
    assert_eq!(anonymous.username(), None);

    let bearer = &trail.for_request("req-bearer")[0];
    assert_eq!(bearer.kind(), AuditEventKind::Authentication);
    assert_eq!(bearer.resource_id(), Some("123"));

    assert_eq!(events[6].outcome(), AuditOutcome::Error);
    assert_eq!(events[6].status(), Some(400));
    assert_eq!(events[6].resource_type(), Some("Encounter"));
    assert_eq!(events[6].username(), Some("admin"));
}
