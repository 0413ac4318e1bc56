//! Per-type CRUD and search, with authorization applied in a fixed order.
//!
//! Every write goes operation check, then validation, then the store. Reads
//! locate the record first and apply the ownership check to what they
//! found. No check ever runs after a mutation, so a rejected request never
//! leaves a partial write behind.

use std::sync::Arc;

use crate::context::BoundContext;
use crate::error::{Error, Result};
use crate::policy::{AuthorizationPolicy, Operation};
use crate::resource::{normalize_id, Resource};
use crate::store::{IdGenerator, ResourceStore, UuidIds};
use crate::tainted::Tainted;
use crate::validator::{AcceptAll, Validator};

/// Result of a create or update.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<R> {
    /// Id the record is stored under
    pub id: String,
    /// The record as stored
    pub resource: R,
    /// True for creates, false for updates
    pub created: bool,
}

/// Authorized access to the records of one resource type.
///
/// Every method takes the [`BoundContext`] of the calling request, so the
/// service can only be reached once an identity has been authenticated and
/// bound.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use fhir_guard::{Identity, Patient, RequestContext, ResourceService, ResourceStore, Tainted};
/// use serde_json::json;
///
/// let patients = ResourceService::new(Arc::new(ResourceStore::<Patient>::new()));
///
/// let mut ctx = RequestContext::new("req-1");
/// let bound = ctx.bind(Identity::admin("admin"));
/// let outcome = patients
///     .create(&bound, Tainted::new(Patient::with_id("123", json!({"name": "Ana"}))))
///     .unwrap();
///
/// assert_eq!(outcome.id, "123");
/// assert!(outcome.created);
/// ```
pub struct ResourceService<R, V = AcceptAll> {
    store: Arc<ResourceStore<R>>,
    validator: V,
    ids: Arc<dyn IdGenerator>,
    policy: AuthorizationPolicy,
    conceal_denied_reads: bool,
}

impl<R: Resource> ResourceService<R, AcceptAll> {
    /// Creates a service over `store` that accepts every payload.
    pub fn new(store: Arc<ResourceStore<R>>) -> Self {
        Self::with_validator(store, AcceptAll)
    }
}

impl<R: Resource, V: Validator<R>> ResourceService<R, V> {
    /// Creates a service over `store` that runs `validator` on every write.
    pub fn with_validator(store: Arc<ResourceStore<R>>, validator: V) -> Self {
        Self {
            store,
            validator,
            ids: Arc::new(UuidIds),
            policy: AuthorizationPolicy::new(),
            conceal_denied_reads: false,
        }
    }

    /// Replaces the id generator used by id-less creates.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Makes denied reads indistinguishable from missing records.
    pub fn conceal_denied_reads(mut self, conceal: bool) -> Self {
        self.conceal_denied_reads = conceal;
        self
    }

    /// Returns the backing store.
    pub fn store(&self) -> &Arc<ResourceStore<R>> {
        &self.store
    }

    /// Stores a new record.
    ///
    /// # Errors
    ///
    /// - [`Error::Forbidden`] for non-admin callers
    /// - [`Error::Validation`] if the payload is rejected
    /// - [`Error::Conflict`] if the payload names an occupied id
    pub fn create(&self, ctx: &BoundContext<'_>, payload: Tainted<R>) -> Result<Outcome<R>> {
        self.policy.check_operation(ctx.identity(), Operation::Create)?;
        let record = self.validator.verify(payload)?.into_inner();

        let stored = self.store.create(record, self.ids.as_ref())?;
        let id = stored.id().unwrap_or_default().to_string();
        ctx.log().info(format_args!("created {}/{id}", R::TYPE));

        Ok(Outcome {
            id,
            resource: stored,
            created: true,
        })
    }

    /// Fetches one record.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if nothing is stored under `id`
    /// - [`Error::Forbidden`] if the caller does not own the record, or
    ///   `NotFound` when denied reads are concealed
    pub fn read(&self, ctx: &BoundContext<'_>, id: &str) -> Result<R> {
        let identity = ctx.identity();
        self.policy.check_operation(identity, Operation::Read)?;

        let id = normalize_id(id);
        let record = self
            .store
            .get(id)
            .ok_or_else(|| Error::not_found(R::TYPE, id))?;

        if let Err(denied) = self.policy.check_ownership(identity, &record) {
            ctx.log().warn(format_args!("read of {}/{id} denied", R::TYPE));
            return Err(if self.conceal_denied_reads {
                Error::not_found(R::TYPE, id)
            } else {
                denied
            });
        }
        Ok(record)
    }

    /// Replaces the content of an existing record.
    ///
    /// The record keeps the id from the path. An id inside the payload only
    /// matters when it names a different record that already exists.
    ///
    /// # Errors
    ///
    /// - [`Error::Forbidden`] for non-admin callers
    /// - [`Error::Validation`] if the payload is rejected
    /// - [`Error::NotFound`] if nothing is stored under `id`; nothing is
    ///   created in that case
    /// - [`Error::Conflict`] if the payload id names another existing record
    pub fn update(&self, ctx: &BoundContext<'_>, id: &str, payload: Tainted<R>) -> Result<Outcome<R>> {
        self.policy.check_operation(ctx.identity(), Operation::Update)?;
        let mut record = self.validator.verify(payload)?.into_inner();

        let id = normalize_id(id);
        if let Some(payload_id) = record.id().map(normalize_id) {
            if !payload_id.is_empty() && payload_id != id && self.store.contains(payload_id) {
                return Err(Error::conflict(R::TYPE, payload_id));
            }
        }

        record.set_id(id.to_string());
        self.store.replace(id, record.clone())?;
        ctx.log().info(format_args!("updated {}/{id}", R::TYPE));

        Ok(Outcome {
            id: id.to_string(),
            resource: record,
            created: false,
        })
    }

    /// Removes a record.
    ///
    /// # Errors
    ///
    /// - [`Error::Forbidden`] for non-admin callers
    /// - [`Error::NotFound`] if nothing is stored under `id`
    pub fn delete(&self, ctx: &BoundContext<'_>, id: &str) -> Result<()> {
        self.policy.check_operation(ctx.identity(), Operation::Delete)?;

        let id = normalize_id(id);
        if !self.store.delete(id) {
            return Err(Error::not_found(R::TYPE, id));
        }
        ctx.log().info(format_args!("deleted {}/{id}", R::TYPE));
        Ok(())
    }

    /// Lists every record the caller may see.
    ///
    /// A User without an owned resource gets an empty list, not an error.
    pub fn search(&self, ctx: &BoundContext<'_>) -> Result<Vec<R>> {
        let identity = ctx.identity();
        self.policy.check_operation(identity, Operation::Search)?;

        let visible = self.policy.filter_search(identity, self.store.list());
        ctx.log()
            .debug(format_args!("search on {} returned {}", R::TYPE, visible.len()));
        Ok(visible)
    }
}
