//! Concurrent per-type record storage and id assignment.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::resource::{normalize_id, Resource};

/// Upper bound on generated candidates tried for a single create.
const MAX_ID_ATTEMPTS: usize = 1024;

/// Produces candidate ids for records created without one.
///
/// Candidates do not have to be unique: the store re-draws until a
/// candidate is free. A generator that rarely collides just keeps that
/// loop short.
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh candidate id for `resource_type`.
    fn candidate(&self, resource_type: &str) -> String;
}

/// Random candidates: `Patient-3f2a...` (UUID v4, simple form).
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn candidate(&self, resource_type: &str) -> String {
        format!("{resource_type}-{}", Uuid::new_v4().simple())
    }
}

/// Monotonic candidates: `Patient-1`, `Patient-2`, ...
///
/// The counter is shared by every type the generator serves.
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    /// Starts counting at 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Starts counting at `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIds {
    fn candidate(&self, resource_type: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{resource_type}-{n}")
    }
}

impl<F> IdGenerator for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn candidate(&self, resource_type: &str) -> String {
        self(resource_type)
    }
}

/// Records of one resource type, keyed by id.
///
/// Every method takes the lock exactly once, so each call is atomic with
/// respect to the whole map. Readers never observe a half-applied write and
/// [`list`](Self::list) hands out a copy that later writes do not affect.
#[derive(Debug)]
pub struct ResourceStore<R> {
    records: RwLock<HashMap<String, R>>,
}

impl<R: Resource> ResourceStore<R> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts or overwrites the record under `id`. Returns the previous one.
    pub fn put(&self, id: impl Into<String>, record: R) -> Option<R> {
        self.records.write().insert(id.into(), record)
    }

    /// Returns a copy of the record under `id`.
    pub fn get(&self, id: &str) -> Option<R> {
        self.records.read().get(id).cloned()
    }

    /// Returns true if `id` is occupied.
    pub fn contains(&self, id: &str) -> bool {
        self.records.read().contains_key(id)
    }

    /// Removes the record under `id`. Returns whether one was present.
    pub fn delete(&self, id: &str) -> bool {
        self.records.write().remove(id).is_some()
    }

    /// Snapshot of every stored record, in no particular order.
    pub fn list(&self) -> Vec<R> {
        self.records.read().values().cloned().collect()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Drops every record.
    pub fn clear(&self) {
        self.records.write().clear();
    }

    /// Inserts `record` under `id` only if the id is free.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if `id` is occupied; the stored record is
    /// left untouched.
    pub fn insert_new(&self, id: impl Into<String>, record: R) -> Result<()> {
        let id = id.into();
        let mut records = self.records.write();
        if records.contains_key(&id) {
            return Err(Error::conflict(R::TYPE, id));
        }
        records.insert(id, record);
        Ok(())
    }

    /// Overwrites the record under `id` only if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` is free; nothing is inserted.
    pub fn replace(&self, id: &str, record: R) -> Result<R> {
        let mut records = self.records.write();
        match records.get_mut(id) {
            Some(slot) => Ok(std::mem::replace(slot, record)),
            None => Err(Error::not_found(R::TYPE, id)),
        }
    }

    /// Stores a new record, assigning its id.
    ///
    /// A payload id is normalized with [`normalize_id`] and must be free.
    /// Without one (or with one that normalizes to empty), candidates from
    /// `ids` are drawn until one is inserted. Occupancy check and insert
    /// share one write lock, so concurrent creates never share an id.
    ///
    /// Returns the record as stored, id included.
    pub fn create(&self, mut record: R, ids: &dyn IdGenerator) -> Result<R> {
        let requested = record
            .id()
            .map(normalize_id)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        if let Some(id) = requested {
            record.set_id(id.clone());
            self.insert_new(id, record.clone())?;
            return Ok(record);
        }

        for attempt in 0..MAX_ID_ATTEMPTS {
            let candidate = ids.candidate(R::TYPE);
            record.set_id(candidate.clone());
            match self.insert_new(candidate, record.clone()) {
                Ok(()) => return Ok(record),
                Err(Error::Conflict { id, .. }) => {
                    tracing::debug!(resource_type = R::TYPE, id = %id, attempt, "generated id taken, retrying");
                }
                Err(other) => return Err(other),
            }
        }

        Err(Error::Internal(format!(
            "could not assign a free {} id after {MAX_ID_ATTEMPTS} attempts",
            R::TYPE
        )))
    }
}

impl<R: Resource> Default for ResourceStore<R> {
    fn default() -> Self {
        Self::new()
    }
}
