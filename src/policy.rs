use std::fmt;

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::resource::{Resource, ResourceKind};

/// An operation a request asks to perform on one resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Store a new record
    Create,
    /// Fetch one record by id
    Read,
    /// Replace an existing record
    Update,
    /// Remove a record
    Delete,
    /// List every visible record
    Search,
}

impl Operation {
    /// Returns true for operations that mutate the store.
    pub fn is_write(self) -> bool {
        matches!(self, Operation::Create | Operation::Update | Operation::Delete)
    }

    /// Lowercase name used in logs and audit events.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Search => "search",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which records a search may return for a given identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchScope {
    /// Every record
    All,
    /// Only records owned by this Owner id
    Owned(String),
    /// No records at all
    Nothing,
}

/// Role- and ownership-based access decisions.
///
/// Decisions happen in two steps. [`check_operation`](Self::check_operation)
/// runs before the store is touched and only looks at the role.
/// [`check_ownership`](Self::check_ownership) runs once a record has been
/// located and only restricts [`Role::User`](crate::Role::User).
///
/// | role  | create/update/delete | read            | search          |
/// |-------|----------------------|-----------------|-----------------|
/// | Admin | allowed              | any record      | every record    |
/// | User  | Forbidden            | owned records   | owned records   |
#[derive(Debug, Default, Clone, Copy)]
pub struct AuthorizationPolicy;

impl AuthorizationPolicy {
    /// Creates the policy.
    pub fn new() -> Self {
        Self
    }

    /// Role check for `operation`, independent of any record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forbidden`] when a User asks for a write.
    pub fn check_operation(&self, identity: &Identity, operation: Operation) -> Result<()> {
        if identity.is_admin() || !operation.is_write() {
            return Ok(());
        }
        tracing::debug!(
            username = identity.username(),
            operation = operation.as_str(),
            "write denied for non-admin"
        );
        Err(Error::forbidden(format!(
            "role '{}' may not {operation}",
            identity.role()
        )))
    }

    /// Returns true if `identity` may see `record`.
    pub fn can_access<R: Resource>(&self, identity: &Identity, record: &R) -> bool {
        if identity.is_admin() {
            return true;
        }
        match (identity.owned_resource_id(), record.owner_id()) {
            (Some(owned), Some(owner)) => owned == owner,
            _ => false,
        }
    }

    /// Ownership check for a located record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forbidden`] when a User does not own `record`.
    pub fn check_ownership<R: Resource>(&self, identity: &Identity, record: &R) -> Result<()> {
        if self.can_access(identity, record) {
            Ok(())
        } else {
            Err(Error::forbidden(format!(
                "{} is not owned by '{}'",
                R::TYPE,
                identity.username()
            )))
        }
    }

    /// Returns the set of records a search by `identity` may return.
    pub fn search_scope(&self, identity: &Identity) -> SearchScope {
        if identity.is_admin() {
            return SearchScope::All;
        }
        match identity.owned_resource_id() {
            Some(id) => SearchScope::Owned(id.to_string()),
            None => SearchScope::Nothing,
        }
    }

    /// Reduces `records` to what `identity` may see.
    ///
    /// For Owner types a User gets at most its own record; for Dependent
    /// types every record that references it. Records with no owner
    /// reference are dropped for Users.
    pub fn filter_search<R: Resource>(&self, identity: &Identity, records: Vec<R>) -> Vec<R> {
        match self.search_scope(identity) {
            SearchScope::All => records,
            SearchScope::Nothing => Vec::new(),
            SearchScope::Owned(owned) => {
                let mut visible: Vec<R> = records
                    .into_iter()
                    .filter(|record| record.owner_id() == Some(owned.as_str()))
                    .collect();
                if R::KIND == ResourceKind::Owner {
                    visible.truncate(1);
                }
                visible
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::resource::{Observation, Patient};
    use serde_json::json;

    fn patient(id: &str) -> Patient {
        Patient::with_id(id, json!({}))
    }

    fn observation(id: &str, subject: &str) -> Observation {
        Observation::about(subject, json!({})).with_id(id)
    }

    #[test]
    fn admin_may_do_everything() {
        let policy = AuthorizationPolicy::new();
        let admin = Identity::admin("admin");

        for op in [
            Operation::Create,
            Operation::Read,
            Operation::Update,
            Operation::Delete,
            Operation::Search,
        ] {
            assert!(policy.check_operation(&admin, op).is_ok(), "{op}");
        }
        assert!(policy.check_ownership(&admin, &patient("anything")).is_ok());
    }

    #[test]
    fn user_writes_are_forbidden_even_when_owned() {
        let policy = AuthorizationPolicy::new();
        let user = Identity::user("alice", Some("123"));

        for op in [Operation::Create, Operation::Update, Operation::Delete] {
            let err = policy.check_operation(&user, op).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Forbidden);
        }
        assert!(policy.check_operation(&user, Operation::Read).is_ok());
        assert!(policy.check_operation(&user, Operation::Search).is_ok());
    }

    #[test]
    fn ownership_of_owner_and_dependent_records() {
        let policy = AuthorizationPolicy::new();
        let user = Identity::user("alice", Some("123"));

        assert!(policy.check_ownership(&user, &patient("123")).is_ok());
        assert!(policy.check_ownership(&user, &patient("999")).is_err());
        assert!(policy
            .check_ownership(&user, &observation("o1", "Patient/123"))
            .is_ok());
        assert!(policy
            .check_ownership(&user, &observation("o2", "456"))
            .is_err());
    }

    #[test]
    fn orphan_dependents_are_invisible_to_users() {
        let policy = AuthorizationPolicy::new();
        let user = Identity::user("alice", Some("123"));
        let orphan = Observation {
            id: Some("o1".into()),
            subject: None,
            body: json!({}),
        };

        assert!(!policy.can_access(&user, &orphan));
        assert!(policy.can_access(&Identity::admin("root"), &orphan));
    }

    #[test]
    fn user_without_owned_id_sees_nothing() {
        let policy = AuthorizationPolicy::new();
        let user = Identity::user("drifter", None);

        assert_eq!(policy.search_scope(&user), SearchScope::Nothing);
        assert!(policy
            .filter_search(&user, vec![patient("1"), patient("2")])
            .is_empty());
        assert!(!policy.can_access(&user, &patient("1")));
    }

    #[test]
    fn search_filter_keeps_owned_records_only() {
        let policy = AuthorizationPolicy::new();
        let user = Identity::user("alice", Some("123"));

        let patients = policy.filter_search(&user, vec![patient("1"), patient("123")]);
        assert_eq!(patients, vec![patient("123")]);

        let observations = policy.filter_search(
            &user,
            vec![
                observation("a", "Patient/123"),
                observation("b", "456"),
                observation("c", "123"),
            ],
        );
        let ids: Vec<_> = observations.iter().filter_map(|o| o.id.as_deref()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn admin_search_is_unfiltered() {
        let policy = AuthorizationPolicy::new();
        let all = vec![patient("1"), patient("2")];

        assert_eq!(policy.search_scope(&Identity::admin("root")), SearchScope::All);
        assert_eq!(policy.filter_search(&Identity::admin("root"), all.clone()), all);
    }
}
