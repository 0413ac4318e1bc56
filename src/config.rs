//! Runtime configuration and wiring.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::audit::{AuditSink, TracingAudit};
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::gate::RequestGate;
use crate::identity::Role;
use crate::persistence::{AccountPersistence, AccountRecord, JsonFilePersistence, MemoryPersistence};
use crate::resource::{Observation, Patient};
use crate::service::ResourceService;
use crate::store::{IdGenerator, ResourceStore, SequentialIds, UuidIds};
use crate::web::Dispatcher;

/// How ids are generated for records created without one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// `Type-<uuid>`
    #[default]
    Uuid,
    /// `Type-1`, `Type-2`, ...
    Sequential,
}

impl IdStrategy {
    /// Builds a generator for this strategy.
    pub fn generator(self) -> Arc<dyn IdGenerator> {
        match self {
            IdStrategy::Uuid => Arc::new(UuidIds),
            IdStrategy::Sequential => Arc::new(SequentialIds::new()),
        }
    }
}

/// Settings for a complete guard: credentials, id assignment and read
/// denial behaviour.
///
/// Every field has a default, so `{}` is a valid configuration:
///
/// ```
/// use fhir_guard::{GuardConfig, IdStrategy};
///
/// let config = GuardConfig::from_json_str(r#"{ "id_strategy": "sequential" }"#).unwrap();
/// assert_eq!(config.id_strategy, IdStrategy::Sequential);
/// assert!(!config.conceal_denied_reads);
/// assert!(config.accounts_path.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// JSON account file. Accounts live in memory only when unset.
    pub accounts_path: Option<PathBuf>,
    /// Answer denied reads with NotFound instead of Forbidden.
    pub conceal_denied_reads: bool,
    /// Id generation for id-less creates.
    pub id_strategy: IdStrategy,
    /// Accounts provisioned when the account store starts out empty.
    pub seed_accounts: Vec<AccountRecord>,
}

impl GuardConfig {
    /// Parses a JSON configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config = Self::from_json_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Adds the stock `admin`/`admin123` and `user`/`user123` seed accounts.
    pub fn with_demo_accounts(mut self) -> Self {
        self.seed_accounts.extend([
            AccountRecord {
                username: "admin".to_string(),
                password: "admin123".to_string(),
                role: Role::Admin,
                owned_resource_id: None,
                email: Some("admin@example.com".to_string()),
            },
            AccountRecord {
                username: "user".to_string(),
                password: "user123".to_string(),
                role: Role::User,
                owned_resource_id: None,
                email: Some("user@example.com".to_string()),
            },
        ]);
        self
    }

    /// Picks the account persistence this configuration asks for.
    pub fn persistence(&self) -> Box<dyn AccountPersistence> {
        match &self.accounts_path {
            Some(path) => Box::new(JsonFilePersistence::new(path)),
            None => Box::new(MemoryPersistence::new()),
        }
    }

    /// Opens the credential store, seeding it if empty.
    pub fn open_credentials(&self) -> Result<CredentialStore<Box<dyn AccountPersistence>>> {
        CredentialStore::open(self.persistence(), &self.seed_accounts)
    }

    /// Wires a dispatcher that audits through `tracing`.
    pub fn build(&self) -> Result<Dispatcher<Box<dyn AccountPersistence>>> {
        self.build_with_audit(Arc::new(TracingAudit::new()))
    }

    /// Wires a dispatcher with empty stores and the given audit sink.
    pub fn build_with_audit(
        &self,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Dispatcher<Box<dyn AccountPersistence>>> {
        let credentials = Arc::new(self.open_credentials()?);
        let gate = RequestGate::new(credentials).with_audit(audit);
        let ids = self.id_strategy.generator();

        let patients = ResourceService::new(Arc::new(ResourceStore::<Patient>::new()))
            .with_id_generator(Arc::clone(&ids))
            .conceal_denied_reads(self.conceal_denied_reads);
        let observations = ResourceService::new(Arc::new(ResourceStore::<Observation>::new()))
            .with_id_generator(ids)
            .conceal_denied_reads(self.conceal_denied_reads);

        tracing::info!(
            id_strategy = ?self.id_strategy,
            conceal_denied_reads = self.conceal_denied_reads,
            "guard ready"
        );
        Ok(Dispatcher::new(gate, patients, observations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn empty_document_is_the_default() {
        assert_eq!(GuardConfig::from_json_str("{}").unwrap(), GuardConfig::default());
    }

    #[test]
    fn full_document_parses() {
        let config = GuardConfig::from_json_str(
            r#"{
                "accounts_path": "/var/lib/guard/users.json",
                "conceal_denied_reads": true,
                "id_strategy": "uuid",
                "seed_accounts": [
                    {"username": "ops", "password": "pw", "role": "admin"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.accounts_path, Some(PathBuf::from("/var/lib/guard/users.json")));
        assert!(config.conceal_denied_reads);
        assert_eq!(config.seed_accounts[0].role, Role::Admin);
    }

    #[test]
    fn malformed_document_is_an_error() {
        let err = GuardConfig::from_json_str(r#"{"id_strategy": "random"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn demo_accounts_seed_an_empty_store() {
        let store = GuardConfig::default()
            .with_demo_accounts()
            .open_credentials()
            .unwrap();

        assert!(store.authenticate("admin", "admin123").unwrap().is_admin());
        assert!(!store.authenticate("user", "user123").unwrap().is_admin());
    }

    #[test]
    fn file_config_persists_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let accounts = dir.path().join("users.json");
        let config_path = dir.path().join("guard.json");
        fs::write(
            &config_path,
            format!(r#"{{"accounts_path": {}}}"#, serde_json::json!(accounts)),
        )
        .unwrap();

        let config = GuardConfig::from_file(&config_path).unwrap().with_demo_accounts();
        config.build().unwrap();

        assert!(accounts.exists());
    }
}
