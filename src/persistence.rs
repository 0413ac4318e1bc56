//! Credential persistence collaborators.
//!
//! The credential store loads the full account list once at startup and
//! rewrites the full list after every mutation. The format is owned by the
//! [`AccountPersistence`] implementation; the store only sees
//! [`AccountRecord`] values.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identity::Role;

/// Persisted form of one account.
///
/// Unknown fields are ignored on load so older or richer files still open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    /// Unique username
    pub username: String,
    /// Stored password, compared byte-for-byte on login
    pub password: String,
    /// Access tier
    pub role: Role,
    /// Owner record linked to this account
    #[serde(default, alias = "patientId", skip_serializing_if = "Option::is_none")]
    pub owned_resource_id: Option<String>,
    /// Contact address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Loads and saves the complete account set.
pub trait AccountPersistence: Send + Sync {
    /// Returns every stored account. A store that has never been written is
    /// empty, not an error.
    fn load(&self) -> Result<Vec<AccountRecord>>;

    /// Replaces the stored account set with `accounts`.
    fn save(&self, accounts: &[AccountRecord]) -> Result<()>;
}

impl<T: AccountPersistence + ?Sized> AccountPersistence for Box<T> {
    fn load(&self) -> Result<Vec<AccountRecord>> {
        (**self).load()
    }

    fn save(&self, accounts: &[AccountRecord]) -> Result<()> {
        (**self).save(accounts)
    }
}

/// Stores accounts as a pretty-printed JSON array in a single file.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    /// Persists to `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AccountPersistence for JsonFilePersistence {
    fn load(&self) -> Result<Vec<AccountRecord>> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no account file yet");
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        let accounts: Vec<AccountRecord> = serde_json::from_str(&raw)?;
        tracing::debug!(path = %self.path.display(), count = accounts.len(), "loaded accounts");
        Ok(accounts)
    }

    fn save(&self, accounts: &[AccountRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(accounts)?;
        // Write-then-rename so a crash never leaves a truncated file behind.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        if let Err(err) = fs::rename(&tmp, &self.path) {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                tracing::warn!(path = %tmp.display(), error = %cleanup, "could not remove temporary account file");
            }
            return Err(err.into());
        }
        tracing::debug!(path = %self.path.display(), count = accounts.len(), "saved accounts");
        Ok(())
    }
}

/// Keeps the account set in memory. Useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    accounts: Mutex<Vec<AccountRecord>>,
    saves: Mutex<usize>,
}

impl MemoryPersistence {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `accounts`.
    pub fn with_accounts(accounts: Vec<AccountRecord>) -> Self {
        Self {
            accounts: Mutex::new(accounts),
            saves: Mutex::new(0),
        }
    }

    /// Returns the last saved account set.
    pub fn snapshot(&self) -> Vec<AccountRecord> {
        self.accounts.lock().clone()
    }

    /// Returns how many times `save` has been called.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl AccountPersistence for MemoryPersistence {
    fn load(&self) -> Result<Vec<AccountRecord>> {
        Ok(self.accounts.lock().clone())
    }

    fn save(&self, accounts: &[AccountRecord]) -> Result<()> {
        *self.accounts.lock() = accounts.to_vec();
        *self.saves.lock() += 1;
        Ok(())
    }
}
