//! Account storage and credential verification.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{Error, Result, ValidationFailure};
use crate::identity::{Identity, Role};
use crate::persistence::{AccountPersistence, AccountRecord};
use crate::secret::Secret;

/// A stored account: an identity plus its credential.
#[derive(Debug)]
pub struct Account {
    username: String,
    password: Secret<String>,
    role: Role,
    owned_resource_id: Option<String>,
    email: Option<String>,
}

impl Account {
    /// Creates an account with no owned resource and no email.
    pub fn new(username: impl Into<String>, password: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password.into()),
            role,
            owned_resource_id: None,
            email: None,
        }
    }

    /// Links the account to an Owner record.
    pub fn with_owned_resource_id(mut self, id: impl Into<String>) -> Self {
        self.owned_resource_id = Some(id.into()).filter(|id: &String| !id.is_empty());
        self
    }

    /// Sets the contact address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Returns the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the contact address.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Projects the account to the identity a request runs as.
    pub fn identity(&self) -> Identity {
        Identity::new(
            self.username.clone(),
            self.role,
            self.owned_resource_id.clone(),
        )
    }

    fn to_record(&self) -> AccountRecord {
        AccountRecord {
            username: self.username.clone(),
            password: self.password.expose_secret().clone(),
            role: self.role,
            owned_resource_id: self.owned_resource_id.clone(),
            email: self.email.clone(),
        }
    }
}

impl From<AccountRecord> for Account {
    fn from(record: AccountRecord) -> Self {
        Self {
            username: record.username,
            password: Secret::new(record.password),
            role: record.role,
            owned_resource_id: record.owned_resource_id.filter(|id| !id.is_empty()),
            email: record.email,
        }
    }
}

/// Verifies credentials and manages accounts.
///
/// The account map sits behind a single `RwLock`: logins take the read side,
/// mutations take the write side and rewrite the persisted account set
/// before releasing it, so the persisted file always reflects a state the
/// map actually went through.
pub struct CredentialStore<P> {
    accounts: RwLock<HashMap<String, Account>>,
    persistence: P,
}

impl<P: AccountPersistence> CredentialStore<P> {
    /// Loads every account from `persistence`.
    ///
    /// When nothing was stored yet, `seeds` are provisioned and saved.
    pub fn open(persistence: P, seeds: &[AccountRecord]) -> Result<Self> {
        let loaded = persistence.load()?;
        let mut accounts: HashMap<String, Account> = loaded
            .into_iter()
            .map(|record| (record.username.clone(), Account::from(record)))
            .collect();

        let store_was_empty = accounts.is_empty();
        if store_was_empty && !seeds.is_empty() {
            for seed in seeds {
                let account = Account::from(seed.clone());
                check_credentials_shape(&account)?;
                accounts.insert(seed.username.clone(), account);
            }
            tracing::info!(count = seeds.len(), "seeded default accounts");
        }

        let store = Self {
            accounts: RwLock::new(accounts),
            persistence,
        };
        if store_was_empty && !seeds.is_empty() {
            store.persist(&store.accounts.read())?;
        }
        Ok(store)
    }

    /// Resolves credentials to an identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] when the username is unknown or
    /// the password differs. The two cases are indistinguishable.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Identity> {
        let accounts = self.accounts.read();
        match accounts.get(username) {
            Some(account) if account.password.matches(password) => {
                tracing::debug!(username, role = %account.role, "authenticated");
                Ok(account.identity())
            }
            _ => {
                tracing::warn!(username, "authentication rejected");
                Err(Error::Authentication)
            }
        }
    }

    /// Self-registration. Always creates a [`Role::User`] account.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for an empty username or password
    /// - [`Error::Conflict`] if the username is taken
    pub fn register(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
        owned_resource_id: Option<&str>,
    ) -> Result<Identity> {
        let mut account = Account::new(username, password, Role::User);
        if let Some(email) = email {
            account = account.with_email(email);
        }
        if let Some(id) = owned_resource_id {
            account = account.with_owned_resource_id(id);
        }
        self.insert_new(account)
    }

    /// Operator provisioning. Unlike [`register`](Self::register) this may
    /// create Admin accounts.
    pub fn provision(&self, account: Account) -> Result<Identity> {
        self.insert_new(account)
    }

    fn insert_new(&self, account: Account) -> Result<Identity> {
        check_credentials_shape(&account)?;

        let mut accounts = self.accounts.write();
        if accounts.contains_key(&account.username) {
            return Err(Error::conflict("Account", account.username));
        }
        let identity = account.identity();
        accounts.insert(account.username.clone(), account);
        self.persist(&accounts)?;

        tracing::info!(username = identity.username(), role = %identity.role(), "account created");
        Ok(identity)
    }

    /// Returns the identity of `username`, if the account exists.
    pub fn account(&self, username: &str) -> Option<Identity> {
        self.accounts.read().get(username).map(Account::identity)
    }

    /// Returns true if `username` is taken.
    pub fn exists(&self, username: &str) -> bool {
        self.accounts.read().contains_key(username)
    }

    /// Returns every account identity, ordered by username.
    pub fn identities(&self) -> Vec<Identity> {
        let mut all: Vec<Identity> = self.accounts.read().values().map(Account::identity).collect();
        all.sort_by(|a, b| a.username().cmp(b.username()));
        all
    }

    /// Number of stored accounts.
    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    /// Returns true when no account exists.
    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }

    /// Replaces (or inserts) the account keyed by its username.
    pub fn update(&self, account: Account) -> Result<()> {
        check_credentials_shape(&account)?;

        let mut accounts = self.accounts.write();
        let username = account.username.clone();
        accounts.insert(username.clone(), account);
        self.persist(&accounts)?;

        tracing::info!(username = %username, "account updated");
        Ok(())
    }

    /// Deletes an account. Returns whether one was removed.
    pub fn remove(&self, username: &str) -> Result<bool> {
        let mut accounts = self.accounts.write();
        if accounts.remove(username).is_none() {
            return Ok(false);
        }
        self.persist(&accounts)?;

        tracing::info!(username, "account removed");
        Ok(true)
    }

    /// Links an existing account to the Owner record `resource_id`.
    pub fn associate_owned_resource(&self, username: &str, resource_id: &str) -> Result<Identity> {
        let mut accounts = self.accounts.write();
        let account = accounts
            .get_mut(username)
            .ok_or_else(|| Error::not_found("Account", username))?;
        account.owned_resource_id = Some(resource_id.to_string()).filter(|id| !id.is_empty());
        let identity = account.identity();
        self.persist(&accounts)?;

        tracing::info!(username, resource_id, "owned resource associated");
        Ok(identity)
    }

    /// Returns the persistence collaborator.
    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    fn persist(&self, accounts: &HashMap<String, Account>) -> Result<()> {
        let mut records: Vec<AccountRecord> = accounts.values().map(Account::to_record).collect();
        records.sort_by(|a, b| a.username.cmp(&b.username));
        self.persistence.save(&records).map_err(|err| {
            tracing::error!(error = %err, "failed to persist accounts");
            err
        })
    }
}

fn check_credentials_shape(account: &Account) -> Result<()> {
    if account.username.trim().is_empty() {
        return Err(ValidationFailure::single("username must not be empty", "Account.username").into());
    }
    if account.password.expose_secret().is_empty() {
        return Err(ValidationFailure::single("password must not be empty", "Account.password").into());
    }
    Ok(())
}
