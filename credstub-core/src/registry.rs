//! In-memory account registry.
//!
//! Accounts are keyed by the `(AccountId, ServiceId)` pair. The backing
//! `Vec` preserves store order: inserts append, replacements keep the
//! existing position. This order is observable through the list operation
//! and through the first-match rule of [`AccountRegistry::find_by_service`].
//!
//! # Thread Safety
//!
//! This implementation uses interior mutability via `RwLock` and is safe to
//! share across threads via `Arc`. The registry is never persisted; its
//! contents live and die with the process.

use crate::model::{Account, AccountId, ServiceId};
use std::sync::RwLock;
use thiserror::Error;

/// Error type for registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No account stored under the `(id, service)` key.
    #[error("account {id}/{service} not found")]
    NotFound { id: u32, service: String },

    /// No account has the requested service identifier.
    #[error("no account for service {service}")]
    ServiceNotFound { service: String },

    /// Internal lock poisoning error.
    #[error("internal lock error: {message}")]
    Lock { message: String },
}

/// In-memory mapping from `(AccountId, ServiceId)` to [`Account`].
pub struct AccountRegistry {
    accounts: RwLock<Vec<Account>>,
}

impl AccountRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(Vec::new()),
        }
    }

    /// Create a registry pre-populated with the given accounts, in order.
    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        Self {
            accounts: RwLock::new(accounts),
        }
    }

    /// List all accounts in current store order.
    pub fn list(&self) -> Result<Vec<Account>, RegistryError> {
        let accounts = self.accounts.read().map_err(|e| RegistryError::Lock {
            message: format!("read lock poisoned: {}", e),
        })?;
        Ok(accounts.clone())
    }

    /// Look up an account by its `(id, service)` key.
    pub fn lookup(&self, id: AccountId, service: &ServiceId) -> Result<Account, RegistryError> {
        let accounts = self.accounts.read().map_err(|e| RegistryError::Lock {
            message: format!("read lock poisoned: {}", e),
        })?;
        accounts
            .iter()
            .find(|a| a.id == id && &a.service == service)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                id: id.value(),
                service: service.to_string(),
            })
    }

    /// Find the first account matching a service identifier.
    ///
    /// Service identifiers are not assumed unique; ties resolve to the first
    /// match in store order.
    pub fn find_by_service(&self, service: &ServiceId) -> Result<Account, RegistryError> {
        let accounts = self.accounts.read().map_err(|e| RegistryError::Lock {
            message: format!("read lock poisoned: {}", e),
        })?;
        accounts
            .iter()
            .find(|a| &a.service == service)
            .cloned()
            .ok_or_else(|| RegistryError::ServiceNotFound {
                service: service.to_string(),
            })
    }

    /// Insert or replace an account by its key.
    ///
    /// Returns `true` when the key already existed (the stored value is
    /// replaced in place, keeping its position).
    pub fn upsert(&self, account: Account) -> Result<bool, RegistryError> {
        let mut accounts = self.accounts.write().map_err(|e| RegistryError::Lock {
            message: format!("write lock poisoned: {}", e),
        })?;
        match accounts
            .iter_mut()
            .find(|a| a.id == account.id && a.service == account.service)
        {
            Some(existing) => {
                *existing = account;
                Ok(true)
            }
            None => {
                accounts.push(account);
                Ok(false)
            }
        }
    }

    /// Remove an account by its key, returning it if it was present.
    ///
    /// Removal of an absent key is a silent no-op.
    pub fn remove(
        &self,
        id: AccountId,
        service: &ServiceId,
    ) -> Result<Option<Account>, RegistryError> {
        let mut accounts = self.accounts.write().map_err(|e| RegistryError::Lock {
            message: format!("write lock poisoned: {}", e),
        })?;
        let position = accounts
            .iter()
            .position(|a| a.id == id && &a.service == service);
        Ok(position.map(|index| accounts.remove(index)))
    }
}

impl Default for AccountRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credentials;

    fn account(id: u32, service: &str, password: &str) -> Account {
        Account::new(
            id,
            format!("Account {}", id),
            service,
            Credentials::Password {
                username: "user".to_string(),
                password: password.to_string(),
            },
        )
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let registry = AccountRegistry::new();
        registry.upsert(account(2, "b-service", "x")).unwrap();
        registry.upsert(account(1, "a-service", "x")).unwrap();
        registry.upsert(account(3, "c-service", "x")).unwrap();

        let ids: Vec<u32> = registry
            .list()
            .unwrap()
            .iter()
            .map(|a| a.id.value())
            .collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let registry = AccountRegistry::new();
        registry.upsert(account(1, "a-service", "x")).unwrap();
        registry.upsert(account(2, "b-service", "x")).unwrap();

        let existed = registry.upsert(account(1, "a-service", "updated")).unwrap();
        assert!(existed);

        let accounts = registry.list().unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].id.value(), 1);
        assert_eq!(
            accounts[0].credentials,
            Credentials::Password {
                username: "user".to_string(),
                password: "updated".to_string(),
            }
        );
    }

    #[test]
    fn test_lookup_requires_both_key_parts() {
        let registry = AccountRegistry::new();
        registry.upsert(account(1, "a-service", "x")).unwrap();

        assert!(registry
            .lookup(AccountId::new(1), &ServiceId::new("a-service"))
            .is_ok());
        assert!(matches!(
            registry.lookup(AccountId::new(1), &ServiceId::new("b-service")),
            Err(RegistryError::NotFound { .. })
        ));
        assert!(matches!(
            registry.lookup(AccountId::new(2), &ServiceId::new("a-service")),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_find_by_service_first_match() {
        let registry = AccountRegistry::new();
        registry.upsert(account(1, "shared-service", "first")).unwrap();
        registry.upsert(account(2, "shared-service", "second")).unwrap();

        let found = registry
            .find_by_service(&ServiceId::new("shared-service"))
            .unwrap();
        assert_eq!(found.id.value(), 1);

        assert!(matches!(
            registry.find_by_service(&ServiceId::new("missing-service")),
            Err(RegistryError::ServiceNotFound { .. })
        ));
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let registry = AccountRegistry::new();
        registry.upsert(account(1, "a-service", "x")).unwrap();

        let removed = registry
            .remove(AccountId::new(9), &ServiceId::new("a-service"))
            .unwrap();
        assert!(removed.is_none());
        assert_eq!(registry.list().unwrap().len(), 1);

        let removed = registry
            .remove(AccountId::new(1), &ServiceId::new("a-service"))
            .unwrap();
        assert_eq!(removed.unwrap().id.value(), 1);
        assert!(registry.list().unwrap().is_empty());
    }
}
