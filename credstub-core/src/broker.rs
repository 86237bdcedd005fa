//! The broker: request handling and change notifications.
//!
//! [`Broker`] owns the account registry and a broadcast channel of
//! [`AccountChanged`] notifications. All five public operations run
//! synchronously; a mutation emits its notification inside the same call,
//! after the registry update commits, so a subscriber can never observe a
//! notification before the corresponding state is visible to reads.

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::credentials::CredentialMap;
use crate::error::BrokerError;
use crate::model::{Account, AccountId, InfoMap, ServiceId};
use crate::registry::AccountRegistry;

/// Capacity of the change-notification channel. A slow subscriber that lags
/// past this many events misses the overwritten ones.
const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Kind of account change announced by an [`AccountChanged`] notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Enabled,
    Disabled,
    Changed,
}

impl ChangeKind {
    /// The numeric code carried as `changeType` in the notification payload.
    pub fn code(self) -> u32 {
        match self {
            Self::Enabled => 0,
            Self::Disabled => 1,
            Self::Changed => 2,
        }
    }
}

/// Change notification describing one affected account.
///
/// Produced exactly once per successful mutation, never batched. The info
/// map is the account summary with an added `changeType` field.
#[derive(Debug, Clone)]
pub struct AccountChanged {
    pub service: ServiceId,
    pub account_id: u32,
    pub info: InfoMap,
    pub kind: ChangeKind,
}

impl AccountChanged {
    fn new(account: &Account, kind: ChangeKind) -> Self {
        let (account_id, mut info) = account.summary();
        info.insert("changeType".to_string(), Value::from(kind.code()));
        Self {
            service: account.service.clone(),
            account_id,
            info,
            kind,
        }
    }
}

/// The account/credential broker core.
///
/// Holds the registry and fans mutations out to subscribers. Methods take
/// `&self`; the registry lock serializes mutations against reads.
pub struct Broker {
    registry: AccountRegistry,
    changes: broadcast::Sender<AccountChanged>,
}

impl Broker {
    /// Create a broker over an empty registry.
    pub fn new() -> Self {
        Self::with_accounts(Vec::new())
    }

    /// Create a broker pre-populated with the given accounts, in order.
    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            registry: AccountRegistry::with_accounts(accounts),
            changes,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<AccountChanged> {
        self.changes.subscribe()
    }

    /// List all account summaries in store order.
    ///
    /// The filter map is accepted for wire compatibility and ignored. The
    /// second element of the result is reserved for service metadata and is
    /// always empty.
    pub fn list_accounts(
        &self,
        _filters: &InfoMap,
    ) -> Result<(Vec<(u32, InfoMap)>, Vec<InfoMap>), BrokerError> {
        let accounts = self.registry.list()?;
        debug!(count = accounts.len(), "listing accounts");
        let summaries = accounts.iter().map(Account::summary).collect();
        Ok((summaries, Vec::new()))
    }

    /// Authenticate against the account stored under `(id, service)`.
    ///
    /// Delegates to the account's credentials with the caller's flags. The
    /// parameter map is accepted for wire compatibility and ignored.
    pub fn authenticate(
        &self,
        id: AccountId,
        service: &ServiceId,
        interactive: bool,
        invalidate: bool,
        _parameters: &InfoMap,
    ) -> Result<CredentialMap, BrokerError> {
        debug!(%id, %service, interactive, invalidate, "authenticate");
        let account = self.registry.lookup(id, service)?;
        Ok(account.credentials.serialize(interactive, invalidate)?)
    }

    /// Grant access to the first account matching a service identifier.
    ///
    /// Returns the account summary plus its credentials serialized as if the
    /// call were interactive and non-invalidating.
    pub fn request_access(
        &self,
        service: &ServiceId,
        _parameters: &InfoMap,
    ) -> Result<((u32, InfoMap), CredentialMap), BrokerError> {
        debug!(%service, "request access");
        let account = self.registry.find_by_service(service)?;
        let credentials = account.credentials.serialize(true, false)?;
        Ok((account.summary(), credentials))
    }

    /// Decode an account specification and insert or replace it.
    ///
    /// The spec is a JSON document decoded into a typed [`Account`] record;
    /// nothing is evaluated. Emits [`ChangeKind::Changed`] when the key
    /// pre-existed, [`ChangeKind::Enabled`] otherwise. The returned
    /// notification is the one emitted.
    pub fn update_account(&self, spec: &str) -> Result<AccountChanged, BrokerError> {
        let account: Account = serde_json::from_str(spec)?;
        let existed = self.registry.upsert(account.clone())?;
        let kind = if existed {
            ChangeKind::Changed
        } else {
            ChangeKind::Enabled
        };
        info!(id = %account.id, service = %account.service, ?kind, "account updated");
        Ok(self.emit(AccountChanged::new(&account, kind)))
    }

    /// Remove the account stored under `(id, service)`, if present.
    ///
    /// Emits [`ChangeKind::Disabled`] when an account was removed; a missing
    /// key is a silent no-op with no notification.
    pub fn remove_account(
        &self,
        id: AccountId,
        service: &ServiceId,
    ) -> Result<Option<AccountChanged>, BrokerError> {
        let removed = self.registry.remove(id, service)?;
        match removed {
            Some(account) => {
                info!(%id, %service, "account removed");
                Ok(Some(self.emit(AccountChanged::new(&account, ChangeKind::Disabled))))
            }
            None => {
                debug!(%id, %service, "remove of absent account ignored");
                Ok(None)
            }
        }
    }

    fn emit(&self, notification: AccountChanged) -> AccountChanged {
        // A send with no live subscribers just drops the value.
        let _ = self.changes.send(notification.clone());
        notification
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}
