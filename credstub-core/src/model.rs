//! Domain model types for credstub.
//!
//! This module defines the core types used throughout credstub:
//! - [`ServiceId`] - Identifier for a service (e.g., "password-service")
//! - [`AccountId`] - Numeric identifier for an account
//! - [`Account`] - An account pairing display metadata with credentials
//! - [`InfoMap`] - The string-keyed summary map used in listings and signals

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::credentials::Credentials;

/// String-keyed map of account summary fields.
///
/// Values are JSON values so settings of any shape can be carried alongside
/// the fixed `displayName` / `serviceId` / `authMethod` fields.
pub type InfoMap = serde_json::Map<String, serde_json::Value>;

/// Identifier for a service (e.g., "oauth1-service", "password-service").
///
/// # Examples
///
/// ```
/// use credstub_core::ServiceId;
///
/// let service = ServiceId::new("password-service");
/// assert_eq!(service.as_str(), "password-service");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(String);

impl ServiceId {
    /// Create a new service ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the service ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ServiceId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Numeric identifier for an account.
///
/// Account IDs are not unique on their own: the same ID may appear under
/// different services. The registry key is the `(AccountId, ServiceId)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(u32);

impl AccountId {
    /// Create a new account ID.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the numeric value of the ID.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for AccountId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// An account pairing identity/display metadata with credentials and
/// optional key-value settings.
///
/// The `(id, service)` pair is the unique registry key and is immutable once
/// the account is created; credentials and settings are replaced wholesale by
/// storing a new `Account` under the same key.
///
/// Accounts deserialize from the JSON document accepted by the
/// `UpdateAccount` test-control operation:
///
/// ```
/// use credstub_core::Account;
///
/// let account: Account = serde_json::from_str(
///     r#"{
///         "id": 7,
///         "displayName": "Example",
///         "serviceId": "example-service",
///         "credentials": {"auth": "password", "username": "u", "password": "p"}
///     }"#,
/// ).unwrap();
/// assert_eq!(account.id.value(), 7);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Account {
    /// Numeric account identifier.
    pub id: AccountId,

    /// Human-readable account name.
    pub display_name: String,

    /// The service this account belongs to.
    #[serde(rename = "serviceId")]
    pub service: ServiceId,

    /// The authentication material handed out for this account.
    pub credentials: Credentials,

    /// Optional per-account settings, flattened into summaries under a
    /// `settings/` prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<BTreeMap<String, serde_json::Value>>,
}

impl Account {
    /// Create a new account without settings.
    pub fn new(
        id: impl Into<AccountId>,
        display_name: impl Into<String>,
        service: impl Into<ServiceId>,
        credentials: Credentials,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            service: service.into(),
            credentials,
            settings: None,
        }
    }

    /// Attach settings to the account.
    pub fn with_settings(mut self, settings: BTreeMap<String, serde_json::Value>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Build the `(id, info)` summary used in listings and change signals.
    ///
    /// The info map always contains `displayName`, `serviceId` and the
    /// numeric `authMethod` code; settings are flattened into the same map
    /// under `settings/<key>`.
    pub fn summary(&self) -> (u32, InfoMap) {
        let mut info = InfoMap::new();
        info.insert(
            "displayName".to_string(),
            serde_json::Value::String(self.display_name.clone()),
        );
        info.insert(
            "serviceId".to_string(),
            serde_json::Value::String(self.service.to_string()),
        );
        info.insert(
            "authMethod".to_string(),
            serde_json::Value::from(self.credentials.method().code()),
        );
        if let Some(settings) = &self.settings {
            for (key, value) in settings {
                info.insert(format!("settings/{}", key), value.clone());
            }
        }
        (self.id.value(), info)
    }
}
