//! API request/response types for the daemon JSON-RPC interface.

use credstub_core::{CredentialMap, InfoMap};
use serde::{Deserialize, Serialize};

/// Account summary on the wire: a `[id, infoMap]` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary(pub u32, pub InfoMap);

/// Response to `ListAccounts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListAccountsResponse {
    /// One summary per stored account, in store order.
    pub accounts: Vec<AccountSummary>,
    /// Reserved for service metadata; always empty.
    pub services: Vec<InfoMap>,
}

/// Response to `RequestAccess`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestAccessResponse {
    /// Summary of the granted account.
    pub account: AccountSummary,
    /// The account's credentials, serialized interactively.
    pub credentials: CredentialMap,
}

/// Parameters of the outbound `AccountChanged` notification:
/// `[serviceId, [id, infoMap]]`, where the info map carries `changeType`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountChangedParams(pub String, pub AccountSummary);
