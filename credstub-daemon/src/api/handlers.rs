//! JSON-RPC API handlers for the daemon.

use credstub_core::{
    AccountId, Broker, BrokerError, CredentialMap, InfoMap, RegistryError, ServiceId,
    seed_accounts,
};
use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::{ErrorCode, ErrorObject};
use std::sync::Arc;
use tracing::{debug, info};

use super::types::{AccountSummary, ListAccountsResponse, RequestAccessResponse};

/// JSON-RPC error code for domain authentication failures.
///
/// The error `data` field carries the kind name (`NoAccount`, `UserCanceled`,
/// `PermissionDenied`, `InteractionRequired`) so callers discriminate by name
/// rather than by message text.
pub const AUTH_ERROR_CODE: i32 = -32050;

/// State shared across RPC handlers.
pub struct ApiState {
    /// The broker core serving every connection.
    pub broker: Arc<Broker>,
}

impl ApiState {
    /// Create state with the fixture roster preloaded.
    pub fn new() -> Self {
        Self::with_broker(Broker::with_accounts(seed_accounts()))
    }

    /// Create state with no accounts.
    pub fn empty() -> Self {
        Self::with_broker(Broker::new())
    }

    /// Create state over a provided broker (useful for tests).
    pub fn with_broker(broker: Broker) -> Self {
        Self {
            broker: Arc::new(broker),
        }
    }
}

impl Default for ApiState {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON-RPC API trait definition.
///
/// Method names, argument order and semantics are the compatibility
/// contract consumed by dependent test suites.
#[rpc(server)]
pub trait OnlineAccountsApi {
    /// List all account summaries.
    ///
    /// The filter map is accepted and ignored. The second list in the
    /// response is reserved for service metadata and is always empty.
    #[method(name = "ListAccounts")]
    async fn list_accounts(&self, filters: InfoMap) -> RpcResult<ListAccountsResponse>;

    /// Serialize the credentials of the account stored under
    /// `(id, service_id)` with the caller's flags.
    #[method(name = "Authenticate")]
    async fn authenticate(
        &self,
        id: u32,
        service_id: String,
        interactive: bool,
        invalidate: bool,
        parameters: InfoMap,
    ) -> RpcResult<CredentialMap>;

    /// Grant access to the first account matching `service_id`.
    #[method(name = "RequestAccess")]
    async fn request_access(
        &self,
        service_id: String,
        parameters: InfoMap,
    ) -> RpcResult<RequestAccessResponse>;

    /// Test-control: decode `account_spec` (a JSON document) and insert or
    /// replace that account, announcing the change.
    #[method(name = "UpdateAccount")]
    async fn update_account(&self, account_spec: String) -> RpcResult<()>;

    /// Test-control: remove the account stored under `(id, service_id)`,
    /// announcing the change. Missing keys are a silent no-op.
    #[method(name = "RemoveAccount")]
    async fn remove_account(&self, id: u32, service_id: String) -> RpcResult<()>;
}

/// Implementation of the online-accounts API over the broker core.
pub struct OnlineAccountsApiImpl {
    state: ApiState,
}

impl OnlineAccountsApiImpl {
    /// Create a new API implementation with the given state.
    pub fn new(state: ApiState) -> Self {
        Self { state }
    }

    /// The broker behind this API (connections subscribe to its changes).
    pub fn broker(&self) -> &Arc<Broker> {
        &self.state.broker
    }
}

#[async_trait::async_trait]
impl OnlineAccountsApiServer for OnlineAccountsApiImpl {
    async fn list_accounts(&self, filters: InfoMap) -> RpcResult<ListAccountsResponse> {
        debug!("RPC: ListAccounts");

        let (summaries, services) = self
            .state
            .broker
            .list_accounts(&filters)
            .map_err(rpc_error)?;

        Ok(ListAccountsResponse {
            accounts: summaries
                .into_iter()
                .map(|(id, info)| AccountSummary(id, info))
                .collect(),
            services,
        })
    }

    async fn authenticate(
        &self,
        id: u32,
        service_id: String,
        interactive: bool,
        invalidate: bool,
        parameters: InfoMap,
    ) -> RpcResult<CredentialMap> {
        debug!("RPC: Authenticate({}/{})", id, service_id);

        self.state
            .broker
            .authenticate(
                AccountId::new(id),
                &ServiceId::new(service_id),
                interactive,
                invalidate,
                &parameters,
            )
            .map_err(rpc_error)
    }

    async fn request_access(
        &self,
        service_id: String,
        parameters: InfoMap,
    ) -> RpcResult<RequestAccessResponse> {
        debug!("RPC: RequestAccess({})", service_id);

        let ((id, info), credentials) = self
            .state
            .broker
            .request_access(&ServiceId::new(service_id), &parameters)
            .map_err(rpc_error)?;

        Ok(RequestAccessResponse {
            account: AccountSummary(id, info),
            credentials,
        })
    }

    async fn update_account(&self, account_spec: String) -> RpcResult<()> {
        info!("RPC: UpdateAccount");

        self.state
            .broker
            .update_account(&account_spec)
            .map_err(rpc_error)?;
        Ok(())
    }

    async fn remove_account(&self, id: u32, service_id: String) -> RpcResult<()> {
        info!("RPC: RemoveAccount({}/{})", id, service_id);

        self.state
            .broker
            .remove_account(AccountId::new(id), &ServiceId::new(service_id))
            .map_err(rpc_error)?;
        Ok(())
    }
}

/// Map a broker failure onto the wire error taxonomy.
fn rpc_error(err: BrokerError) -> ErrorObject<'static> {
    match err {
        BrokerError::Auth(kind) => ErrorObject::owned(
            AUTH_ERROR_CODE,
            format!("authentication failed: {}", kind),
            Some(kind.name()),
        ),
        BrokerError::Registry(
            err @ (RegistryError::NotFound { .. } | RegistryError::ServiceNotFound { .. }),
        ) => ErrorObject::owned(ErrorCode::InvalidParams.code(), err.to_string(), None::<()>),
        BrokerError::Registry(err) => ErrorObject::owned(
            ErrorCode::InternalError.code(),
            err.to_string(),
            None::<()>,
        ),
        BrokerError::Spec(err) => ErrorObject::owned(
            ErrorCode::InvalidParams.code(),
            format!("malformed account spec: {}", err),
            None::<()>,
        ),
    }
}
