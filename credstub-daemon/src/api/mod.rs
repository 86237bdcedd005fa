//! JSON-RPC API for the fake online-accounts daemon.
//!
//! This module provides the call/response surface exercised by client
//! integration tests, plus the outbound `AccountChanged` notification
//! stream.

pub mod handlers;
pub mod server;
pub mod types;

pub use handlers::{ApiState, OnlineAccountsApiImpl, OnlineAccountsApiServer, AUTH_ERROR_CODE};
pub use server::{start_server, ServerHandle};
pub use types::{AccountChangedParams, AccountSummary, ListAccountsResponse, RequestAccessResponse};
