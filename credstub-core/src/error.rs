//! Top-level error type for broker operations.

use thiserror::Error;

use crate::credentials::AuthError;
use crate::registry::RegistryError;

/// Everything a broker operation can fail with.
///
/// The three arms match the caller-visible taxonomy: a lookup miss, a
/// declared credential error, and a malformed test-control spec. No arm is
/// retried or recovered internally; each failure is reported to the caller
/// of the operation that raised it.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Requested key or service identifier is not present.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A credential variant declared this failure.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The `UpdateAccount` specification could not be decoded.
    #[error("malformed account spec: {0}")]
    Spec(#[from] serde_json::Error),
}
