//! # credstub Core
//!
//! Core library for the credstub fake online-accounts broker.
//!
//! This crate provides:
//! - Credential variants and their call-time serialization rules
//! - The account model and in-memory registry
//! - The broker: request handling plus change-notification fan-out
//! - The fixed seed roster used as default fixture state
//!
//! ## Quick Start
//!
//! ```
//! use credstub_core::{AccountId, Broker, InfoMap, ServiceId, seed_accounts};
//!
//! let broker = Broker::with_accounts(seed_accounts());
//! let payload = broker
//!     .authenticate(
//!         AccountId::new(3),
//!         &ServiceId::new("password-service"),
//!         false,
//!         false,
//!         &InfoMap::new(),
//!     )
//!     .unwrap();
//! assert_eq!(payload["Username"], "user");
//! ```

pub mod broker;
pub mod credentials;
pub mod error;
pub mod model;
pub mod registry;
pub mod seed;

// Re-export commonly used types at crate root
pub use model::{Account, AccountId, InfoMap, ServiceId};

pub use credentials::{AuthError, AuthMethod, CredentialMap, Credentials};

pub use registry::{AccountRegistry, RegistryError};

pub use broker::{AccountChanged, Broker, ChangeKind};

pub use error::BrokerError;

pub use seed::seed_accounts;
