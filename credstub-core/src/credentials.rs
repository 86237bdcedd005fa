//! Credential variants and their call-time serialization.
//!
//! Every account carries one [`Credentials`] value. Serialization into a
//! response payload depends on the call-time `interactive` / `invalidate`
//! flags only for the [`Credentials::ByMode`] composite; the concrete
//! variants always render the same fixed fields, and [`Credentials::Error`]
//! always fails with its declared [`AuthError`] kind.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// String-keyed payload returned by a successful authentication.
pub type CredentialMap = serde_json::Map<String, serde_json::Value>;

/// Numeric authentication method codes, part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    OAuth1,
    OAuth2,
    Password,
}

impl AuthMethod {
    /// The numeric code reported as `authMethod` in account summaries.
    pub fn code(self) -> i32 {
        match self {
            Self::OAuth1 => 1,
            Self::OAuth2 => 2,
            Self::Password => 3,
        }
    }
}

/// Domain authentication failure, discriminable by name.
///
/// These are the only errors the `Error` credential variant can declare.
/// Callers discriminate by [`AuthError::name`], never by message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum AuthError {
    #[error("no account")]
    NoAccount,

    #[error("user canceled authentication")]
    UserCanceled,

    #[error("permission denied")]
    PermissionDenied,

    #[error("interaction required")]
    InteractionRequired,
}

impl AuthError {
    /// The stable name used for caller-side discrimination.
    pub fn name(self) -> &'static str {
        match self {
            Self::NoAccount => "NoAccount",
            Self::UserCanceled => "UserCanceled",
            Self::PermissionDenied => "PermissionDenied",
            Self::InteractionRequired => "InteractionRequired",
        }
    }
}

fn default_signature_method() -> String {
    "HMAC-SHA1".to_string()
}

/// The closed set of authentication schemes an account can carry.
///
/// The serde representation is the typed record format accepted by the
/// `UpdateAccount` test-control operation, tagged by the `auth` field:
///
/// ```json
/// {"auth": "password", "username": "user", "password": "pass"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "auth", rename_all = "lowercase")]
pub enum Credentials {
    /// OAuth 1.0a consumer/token material.
    OAuth1 {
        consumer_key: String,
        consumer_secret: String,
        token: String,
        token_secret: String,
        #[serde(default = "default_signature_method")]
        signature_method: String,
    },

    /// OAuth 2.0 bearer token with expiry and ordered granted scopes.
    OAuth2 {
        access_token: String,
        #[serde(default)]
        expires_in: i32,
        #[serde(default)]
        granted_scopes: Vec<String>,
    },

    /// Plain username/password pair.
    Password { username: String, password: String },

    /// Always fails with the declared kind, for exercising client error paths.
    Error { method: AuthMethod, kind: AuthError },

    /// Selects one of three underlying variants from the call-time flags.
    ByMode {
        noninteractive: Box<Credentials>,
        interactive: Box<Credentials>,
        refresh: Box<Credentials>,
    },
}

impl Credentials {
    /// The authentication method this credential reports in summaries.
    ///
    /// `ByMode` reports its noninteractive variant's method; `Error` reports
    /// its declared method.
    pub fn method(&self) -> AuthMethod {
        match self {
            Self::OAuth1 { .. } => AuthMethod::OAuth1,
            Self::OAuth2 { .. } => AuthMethod::OAuth2,
            Self::Password { .. } => AuthMethod::Password,
            Self::Error { method, .. } => *method,
            Self::ByMode { noninteractive, .. } => noninteractive.method(),
        }
    }

    /// Render the credential into a response payload.
    ///
    /// The concrete variants ignore both flags and return the same payload on
    /// every call. `ByMode` dispatches with `invalidate` taking precedence
    /// over `interactive`: refresh when invalidating, interactive when
    /// interactive, noninteractive otherwise.
    pub fn serialize(&self, interactive: bool, invalidate: bool) -> Result<CredentialMap, AuthError> {
        match self {
            Self::OAuth1 {
                consumer_key,
                consumer_secret,
                token,
                token_secret,
                signature_method,
            } => {
                let mut map = CredentialMap::new();
                map.insert("ConsumerKey".to_string(), consumer_key.clone().into());
                map.insert("ConsumerSecret".to_string(), consumer_secret.clone().into());
                map.insert("Token".to_string(), token.clone().into());
                map.insert("TokenSecret".to_string(), token_secret.clone().into());
                map.insert("SignatureMethod".to_string(), signature_method.clone().into());
                Ok(map)
            }
            Self::OAuth2 {
                access_token,
                expires_in,
                granted_scopes,
            } => {
                let mut map = CredentialMap::new();
                map.insert("AccessToken".to_string(), access_token.clone().into());
                map.insert("ExpiresIn".to_string(), (*expires_in).into());
                map.insert("GrantedScopes".to_string(), granted_scopes.clone().into());
                Ok(map)
            }
            Self::Password { username, password } => {
                let mut map = CredentialMap::new();
                map.insert("Username".to_string(), username.clone().into());
                map.insert("Password".to_string(), password.clone().into());
                Ok(map)
            }
            Self::Error { kind, .. } => Err(*kind),
            Self::ByMode {
                noninteractive,
                interactive: when_interactive,
                refresh,
            } => {
                // invalidate overrides interactive
                if invalidate {
                    (**refresh).serialize(interactive, invalidate)
                } else if interactive {
                    (**when_interactive).serialize(interactive, invalidate)
                } else {
                    (**noninteractive).serialize(interactive, invalidate)
                }
            }
        }
    }
}
