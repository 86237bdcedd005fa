//! The fixed seed roster.
//!
//! Dependent test suites address these accounts by identifier and service
//! name, so the roster is part of the observable contract: ids, display
//! names, service ids and credential contents stay as they are.

use serde_json::json;
use std::collections::BTreeMap;

use crate::credentials::{AuthError, AuthMethod, Credentials};
use crate::model::Account;

fn host_settings() -> BTreeMap<String, serde_json::Value> {
    BTreeMap::from([("host".to_string(), json!("http://www.example.com/"))])
}

/// The default fixture accounts, covering every credential variant.
pub fn seed_accounts() -> Vec<Account> {
    vec![
        Account::new(
            1,
            "OAuth1 account",
            "oauth1-service",
            Credentials::OAuth1 {
                consumer_key: "consumer_key".to_string(),
                consumer_secret: "consumer_secret".to_string(),
                token: "token".to_string(),
                token_secret: "token_secret".to_string(),
                signature_method: "HMAC-SHA1".to_string(),
            },
        ),
        Account::new(
            2,
            "OAuth2 account",
            "oauth2-service",
            Credentials::OAuth2 {
                access_token: "access_token".to_string(),
                expires_in: 0,
                granted_scopes: vec!["scope1".to_string(), "scope2".to_string()],
            },
        ),
        Account::new(
            3,
            "Password account",
            "password-service",
            Credentials::Password {
                username: "user".to_string(),
                password: "pass".to_string(),
            },
        ),
        Account::new(
            4,
            "Password host account",
            "password-host-service",
            Credentials::Password {
                username: "joe".to_string(),
                password: "secret".to_string(),
            },
        )
        .with_settings(host_settings()),
        Account::new(
            10,
            "Mode dependent account",
            "mode-service",
            Credentials::ByMode {
                noninteractive: Box::new(Credentials::Error {
                    method: AuthMethod::Password,
                    kind: AuthError::InteractionRequired,
                }),
                interactive: Box::new(Credentials::Password {
                    username: "user".to_string(),
                    password: "interactive".to_string(),
                }),
                refresh: Box::new(Credentials::Password {
                    username: "user".to_string(),
                    password: "refresh".to_string(),
                }),
            },
        )
        .with_settings(host_settings()),
        Account::new(
            11,
            "User cancel account",
            "user-cancel-service",
            Credentials::Error {
                method: AuthMethod::Password,
                kind: AuthError::UserCanceled,
            },
        ),
        Account::new(
            42,
            "Fake test account",
            "storage-provider-test",
            Credentials::OAuth2 {
                access_token: "fake-test-access-token".to_string(),
                expires_in: 0,
                granted_scopes: vec![],
            },
        ),
        Account::new(
            99,
            "Fake mcloud account",
            "storage-provider-mcloud",
            Credentials::OAuth2 {
                access_token: "fake-mcloud-access-token".to_string(),
                expires_in: 0,
                granted_scopes: vec![],
            },
        ),
    ]
}
