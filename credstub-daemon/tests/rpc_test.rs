//! Integration tests for the daemon RPC API.
//!
//! These tests drive the JSON-RPC server over Unix sockets: listing the
//! seeded roster, authenticating, discriminating credential errors by name,
//! and observing pushed `AccountChanged` notifications from a second
//! connection.

use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::{Duration, sleep, timeout};

use credstub_daemon::api::{ApiState, AUTH_ERROR_CODE, ServerHandle, start_server};

/// Helper to set up a seeded test server with a unique temp socket path.
/// Returns the temp directory (which must be kept alive), socket path, and
/// server handle.
async fn setup_test_server() -> (TempDir, PathBuf, ServerHandle) {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");

    let handle = start_server(&socket_path, ApiState::new()).await.unwrap();

    // Give the server time to start accepting connections
    sleep(Duration::from_millis(100)).await;

    (temp_dir, socket_path, handle)
}

/// Detect whether the sandbox allows binding Unix sockets. Skip tests if not.
fn can_bind_unix_socket() -> bool {
    let path = std::env::temp_dir().join("credstub-socket-permission-check.sock");
    let _ = fs::remove_file(&path);
    let result = std::os::unix::net::UnixListener::bind(&path);
    let ok = result.is_ok();
    let _ = fs::remove_file(&path);
    ok
}

/// Send an RPC request and return the full matching response document.
///
/// Pushed notifications carry no `id` and are skipped.
async fn send_raw_request(
    stream: &mut UnixStream,
    method: &str,
    params: Value,
    id: u64,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": id,
    });

    let request_str = serde_json::to_string(&request)?;
    stream.write_all(request_str.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.flush().await?;

    let mut reader = BufReader::new(stream);
    let mut response_str = String::new();
    loop {
        response_str.clear();
        reader.read_line(&mut response_str).await?;
        let response: Value = serde_json::from_str(&response_str)?;
        if response.get("id").is_some() {
            return Ok(response);
        }
    }
}

/// Send an RPC request and return its `result`, failing on an error response.
async fn send_rpc_request(
    stream: &mut UnixStream,
    method: &str,
    params: Value,
    id: u64,
) -> Result<Value, Box<dyn std::error::Error>> {
    let response = send_raw_request(stream, method, params, id).await?;

    if let Some(error) = response.get("error") {
        return Err(format!("RPC error: {}", error).into());
    }

    Ok(response.get("result").ok_or("No result in response")?.clone())
}

/// Read one pushed notification from a connection that sent no request.
async fn read_notification(stream: &mut UnixStream) -> Value {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .expect("timed out waiting for notification")
        .expect("failed to read notification");
    serde_json::from_str(&line).expect("notification was not valid JSON")
}

async fn connect(socket_path: &Path) -> UnixStream {
    UnixStream::connect(socket_path)
        .await
        .expect("Failed to connect to daemon")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_accounts_seeded_roster() {
    if !can_bind_unix_socket() {
        eprintln!("Skipping test_list_accounts_seeded_roster: Unix sockets not permitted");
        return;
    }

    let (_temp_dir, socket_path, handle) = setup_test_server().await;
    let mut stream = connect(&socket_path).await;

    let result = send_rpc_request(&mut stream, "ListAccounts", json!([{}]), 1)
        .await
        .unwrap();

    let accounts = result["accounts"].as_array().unwrap();
    let ids: Vec<u64> = accounts.iter().map(|a| a[0].as_u64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 10, 11, 42, 99]);

    let info = &accounts[2][1];
    assert_eq!(info["displayName"], json!("Password account"));
    assert_eq!(info["serviceId"], json!("password-service"));
    assert_eq!(info["authMethod"], json!(3));

    // Settings flattened under the prefix for the accounts that carry them
    assert_eq!(accounts[3][1]["settings/host"], json!("http://www.example.com/"));

    assert_eq!(result["services"], json!([]));

    handle.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_authenticate_and_request_access() {
    if !can_bind_unix_socket() {
        eprintln!("Skipping test_authenticate_and_request_access: Unix sockets not permitted");
        return;
    }

    let (_temp_dir, socket_path, handle) = setup_test_server().await;
    let mut stream = connect(&socket_path).await;

    let credentials = send_rpc_request(
        &mut stream,
        "Authenticate",
        json!([3, "password-service", false, false, {}]),
        1,
    )
    .await
    .unwrap();
    assert_eq!(credentials, json!({"Username": "user", "Password": "pass"}));

    let result = send_rpc_request(&mut stream, "RequestAccess", json!(["password-service", {}]), 2)
        .await
        .unwrap();
    assert_eq!(result["account"][0], json!(3));
    assert_eq!(result["account"][1]["displayName"], json!("Password account"));
    assert_eq!(result["credentials"], credentials);

    handle.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mode_dependent_authentication_over_rpc() {
    if !can_bind_unix_socket() {
        eprintln!("Skipping test_mode_dependent_authentication_over_rpc: Unix sockets not permitted");
        return;
    }

    let (_temp_dir, socket_path, handle) = setup_test_server().await;
    let mut stream = connect(&socket_path).await;

    // Noninteractive mode of the seeded mode-service account declares
    // InteractionRequired.
    let response = send_raw_request(
        &mut stream,
        "Authenticate",
        json!([10, "mode-service", false, false, {}]),
        1,
    )
    .await
    .unwrap();
    assert_eq!(response["error"]["code"], json!(AUTH_ERROR_CODE));
    assert_eq!(response["error"]["data"], json!("InteractionRequired"));

    let interactive = send_rpc_request(
        &mut stream,
        "Authenticate",
        json!([10, "mode-service", true, false, {}]),
        2,
    )
    .await
    .unwrap();
    assert_eq!(interactive["Password"], json!("interactive"));

    // invalidate selects the refresh variant even when interactive
    let refresh = send_rpc_request(
        &mut stream,
        "Authenticate",
        json!([10, "mode-service", true, true, {}]),
        3,
    )
    .await
    .unwrap();
    assert_eq!(refresh["Password"], json!("refresh"));

    handle.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_error_kinds_are_discriminable() {
    if !can_bind_unix_socket() {
        eprintln!("Skipping test_error_kinds_are_discriminable: Unix sockets not permitted");
        return;
    }

    let (_temp_dir, socket_path, handle) = setup_test_server().await;
    let mut stream = connect(&socket_path).await;

    // Error-variant credential: the declared kind, by name, in `data`.
    let response = send_raw_request(
        &mut stream,
        "Authenticate",
        json!([11, "user-cancel-service", true, true, {}]),
        1,
    )
    .await
    .unwrap();
    assert_eq!(response["error"]["code"], json!(AUTH_ERROR_CODE));
    assert_eq!(response["error"]["data"], json!("UserCanceled"));

    // Unknown key: a generic not-found error, never a credential kind.
    let response = send_raw_request(
        &mut stream,
        "Authenticate",
        json!([1234, "password-service", false, false, {}]),
        2,
    )
    .await
    .unwrap();
    assert_eq!(response["error"]["code"], json!(-32602));
    assert!(response["error"].get("data").is_none());
    assert!(
        response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("not found")
    );

    handle.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_update_account_pushes_notification() {
    if !can_bind_unix_socket() {
        eprintln!("Skipping test_update_account_pushes_notification: Unix sockets not permitted");
        return;
    }

    let (_temp_dir, socket_path, handle) = setup_test_server().await;

    // Passive listener connection, opened before the mutation.
    let mut listener = connect(&socket_path).await;
    sleep(Duration::from_millis(50)).await;

    let mut stream = connect(&socket_path).await;
    let spec = json!({
        "id": 7,
        "displayName": "Notify account",
        "serviceId": "notify-service",
        "credentials": {"auth": "password", "username": "n", "password": "p"},
    })
    .to_string();
    send_rpc_request(&mut stream, "UpdateAccount", json!([spec]), 1)
        .await
        .unwrap();

    let notification = read_notification(&mut listener).await;
    assert_eq!(notification["method"], json!("AccountChanged"));
    assert!(notification.get("id").is_none());
    assert_eq!(notification["params"][0], json!("notify-service"));
    assert_eq!(notification["params"][1][0], json!(7));
    assert_eq!(notification["params"][1][1]["changeType"], json!(0));

    // Replacing the same key announces Changed, removal announces Disabled.
    send_rpc_request(&mut stream, "UpdateAccount", json!([spec]), 2)
        .await
        .unwrap();
    let notification = read_notification(&mut listener).await;
    assert_eq!(notification["params"][1][1]["changeType"], json!(2));

    send_rpc_request(&mut stream, "RemoveAccount", json!([7, "notify-service"]), 3)
        .await
        .unwrap();
    let notification = read_notification(&mut listener).await;
    assert_eq!(notification["params"][1][1]["changeType"], json!(1));

    let result = send_rpc_request(&mut stream, "ListAccounts", json!([{}]), 4)
        .await
        .unwrap();
    let ids: Vec<u64> = result["accounts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a[0].as_u64().unwrap())
        .collect();
    assert!(!ids.contains(&7));

    handle.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remove_missing_account_is_silent() {
    if !can_bind_unix_socket() {
        eprintln!("Skipping test_remove_missing_account_is_silent: Unix sockets not permitted");
        return;
    }

    let (_temp_dir, socket_path, handle) = setup_test_server().await;

    let mut listener = connect(&socket_path).await;
    sleep(Duration::from_millis(50)).await;

    let mut stream = connect(&socket_path).await;
    let result = send_rpc_request(&mut stream, "RemoveAccount", json!([555, "no-such-service"]), 1)
        .await
        .unwrap();
    assert_eq!(result, Value::Null);

    // No notification arrives for the no-op removal.
    let mut reader = BufReader::new(&mut listener);
    let mut line = String::new();
    let outcome = timeout(Duration::from_millis(300), reader.read_line(&mut line)).await;
    assert!(outcome.is_err(), "unexpected notification: {}", line);

    // The daemon keeps serving afterwards.
    let result = send_rpc_request(&mut stream, "ListAccounts", json!([{}]), 2)
        .await
        .unwrap();
    assert_eq!(result["accounts"].as_array().unwrap().len(), 8);

    handle.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_malformed_requests_are_structured_failures() {
    if !can_bind_unix_socket() {
        eprintln!("Skipping test_malformed_requests_are_structured_failures: Unix sockets not permitted");
        return;
    }

    let (_temp_dir, socket_path, handle) = setup_test_server().await;
    let mut stream = connect(&socket_path).await;

    // A spec that is not a typed account record fails with a decode error.
    let response = send_raw_request(
        &mut stream,
        "UpdateAccount",
        json!(["Account(1, 'x', 'svc', Password('u', 'p'))"]),
        1,
    )
    .await
    .unwrap();
    assert_eq!(response["error"]["code"], json!(-32602));
    assert!(
        response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("malformed account spec")
    );

    // A line that is not JSON at all gets a parse error, not a dropped
    // connection.
    stream.write_all(b"not json\n").await.unwrap();
    stream.flush().await.unwrap();
    let mut reader = BufReader::new(&mut stream);
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    let response: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(response["error"]["code"], json!(-32700));

    // Unknown methods are rejected and the connection keeps serving.
    let response = send_raw_request(&mut stream, "GetAccounts", json!([{}]), 2)
        .await
        .unwrap();
    assert_eq!(response["error"]["code"], json!(-32601));

    let result = send_rpc_request(&mut stream, "ListAccounts", json!([{}]), 3)
        .await
        .unwrap();
    assert_eq!(result["accounts"].as_array().unwrap().len(), 8);

    handle.stop().await.unwrap();
}
