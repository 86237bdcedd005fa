//! JSON-RPC server implementation with Unix socket support.
//!
//! Requests are newline-delimited JSON-RPC 2.0 documents. Every connection
//! also receives `AccountChanged` notifications (requests without an `id`)
//! pushed whenever a test-control mutation commits.

use super::handlers::{ApiState, OnlineAccountsApiImpl, OnlineAccountsApiServer};
use super::types::{AccountChangedParams, AccountSummary};
use anyhow::{Context, Result};
use credstub_core::AccountChanged;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to a running RPC server
pub struct ServerHandle {
    shutdown: Arc<Mutex<Option<mpsc::Sender<()>>>>,
    join_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

/// Start the JSON-RPC server on a Unix socket.
///
/// # Parameters
///
/// - `socket_path`: Path to the Unix socket file
/// - `state`: API state shared across handlers
///
/// # Returns
///
/// A handle to the running server that can be used to stop it.
pub async fn start_server(socket_path: &Path, state: ApiState) -> Result<ServerHandle> {
    // Remove existing socket if present
    if socket_path.exists() {
        warn!("Removing existing socket at {:?}", socket_path);
        std::fs::remove_file(socket_path)
            .with_context(|| format!("Failed to remove existing socket at {:?}", socket_path))?;
    }

    // Ensure parent directory exists
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create socket directory {:?}", parent))?;
    }

    info!("Starting JSON-RPC server on {:?}", socket_path);

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind Unix socket at {:?}", socket_path))?;

    let api = Arc::new(OnlineAccountsApiImpl::new(state));

    let (tx, mut rx) = mpsc::channel::<()>(1);
    let handle_tx = tx.clone();

    let server_task: JoinHandle<()> = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = rx.recv() => {
                    debug!("Server shutdown signal received");
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let api = api.clone();
                            let changes = api.broker().subscribe();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, api, changes).await {
                                    warn!("Connection handler error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }
    });

    info!("JSON-RPC server started and listening");

    Ok(ServerHandle {
        shutdown: Arc::new(Mutex::new(Some(handle_tx))),
        join_handle: Arc::new(Mutex::new(Some(server_task))),
    })
}

/// Handle a single connection.
///
/// A dedicated writer task serializes responses and pushed notifications
/// onto the socket so the two never interleave mid-line.
async fn handle_connection(
    stream: UnixStream,
    api: Arc<OnlineAccountsApiImpl>,
    changes: broadcast::Receiver<AccountChanged>,
) -> Result<()> {
    let (reader, writer) = stream.into_split();

    let (outbound, outbound_rx) = mpsc::channel::<String>(32);
    let writer_task = tokio::spawn(write_lines(writer, outbound_rx));
    let notifier_task = tokio::spawn(forward_changes(changes, outbound.clone()));

    let result = serve_requests(reader, &api, &outbound).await;

    notifier_task.abort();
    drop(outbound);
    let _ = writer_task.await;

    result
}

/// Read newline-delimited requests and queue their responses.
async fn serve_requests(
    reader: OwnedReadHalf,
    api: &Arc<OnlineAccountsApiImpl>,
    outbound: &mpsc::Sender<String>,
) -> Result<()> {
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;

        if n == 0 {
            // Connection closed
            break;
        }

        debug!("Received request: {}", line.trim());

        let request: serde_json::Value = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                let error_response = serde_json::json!({
                    "jsonrpc": "2.0",
                    "error": {
                        "code": -32700,
                        "message": format!("Parse error: {}", e)
                    },
                    "id": null
                });
                if outbound.send(error_response.to_string()).await.is_err() {
                    break;
                }
                continue;
            }
        };

        let response = process_request(request, api).await;
        if outbound.send(response.to_string()).await.is_err() {
            break;
        }
    }

    Ok(())
}

/// Drain queued lines onto the socket.
async fn write_lines(mut writer: OwnedWriteHalf, mut outbound: mpsc::Receiver<String>) {
    while let Some(line) = outbound.recv().await {
        if let Err(e) = write_line(&mut writer, &line).await {
            warn!("Failed to write to client: {}", e);
            break;
        }
    }
}

async fn write_line(writer: &mut OwnedWriteHalf, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Forward broker change notifications to one connection.
async fn forward_changes(
    mut changes: broadcast::Receiver<AccountChanged>,
    outbound: mpsc::Sender<String>,
) {
    loop {
        match changes.recv().await {
            Ok(change) => {
                debug!("Pushing AccountChanged for {}", change.service);
                if outbound.send(notification(&change).to_string()).await.is_err() {
                    // Client gone
                    break;
                }
            }
            Err(RecvError::Lagged(missed)) => {
                warn!("Subscriber lagged; {} notifications dropped", missed);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Render an `AccountChanged` broadcast as a JSON-RPC notification.
fn notification(change: &AccountChanged) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": "AccountChanged",
        "params": AccountChangedParams(
            change.service.to_string(),
            AccountSummary(change.account_id, change.info.clone()),
        ),
    })
}

/// Process a JSON-RPC request
async fn process_request(
    request: serde_json::Value,
    api: &Arc<OnlineAccountsApiImpl>,
) -> serde_json::Value {
    use jsonrpsee::types::ErrorObject;

    let id = request.get("id").cloned().unwrap_or(serde_json::Value::Null);
    let method = match request.get("method").and_then(|m| m.as_str()) {
        Some(m) => m,
        None => {
            return serde_json::json!({
                "jsonrpc": "2.0",
                "error": {
                    "code": -32600,
                    "message": "Invalid Request: missing method"
                },
                "id": id
            });
        }
    };

    let params = request
        .get("params")
        .and_then(|p| p.as_array().cloned())
        .unwrap_or_default();

    // Call the appropriate method
    let result = match method {
        "ListAccounts" => {
            let filters = params
                .first()
                .and_then(|v| v.as_object())
                .cloned()
                .unwrap_or_default();
            match api.list_accounts(filters).await {
                Ok(resp) => Ok(serde_json::to_value(resp).unwrap()),
                Err(e) => Err(e),
            }
        }
        "Authenticate" => {
            let account_id = params
                .first()
                .and_then(|v| v.as_u64())
                .and_then(|v| u32::try_from(v).ok());
            let service = params.get(1).and_then(|v| v.as_str());
            let interactive = params.get(2).and_then(|v| v.as_bool());
            let invalidate = params.get(3).and_then(|v| v.as_bool());
            if let (Some(account_id), Some(service), Some(interactive), Some(invalidate)) =
                (account_id, service, interactive, invalidate)
            {
                let parameters = params
                    .get(4)
                    .and_then(|v| v.as_object())
                    .cloned()
                    .unwrap_or_default();
                match api
                    .authenticate(account_id, service.to_string(), interactive, invalidate, parameters)
                    .await
                {
                    Ok(resp) => Ok(serde_json::to_value(resp).unwrap()),
                    Err(e) => Err(e),
                }
            } else {
                Err(ErrorObject::owned(-32602, "Invalid params", None::<()>))
            }
        }
        "RequestAccess" => {
            if let Some(service) = params.first().and_then(|v| v.as_str()) {
                let parameters = params
                    .get(1)
                    .and_then(|v| v.as_object())
                    .cloned()
                    .unwrap_or_default();
                match api.request_access(service.to_string(), parameters).await {
                    Ok(resp) => Ok(serde_json::to_value(resp).unwrap()),
                    Err(e) => Err(e),
                }
            } else {
                Err(ErrorObject::owned(-32602, "Invalid params", None::<()>))
            }
        }
        "UpdateAccount" => {
            if let Some(spec) = params.first().and_then(|v| v.as_str()) {
                match api.update_account(spec.to_string()).await {
                    Ok(()) => Ok(serde_json::Value::Null),
                    Err(e) => Err(e),
                }
            } else {
                Err(ErrorObject::owned(-32602, "Invalid params", None::<()>))
            }
        }
        "RemoveAccount" => {
            let account_id = params
                .first()
                .and_then(|v| v.as_u64())
                .and_then(|v| u32::try_from(v).ok());
            let service = params.get(1).and_then(|v| v.as_str());
            if let (Some(account_id), Some(service)) = (account_id, service) {
                match api.remove_account(account_id, service.to_string()).await {
                    Ok(()) => Ok(serde_json::Value::Null),
                    Err(e) => Err(e),
                }
            } else {
                Err(ErrorObject::owned(-32602, "Invalid params", None::<()>))
            }
        }
        _ => Err(ErrorObject::owned(-32601, "Method not found", None::<()>)),
    };

    match result {
        Ok(value) => serde_json::json!({
            "jsonrpc": "2.0",
            "result": value,
            "id": id
        }),
        Err(error) => {
            let mut body = serde_json::json!({
                "code": error.code(),
                "message": error.message(),
            });
            if let Some(data) = error.data() {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(data.get()) {
                    body["data"] = value;
                }
            }
            serde_json::json!({
                "jsonrpc": "2.0",
                "error": body,
                "id": id
            })
        }
    }
}

impl ServerHandle {
    /// Stop the server
    pub async fn stop(&self) -> Result<()> {
        if let Some(tx) = self.shutdown.lock().await.take() {
            let _ = tx.send(()).await;
        }

        if let Some(handle) = self.join_handle.lock().await.take() {
            // If the task panicked, surface the error
            handle.await?;
        }

        Ok(())
    }
}
