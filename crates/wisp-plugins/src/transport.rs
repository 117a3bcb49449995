// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! stdio and HTTP JSON-RPC transports (spec §4.4 "Select transport",
//! §6 "Stdio framing" / "HTTP framing").
//!
//! The stdio request/response matching follows the pending-request-map
//! pattern used for the node control protocol's websocket round-trips: an
//! id is attached to every request, a background reader dispatches each
//! parsed response line to the one-shot channel waiting on that id, and a
//! response that never arrives within the timeout rejects the waiter
//! without touching the subprocess (it may still complete and be
//! discarded).

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use crate::rpc::{Request, Response};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("plugin not running: {0}")]
    NotRunning(String),
    #[error("execution timed out")]
    Timeout,
    #[error("transport I/O error: {0}")]
    Io(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
}

#[async_trait]
pub trait PluginTransport: Send + Sync {
    async fn call(&self, method: &str, params: Value, timeout: Duration) -> Result<Value, TransportError>;
    /// Best-effort close; never errors, since by the time it's called the
    /// caller has already decided to tear the plugin down.
    async fn close(&self);
    fn is_running(&self) -> bool;
}

fn response_to_result(response: Response) -> Result<Value, TransportError> {
    if let Some(err) = response.error {
        return Err(TransportError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    Ok(response.result.unwrap_or(Value::Null))
}

// ─── stdio transport ──────────────────────────────────────────────────────────

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Response>>>>;

pub struct StdioTransport {
    plugin_name: String,
    child: Mutex<Option<Child>>,
    stdin: Mutex<ChildStdin>,
    pending: PendingMap,
    next_id: AtomicU64,
    running: Arc<AtomicBool>,
    reader_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StdioTransport {
    /// Spawns `command_line` via a shell, exactly as the teacher's built-in
    /// shell tool does (`bash -c <command>`, stdin nulled against the
    /// *parent* terminal is not relevant here since stdin is the RPC
    /// channel; `kill_on_drop` still applies).
    pub fn spawn(command_line: &str) -> Result<Self, TransportError> {
        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(command_line);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| TransportError::Io(e.to_string()))?;
        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let running = Arc::new(AtomicBool::new(true));

        let reader_pending = Arc::clone(&pending);
        let reader_running = Arc::clone(&running);
        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Response>(&line) {
                            Ok(response) => {
                                if let Some(id) = response.id {
                                    let mut pending = reader_pending.lock().await;
                                    if let Some(tx) = pending.remove(&id) {
                                        let _ = tx.send(response);
                                    }
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, line = %line, "unparseable plugin stdout line; dropped");
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "plugin stdout read error");
                        break;
                    }
                }
            }
            reader_running.store(false, Ordering::SeqCst);
        });

        // stderr is logs (spec §4.4): drain it to tracing rather than let the
        // pipe fill up and stall the plugin.
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(plugin_stderr = %line);
            }
        });

        Ok(Self {
            plugin_name: String::new(),
            child: Mutex::new(Some(child)),
            stdin: Mutex::new(stdin),
            pending,
            next_id: AtomicU64::new(1),
            running,
            reader_task: Mutex::new(Some(reader_task)),
        })
    }

    pub fn named(mut self, plugin_name: impl Into<String>) -> Self {
        self.plugin_name = plugin_name.into();
        self
    }
}

#[async_trait]
impl PluginTransport for StdioTransport {
    async fn call(&self, method: &str, params: Value, timeout: Duration) -> Result<Value, TransportError> {
        if !self.is_running() {
            return Err(TransportError::NotRunning(self.plugin_name.clone()));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = Request::call(id, method, params);
        let mut line = serde_json::to_string(&request).map_err(|e| TransportError::Io(e.to_string()))?;
        line.push('\n');

        {
            let mut stdin = self.stdin.lock().await;
            if let Err(e) = stdin.write_all(line.as_bytes()).await {
                self.pending.lock().await.remove(&id);
                return Err(TransportError::Io(e.to_string()));
            }
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response_to_result(response),
            Ok(Err(_)) => Err(TransportError::Io("response channel closed".into())),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(TransportError::Timeout)
            }
        }
    }

    async fn close(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.reader_task.lock().await.take() {
            handle.abort();
        }
        if let Some(mut child) = self.child.lock().await.take() {
            terminate_then_kill(&mut child).await;
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Bounded teardown window for a stdio subprocess (spec §4.4 "Lifecycle":
/// "all subprocesses must be terminated within a bounded window (SIGTERM
/// then SIGKILL after 5s)").
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Sends SIGTERM and waits up to [`TERMINATE_GRACE`] for the child to exit
/// on its own; falls back to SIGKILL (`Child::kill`) if it hasn't. On
/// non-unix targets there's no portable SIGTERM, so this just kills.
async fn terminate_then_kill(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: `pid` is a live child pid we own; sending SIGTERM to a
            // process we spawned has no memory-safety implications.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
            if tokio::time::timeout(TERMINATE_GRACE, child.wait())
                .await
                .is_ok()
            {
                return;
            }
        }
    }
    let _ = child.kill().await;
}

// ─── HTTP transport ───────────────────────────────────────────────────────────

pub struct HttpTransport {
    client: reqwest::Client,
    rpc_url: String,
    running: AtomicBool,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        let rpc_url = format!("{}/rpc", base_url.trim_end_matches('/'));
        Self {
            client: reqwest::Client::new(),
            rpc_url,
            running: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl PluginTransport for HttpTransport {
    async fn call(&self, method: &str, params: Value, timeout: Duration) -> Result<Value, TransportError> {
        if !self.is_running() {
            return Err(TransportError::NotRunning(self.rpc_url.clone()));
        }
        // HTTP has no persistent connection id to collide on, so any fixed
        // id is fine — one request per response.
        let request = Request::call(1, method, params);

        let send = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send();
        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let response: Response = response
            .json()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        response_to_result(response)
    }

    async fn close(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// A tiny line-protocol echo "plugin" written as a one-liner python-free
    /// shell script: reads one JSON-RPC line, replies `{"result": params}`
    /// with the same id.
    const ECHO_SCRIPT: &str = r#"
        while IFS= read -r line; do
          id=$(echo "$line" | grep -o '"id":[0-9]*' | cut -d: -f2)
          echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"echoed\":true}}"
        done
    "#;

    #[tokio::test]
    async fn stdio_roundtrip_matches_response_to_request_id() {
        let transport = StdioTransport::spawn(ECHO_SCRIPT).unwrap();
        let result = transport
            .call("health", serde_json::json!({}), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"echoed": true}));
        transport.close().await;
    }

    #[tokio::test]
    async fn stdio_call_after_close_reports_not_running() {
        let transport = StdioTransport::spawn(ECHO_SCRIPT).unwrap().named("demo");
        transport.close().await;
        let err = transport
            .call("health", serde_json::json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotRunning(name) if name == "demo"));
    }

    #[tokio::test]
    async fn stdio_call_times_out_when_subprocess_is_silent() {
        let transport = StdioTransport::spawn("sleep 5").unwrap();
        let err = transport
            .call("health", serde_json::json!({}), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout));
        transport.close().await;
    }

    #[tokio::test]
    async fn close_terminates_a_script_that_traps_sigterm_without_killing() {
        let script = r#"
            trap 'exit 0' TERM
            while IFS= read -r line; do
              id=$(echo "$line" | grep -o '"id":[0-9]*' | cut -d: -f2)
              echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{}}"
            done
        "#;
        let transport = StdioTransport::spawn(script).unwrap();
        let started = std::time::Instant::now();
        transport.close().await;
        // The script exits promptly on SIGTERM, well inside the 5s grace
        // window that would otherwise fall back to SIGKILL.
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn response_to_result_surfaces_rpc_error() {
        let response = Response {
            id: Some(1),
            result: None,
            error: Some(crate::rpc::RpcError {
                code: crate::rpc::ABILITY_NOT_FOUND,
                message: "not found".into(),
                data: None,
            }),
        };
        let err = response_to_result(response).unwrap_err();
        assert!(matches!(err, TransportError::Rpc { code, .. } if code == crate::rpc::ABILITY_NOT_FOUND));
    }
}
