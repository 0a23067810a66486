//! IPC server for the study timer daemon.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket, one request per connection
//! - Request/response handling for timer commands
//! - Integration with TimerEngine for command execution

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use crate::types::{IpcRequest, IpcResponse, RestoreChoice, ResponseData, TimerState};

use super::timer::{EngineError, TimerEngine};

// ============================================================================
// Constants
// ============================================================================

/// Maximum request size in bytes (4KB)
pub const MAX_REQUEST_SIZE: usize = 4096;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 5;

/// Bytes read per call while assembling a request
const READ_CHUNK_SIZE: usize = 1024;

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(String),

    /// The client closed the connection without sending anything
    #[error("Connection closed by client")]
    EmptyRequest,

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    /// Unix socket listener
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// A leftover socket file from an earlier daemon is removed first.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok(stream)
    }

    /// Serves connections until the task is cancelled.
    ///
    /// Each connection is handled on its own task; a failing connection is
    /// logged and does not stop the loop.
    pub async fn serve(&self, handler: RequestHandler) {
        loop {
            let stream = match self.accept().await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("{:#}", e);
                    continue;
                }
            };

            let handler = handler.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, &handler).await {
                    debug!("Connection failed: {:#}", e);
                }
            });
        }
    }

    /// Receives and deserializes an IPC request from the stream.
    ///
    /// Reads until a complete request has arrived or the client stops
    /// writing, within the read timeout.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, on requests over [`MAX_REQUEST_SIZE`],
    /// or if the bytes are not a valid request.
    pub async fn receive_request(stream: &mut UnixStream) -> Result<IpcRequest> {
        let buffer = match timeout(
            Duration::from_secs(READ_TIMEOUT_SECS),
            read_request_bytes(stream),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(IpcError::Timeout.into()),
        };

        let request: IpcRequest = serde_json::from_slice(&buffer)
            .with_context(|| "Failed to deserialize IPC request")?;

        Ok(request)
    }

    /// Serializes and sends an IPC response to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_response(stream: &mut UnixStream, response: &IpcResponse) -> Result<()> {
        let json = serde_json::to_vec(response).context("Failed to serialize IPC response")?;

        stream
            .write_all(&json)
            .await
            .context("Failed to write response")?;
        stream.flush().await.context("Failed to flush response")?;

        Ok(())
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn read_request_bytes(stream: &mut UnixStream) -> Result<Vec<u8>, IpcError> {
    let mut buffer = Vec::with_capacity(READ_CHUNK_SIZE);
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| IpcError::ReadError(e.to_string()))?;
        if n == 0 {
            break;
        }

        buffer.extend_from_slice(&chunk[..n]);
        if buffer.len() > MAX_REQUEST_SIZE {
            return Err(IpcError::RequestTooLarge);
        }
        if serde_json::from_slice::<serde_json::Value>(&buffer).is_ok() {
            break;
        }
    }

    if buffer.is_empty() {
        return Err(IpcError::EmptyRequest);
    }
    Ok(buffer)
}

/// Reads one request, answers it, and closes the connection.
///
/// A request that cannot be read still gets an error response when the
/// connection allows it.
///
/// # Errors
///
/// Returns an error if the response cannot be written.
pub async fn handle_connection(mut stream: UnixStream, handler: &RequestHandler) -> Result<()> {
    let response = match IpcServer::receive_request(&mut stream).await {
        Ok(request) => {
            debug!("Received request: {:?}", request);
            handler.handle(request).await
        }
        Err(e) => IpcResponse::error(format!("不正なリクエストです: {:#}", e)),
    };

    IpcServer::send_response(&mut stream, &response).await
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Handles IPC requests by dispatching to TimerEngine.
#[derive(Clone)]
pub struct RequestHandler {
    /// Shared reference to the timer engine
    engine: Arc<Mutex<TimerEngine>>,
}

impl RequestHandler {
    /// Creates a new request handler with the given timer engine.
    pub fn new(engine: Arc<Mutex<TimerEngine>>) -> Self {
        Self { engine }
    }

    /// Handles an IPC request and returns the appropriate response.
    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        let mut engine = self.engine.lock().await;

        match request {
            IpcRequest::Start { task } => respond(engine.start(task), "タイマーを開始しました"),
            IpcRequest::Pause => respond(engine.pause(), "タイマーを一時停止しました"),
            IpcRequest::Resume => respond(engine.resume(), "タイマーを再開しました"),
            IpcRequest::Reset => respond(engine.reset(), "タイマーをリセットしました"),
            IpcRequest::Task { task } => respond(engine.set_task(task), "タスクを設定しました"),
            IpcRequest::Complete => respond(engine.complete_session(), "セッションを完了しました"),
            IpcRequest::Status => Self::status(&engine),
            IpcRequest::History => {
                let state = engine.state();
                IpcResponse::success(
                    "",
                    Some(ResponseData::from_timer_state(state).with_sessions(state.sessions.clone())),
                )
            }
            IpcRequest::Restore { choice } => {
                let message = match choice {
                    RestoreChoice::Continue => "前回のタイマー状態を復元しました",
                    RestoreChoice::StartFresh => "前回のタイマー状態を破棄しました",
                };
                respond(engine.resolve_restore(choice), message)
            }
        }
    }

    fn status(engine: &TimerEngine) -> IpcResponse {
        let pending = engine.pending_restore();
        let message = if pending.is_some() {
            "前回のタイマー状態が残っています"
        } else {
            ""
        };

        IpcResponse::success(
            message,
            Some(ResponseData::from_timer_state(engine.state()).with_pending_restore(pending)),
        )
    }
}

fn respond(result: Result<&TimerState, EngineError>, message: &str) -> IpcResponse {
    match result {
        Ok(state) => IpcResponse::success(message, Some(ResponseData::from_timer_state(state))),
        Err(e) => IpcResponse::error(e.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
