//! IPC client for communicating with the study timer daemon.
//!
//! This module provides:
//! - Unix Domain Socket client
//! - Request/response handling
//! - Connection retry logic
//! - Timeout handling

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::daemon;
use crate::types::{IpcRequest, IpcResponse, RestoreChoice};

// ============================================================================
// Constants
// ============================================================================

/// Connection timeout in seconds
const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Read/write timeout in seconds
const IO_TIMEOUT_SECS: u64 = 5;

/// Maximum response size in bytes (1MB, history responses grow with use)
const MAX_RESPONSE_SIZE: u64 = 1024 * 1024;

/// Maximum retry attempts
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (base delay, multiplied by attempt number)
const RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// IpcClient
// ============================================================================

/// IPC client for daemon communication.
#[derive(Debug, Clone)]
pub struct IpcClient {
    /// Socket path
    socket_path: PathBuf,
    /// Connection timeout
    timeout: Duration,
}

impl IpcClient {
    /// Creates a client for the daemon of the current data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be resolved.
    pub fn new() -> Result<Self> {
        Ok(Self::with_socket_path(daemon::default_socket_path()?))
    }

    /// Creates a new IPC client with a custom socket path.
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Starts the current session, optionally with a new task label.
    pub async fn start(&self, task: Option<String>) -> Result<IpcResponse> {
        self.execute(&IpcRequest::Start { task }).await
    }

    /// Pauses the running timer.
    pub async fn pause(&self) -> Result<IpcResponse> {
        self.execute(&IpcRequest::Pause).await
    }

    /// Resumes a paused timer.
    pub async fn resume(&self) -> Result<IpcResponse> {
        self.execute(&IpcRequest::Resume).await
    }

    /// Resets the timer, keeping history.
    pub async fn reset(&self) -> Result<IpcResponse> {
        self.execute(&IpcRequest::Reset).await
    }

    /// Sets the task label.
    pub async fn set_task(&self, task: impl Into<String>) -> Result<IpcResponse> {
        self.execute(&IpcRequest::Task { task: task.into() }).await
    }

    /// Completes the current session.
    pub async fn complete(&self) -> Result<IpcResponse> {
        self.execute(&IpcRequest::Complete).await
    }

    /// Queries the current status.
    pub async fn status(&self) -> Result<IpcResponse> {
        self.execute(&IpcRequest::Status).await
    }

    /// Queries the completed session history.
    pub async fn history(&self) -> Result<IpcResponse> {
        self.execute(&IpcRequest::History).await
    }

    /// Answers a pending restore prompt.
    pub async fn restore(&self, choice: RestoreChoice) -> Result<IpcResponse> {
        self.execute(&IpcRequest::Restore { choice }).await
    }

    /// Sends `request` and turns an error response into an `Err`.
    async fn execute(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let response = self.send_request_with_retry(request).await?;
        if response.is_error() {
            anyhow::bail!("{}", response.message);
        }
        Ok(response)
    }

    /// Sends a request to the daemon, retrying transport failures.
    ///
    /// Error responses are returned as-is: the daemon answered, so sending
    /// the same request again would only be rejected again.
    async fn send_request_with_retry(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut attempt = 1;
        loop {
            match self.send_request(request).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < MAX_RETRIES => {
                    tracing::warn!("リクエスト失敗 (試行 {}/{}): {:#}", attempt, MAX_RETRIES, e);
                    let delay = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sends a single request to the daemon.
    async fn send_request(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let io_timeout = Duration::from_secs(IO_TIMEOUT_SECS);

        let mut stream = timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("接続がタイムアウトしました")?
            .context("Daemonに接続できません。'study-timer daemon' を起動してください")?;

        let request_json =
            serde_json::to_vec(request).context("リクエストのシリアライズに失敗しました")?;

        timeout(io_timeout, stream.write_all(&request_json))
            .await
            .context("書き込みがタイムアウトしました")?
            .context("リクエストの送信に失敗しました")?;

        timeout(io_timeout, stream.flush())
            .await
            .context("フラッシュがタイムアウトしました")?
            .context("フラッシュに失敗しました")?;

        // Shutdown write side to signal end of request
        stream
            .shutdown()
            .await
            .context("シャットダウンに失敗しました")?;

        let mut buffer = Vec::new();
        timeout(
            io_timeout,
            (&mut stream).take(MAX_RESPONSE_SIZE).read_to_end(&mut buffer),
        )
        .await
        .context("読み込みがタイムアウトしました")?
        .context("レスポンスの受信に失敗しました")?;

        if buffer.is_empty() {
            anyhow::bail!("Daemonからの応答がありませんでした");
        }

        serde_json::from_slice(&buffer).context("レスポンスのパースに失敗しました")
    }
}

// ============================================================================
// Tests
// ============================================================================
