//! Integration tests for Daemon-CLI IPC communication.
//!
//! These tests run the real IPC server and request handler on a temporary
//! socket and drive them through the CLI client:
//! - Timer start / pause / status over IPC
//! - Rejected commands and connection errors
//! - The restore prompt after a restart
//! - History queries

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use tempfile::TempDir;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use study_timer::cli::client::IpcClient;
use study_timer::daemon::ipc::{IpcServer, RequestHandler};
use study_timer::daemon::snapshot;
use study_timer::daemon::timer::{TimerEngine, TimerEvent};
use study_timer::daemon::{ManualClock, MemoryStorage, SnapshotStorage};
use study_timer::types::{RestoreChoice, RestoreReason, SessionKind, TimerState};

// ============================================================================
// Test Helpers
// ============================================================================

/// A daemon served on a temporary socket, with a hand-driven clock.
struct TestDaemon {
    client: IpcClient,
    clock: Arc<ManualClock>,
    storage: Arc<MemoryStorage>,
    engine: Arc<Mutex<TimerEngine>>,
    server_task: JoinHandle<()>,
    _ticks: mpsc::UnboundedReceiver<u64>,
    _events: mpsc::UnboundedReceiver<TimerEvent>,
    _dir: TempDir,
}

impl TestDaemon {
    /// Starts a daemon over `storage`, running the startup restore first.
    fn start(storage: Arc<MemoryStorage>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let socket_path: PathBuf = dir.path().join("integration_test.sock");

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 9, 1, 9, 0, 0).unwrap(),
        ));
        let (event_tx, events) = mpsc::unbounded_channel();
        let (tick_tx, ticks) = mpsc::unbounded_channel();

        let mut engine = TimerEngine::new(storage.clone(), clock.clone(), event_tx, tick_tx);
        engine.restore_on_startup();
        let engine = Arc::new(Mutex::new(engine));

        let server = IpcServer::new(&socket_path).unwrap();
        let handler = RequestHandler::new(engine.clone());
        let server_task = tokio::spawn(async move { server.serve(handler).await });

        Self {
            client: IpcClient::with_socket_path(socket_path),
            clock,
            storage,
            engine,
            server_task,
            _ticks: ticks,
            _events: events,
            _dir: dir,
        }
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        self.server_task.abort();
    }
}

/// Stored snapshot of a run that began `secs_ago` seconds before the daemon clock.
fn running_snapshot(secs_ago: i64) -> String {
    let started = Utc.with_ymd_and_hms(2026, 9, 1, 9, 0, 0).unwrap() - ChronoDuration::seconds(secs_ago);
    let state = TimerState {
        running: true,
        time_left: 1500,
        current_task: "Essay".to_string(),
        started_at: Some(started),
        active_task: Some("Essay".to_string()),
        ..TimerState::default()
    };
    snapshot::encode(&state).unwrap()
}

// ============================================================================
// Timer Control via IPC
// ============================================================================

/// タイマー開始（IPC経由）
#[tokio::test]
async fn test_timer_start_via_ipc() {
    let daemon = TestDaemon::start(Arc::new(MemoryStorage::new()));

    let response = daemon
        .client
        .start(Some("Integration Test Task".to_string()))
        .await
        .expect("start should succeed");

    assert_eq!(response.status, "success");
    assert_eq!(response.message, "タイマーを開始しました");

    let data = response.data.expect("Response should contain data");
    assert_eq!(data.state, Some("active".to_string()));
    assert_eq!(data.session, Some(SessionKind::Work));
    assert_eq!(data.remaining_seconds, Some(25 * 60));
    assert_eq!(data.task_name, Some("Integration Test Task".to_string()));

    assert!(daemon.engine.lock().await.state().running);
    assert!(daemon.storage.save_count() >= 1);
}

/// 一時停止とステータス取得（IPC経由）
#[tokio::test]
async fn test_pause_and_status_via_ipc() {
    let daemon = TestDaemon::start(Arc::new(MemoryStorage::new()));

    daemon.client.start(Some("Algebra".to_string())).await.unwrap();
    daemon.clock.advance_secs(10);

    let response = daemon.client.pause().await.unwrap();
    assert_eq!(response.message, "タイマーを一時停止しました");
    assert_eq!(response.data.unwrap().remaining_seconds, Some(1490));

    let status = daemon.client.status().await.unwrap();
    let data = status.data.unwrap();
    assert_eq!(data.state, Some("paused".to_string()));
    assert_eq!(data.remaining_seconds, Some(1490));
    assert_eq!(data.total_seconds, Some(1500));
    assert!(data.pending_restore.is_none());

    daemon.clock.advance_secs(60);
    let response = daemon.client.resume().await.unwrap();
    assert_eq!(response.data.unwrap().remaining_seconds, Some(1490));
}

/// 不正な操作はエラーとして返り、状態は変わらない
#[tokio::test]
async fn test_rejected_command_via_ipc() {
    let daemon = TestDaemon::start(Arc::new(MemoryStorage::new()));

    let result = daemon.client.pause().await;
    let message = result.unwrap_err().to_string();
    assert!(message.contains("実行されていません"), "got: {}", message);

    let result = daemon.client.start(None).await;
    let message = result.unwrap_err().to_string();
    assert!(message.contains("タスク名"), "got: {}", message);

    assert_eq!(*daemon.engine.lock().await.state(), TimerState::default());
}

/// Daemon未起動時の接続エラー
#[tokio::test]
async fn test_connection_error_without_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let client = IpcClient::with_socket_path(dir.path().join("missing.sock"));

    let result = client.status().await;
    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("Daemonに接続できません"), "got: {}", message);
}

// ============================================================================
// Restore Prompt via IPC
// ============================================================================

/// 実行中に終了した状態は復元確認が必要になる
#[tokio::test]
async fn test_restore_prompt_continue_via_ipc() {
    let storage = Arc::new(MemoryStorage::with_contents(running_snapshot(100)));
    let daemon = TestDaemon::start(storage);

    let status = daemon.client.status().await.unwrap();
    assert_eq!(status.message, "前回のタイマー状態が残っています");
    let preview = status.data.unwrap().pending_restore.expect("prompt open");
    assert_eq!(preview.reason, RestoreReason::WasRunning);
    assert_eq!(preview.remaining_seconds, 1400);
    assert_eq!(preview.elapsed_seconds, Some(100));
    assert_eq!(preview.task_name, Some("Essay".to_string()));

    let blocked = daemon.client.pause().await;
    assert!(blocked.unwrap_err().to_string().contains("restore continue"));

    let response = daemon.client.restore(RestoreChoice::Continue).await.unwrap();
    assert_eq!(response.message, "前回のタイマー状態を復元しました");
    let data = response.data.unwrap();
    assert_eq!(data.state, Some("paused".to_string()));
    assert_eq!(data.remaining_seconds, Some(1400));

    let status = daemon.client.status().await.unwrap();
    assert!(status.data.unwrap().pending_restore.is_none());

    let response = daemon.client.resume().await.unwrap();
    assert_eq!(response.data.unwrap().state, Some("active".to_string()));
}

/// 破棄を選ぶと初期状態に戻り、保存データも消える
#[tokio::test]
async fn test_restore_prompt_fresh_via_ipc() {
    let storage = Arc::new(MemoryStorage::with_contents(running_snapshot(100)));
    let daemon = TestDaemon::start(storage);

    let response = daemon
        .client
        .restore(RestoreChoice::StartFresh)
        .await
        .unwrap();
    assert_eq!(response.message, "前回のタイマー状態を破棄しました");

    let data = response.data.unwrap();
    assert_eq!(data.state, Some("idle".to_string()));
    assert_eq!(data.remaining_seconds, Some(1500));
    assert!(daemon.storage.load().unwrap().is_none());

    let again = daemon.client.restore(RestoreChoice::Continue).await;
    assert!(again.unwrap_err().to_string().contains("復元待ち"));
}

// ============================================================================
// History via IPC
// ============================================================================

/// 完了したセッションが履歴に残る
#[tokio::test]
async fn test_history_after_complete_via_ipc() {
    let daemon = TestDaemon::start(Arc::new(MemoryStorage::new()));

    daemon.client.start(Some("Algebra".to_string())).await.unwrap();
    daemon.clock.advance_secs(300);
    let response = daemon.client.complete().await.unwrap();
    assert_eq!(response.message, "セッションを完了しました");
    let data = response.data.unwrap();
    assert_eq!(data.session, Some(SessionKind::ShortBreak));
    assert_eq!(data.completed_work_count, Some(1));

    daemon.client.set_task("Essay").await.unwrap();
    daemon.client.reset().await.unwrap();

    let history = daemon.client.history().await.unwrap();
    let sessions = history.data.unwrap().sessions.expect("history has sessions");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, 1);
    assert_eq!(sessions[0].task, "Algebra");
    assert_eq!(sessions[0].kind, SessionKind::Work);
    assert_eq!(
        sessions[0].completed_at,
        Utc.with_ymd_and_hms(2026, 9, 1, 9, 5, 0).unwrap()
    );
}
