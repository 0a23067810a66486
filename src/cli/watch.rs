//! Live one-line countdown indicator.
//!
//! Polls the daemon once per second and redraws the line in place. The line
//! is blank while the timer is pristine.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::{interval, MissedTickBehavior};

use crate::cli::client::IpcClient;
use crate::cli::display::Display;
use crate::types::ResponseData;

/// Redraw period.
const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// ANSI sequence: carriage return, then clear the whole line.
const CLEAR_LINE: &str = "\r\x1b[2K";

// ============================================================================
// Indicator
// ============================================================================

/// Tracks the last drawn frame so unchanged frames are not redrawn.
#[derive(Debug, Default)]
pub struct Indicator {
    last: Option<String>,
}

impl Indicator {
    /// Creates an indicator that has drawn nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the frame to draw for `data`, or `None` if it is unchanged.
    ///
    /// An empty frame hides the indicator.
    pub fn next_frame(&mut self, data: Option<&ResponseData>) -> Option<String> {
        let frame = data.and_then(Display::render_indicator).unwrap_or_default();
        if self.last.as_deref() == Some(frame.as_str()) {
            return None;
        }
        self.last = Some(frame.clone());
        Some(frame)
    }
}

// ============================================================================
// Watch Loop
// ============================================================================

/// Redraws the indicator until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the daemon stops answering or stdout fails.
pub async fn run_watch(client: &IpcClient) -> Result<()> {
    let mut ticker = interval(REFRESH_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut indicator = Indicator::new();
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let response = client.status().await?;
                if let Some(frame) = indicator.next_frame(response.data.as_ref()) {
                    write!(stdout, "{}{}", CLEAR_LINE, frame).context("表示に失敗しました")?;
                    stdout.flush().context("表示に失敗しました")?;
                }
            }
            signal = &mut shutdown => {
                signal.context("Ctrl-Cの待機に失敗しました")?;
                writeln!(stdout).context("表示に失敗しました")?;
                return Ok(());
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
