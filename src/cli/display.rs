//! Display utilities for the study timer CLI.
//!
//! This module provides formatted output for:
//! - Success messages
//! - Error messages
//! - Status display and the restore prompt
//! - Session history
//! - The one-line watch indicator

use std::fmt::{self, Write as _};

use chrono::{Local, NaiveDate, TimeZone};

use crate::types::{
    IpcResponse, RestorePreview, RestoreReason, ResponseData, SessionKind, SessionRecord,
};

/// Width of the indicator progress bar, in cells.
const BAR_WIDTH: u32 = 10;

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows a success message for timer start.
    pub fn show_start_success(response: &IpcResponse) {
        println!("* {}", response.message);

        if let Some(data) = &response.data {
            if let Some(session) = data.session {
                println!("  セッション: {}", Self::session_label(session));
            }
            if let Some(task_name) = &data.task_name {
                println!("  タスク: {}", task_name);
            }
            Self::print_remaining(data);
        }
    }

    /// Shows a success message for timer pause.
    pub fn show_pause_success(response: &IpcResponse) {
        println!("|| {}", response.message);
        if let Some(data) = &response.data {
            Self::print_remaining(data);
        }
    }

    /// Shows a success message for timer resume.
    pub fn show_resume_success(response: &IpcResponse) {
        println!("> {}", response.message);
        if let Some(data) = &response.data {
            Self::print_remaining(data);
        }
    }

    /// Shows a success message for timer reset.
    pub fn show_reset_success(response: &IpcResponse) {
        println!("[] {}", response.message);
    }

    /// Shows a success message for a task change.
    pub fn show_task_success(response: &IpcResponse) {
        println!("* {}", response.message);
        match response.data.as_ref().and_then(|d| d.task_name.as_ref()) {
            Some(task_name) => println!("  タスク: {}", task_name),
            None => println!("  タスク: なし"),
        }
    }

    /// Shows a success message for session completion.
    pub fn show_complete_success(response: &IpcResponse) {
        println!("* {}", response.message);
        if let Some(data) = &response.data {
            if let Some(session) = data.session {
                println!("  次のセッション: {}", Self::session_label(session));
            }
            if let Some(count) = data.completed_work_count {
                println!("  完了した作業: {}回", count);
            }
        }
    }

    /// Shows the outcome of a restore answer.
    pub fn show_restore_success(response: &IpcResponse) {
        println!("* {}", response.message);
        if let Some(data) = &response.data {
            Self::print_remaining(data);
        }
    }

    /// Shows the current timer status.
    pub fn show_status(response: &IpcResponse) {
        print!("{}", Self::format_status(response.data.as_ref()));
    }

    /// Shows the completed session history, optionally limited to `day`.
    pub fn show_history(response: &IpcResponse, day: Option<NaiveDate>) {
        let sessions = response
            .data
            .as_ref()
            .and_then(|d| d.sessions.as_deref())
            .unwrap_or_default();
        print!("{}", Self::format_history(sessions, day));
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("エラー: {}", message);
    }

    // ------------------------------------------------------------------------
    // Formatting
    // ------------------------------------------------------------------------

    /// Builds the status report.
    pub fn format_status(data: Option<&ResponseData>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "学習タイマー ステータス");
        let _ = writeln!(out, "─────────────────────────────");

        let Some(data) = data else {
            let _ = writeln!(out, "タイマーは起動していません");
            return out;
        };

        let state = data.state.as_deref().unwrap_or("unknown");
        let _ = writeln!(out, "状態: {}", Self::state_label(state));
        if let Some(session) = data.session {
            let _ = writeln!(out, "セッション: {}", Self::session_label(session));
        }
        if let Some(remaining) = data.remaining_seconds {
            let _ = writeln!(out, "残り時間: {}", Self::format_clock(remaining));
        }
        if let Some(count) = data.completed_work_count {
            let _ = writeln!(out, "完了した作業: {}回", count);
        }
        if let Some(task) = &data.task_name {
            let _ = writeln!(out, "タスク: {}", task);
        }

        if let Some(preview) = &data.pending_restore {
            out.push('\n');
            out.push_str(&Self::format_restore_prompt(preview));
        }
        out
    }

    /// Builds the restore prompt shown while the daemon waits for an answer.
    pub fn format_restore_prompt(preview: &RestorePreview) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "前回のタイマー状態が残っています");
        match (preview.reason, preview.elapsed_seconds) {
            (RestoreReason::WasRunning, Some(elapsed)) => {
                let _ = writeln!(
                    out,
                    "  実行中に終了しました (開始から {} 経過)",
                    Self::format_clock(elapsed)
                );
            }
            (RestoreReason::WasRunning, None) => {
                let _ = writeln!(out, "  実行中に終了しました");
            }
            (RestoreReason::HasProgress, _) => {
                let _ = writeln!(out, "  途中のセッションがあります");
            }
        }
        let _ = writeln!(
            out,
            "  {} 残り {} / 完了した作業 {}回",
            Self::session_label(preview.session),
            Self::format_clock(preview.remaining_seconds),
            preview.completed_work_count
        );
        if let Some(task) = &preview.task_name {
            let _ = writeln!(out, "  タスク: {}", task);
        }
        let _ = writeln!(out, "  続きから: study-timer restore continue");
        let _ = writeln!(out, "  破棄する: study-timer restore fresh");
        out
    }

    /// Builds the history listing in local time. Records keep their
    /// chronological order.
    pub fn format_history(sessions: &[SessionRecord], day: Option<NaiveDate>) -> String {
        Self::format_history_in(sessions, day, &Local)
    }

    /// Builds the history listing with dates and times taken in `tz`.
    pub fn format_history_in<Tz>(
        sessions: &[SessionRecord],
        day: Option<NaiveDate>,
        tz: &Tz,
    ) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let selected: Vec<&SessionRecord> = sessions
            .iter()
            .filter(|record| day.map_or(true, |day| record.completed_on(day, tz)))
            .collect();

        let mut out = String::new();
        if selected.is_empty() {
            let _ = writeln!(out, "完了したセッションはありません");
            return out;
        }

        for record in &selected {
            let completed = record.completed_at.with_timezone(tz);
            let task = if record.task.is_empty() {
                "-"
            } else {
                record.task.as_str()
            };
            let _ = writeln!(
                out,
                "#{:<4} {}  {:<6} {}",
                record.id,
                completed.format("%Y-%m-%d %H:%M"),
                Self::session_label(record.kind),
                task
            );
        }

        let work = selected
            .iter()
            .filter(|record| record.kind == SessionKind::Work)
            .count();
        let _ = writeln!(out, "合計: {}件 (作業 {}件)", selected.len(), work);
        out
    }

    /// Renders the one-line watch indicator, or `None` while the timer is
    /// pristine.
    pub fn render_indicator(data: &ResponseData) -> Option<String> {
        let state = data.state.as_deref()?;
        let remaining = data.remaining_seconds?;
        let count = data.completed_work_count.unwrap_or(0);
        if data.is_pristine() {
            return None;
        }

        let icon = match state {
            "active" => ">",
            "paused" => "||",
            "expired" => "!",
            _ => "[]",
        };
        let session = data.session.map_or("-", Self::session_label);
        let total = data.total_seconds.unwrap_or(remaining);

        let mut line = format!(
            "{} {} {} {} #{}",
            icon,
            session,
            Self::format_clock(remaining),
            Self::progress_bar(remaining, total),
            count
        );
        if let Some(task) = &data.task_name {
            line.push(' ');
            line.push_str(task);
        }
        Some(line)
    }

    /// Formats seconds as `mm:ss`.
    pub fn format_clock(total_seconds: u32) -> String {
        let (minutes, seconds) = Self::format_time(total_seconds);
        format!("{:02}:{:02}", minutes, seconds)
    }

    /// Japanese label of a session kind.
    pub fn session_label(kind: SessionKind) -> &'static str {
        match kind {
            SessionKind::Work => "作業",
            SessionKind::ShortBreak => "短い休憩",
            SessionKind::LongBreak => "長い休憩",
        }
    }

    fn state_label(state: &str) -> &str {
        match state {
            "idle" => "待機中",
            "active" => "実行中",
            "paused" => "一時停止中",
            "expired" => "時間切れ",
            _ => state,
        }
    }

    fn progress_bar(remaining: u32, total: u32) -> String {
        let filled = if total == 0 {
            0
        } else {
            (total.saturating_sub(remaining) * BAR_WIDTH) / total
        };
        let filled = filled.min(BAR_WIDTH) as usize;
        format!(
            "[{}{}]",
            "#".repeat(filled),
            ".".repeat(BAR_WIDTH as usize - filled)
        )
    }

    fn print_remaining(data: &ResponseData) {
        if let Some(remaining) = data.remaining_seconds {
            println!("  残り時間: {}", Self::format_clock(remaining));
        }
    }

    /// Formats remaining seconds as (minutes, seconds).
    fn format_time(total_seconds: u32) -> (u32, u32) {
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        (minutes, seconds)
    }
}

// ============================================================================
// Tests
// ============================================================================
