//! Elapsed-time reconciliation.
//!
//! While a session runs, its `started_at` anchor is the source of truth:
//! the remaining time is `duration - (now - started_at)`. Ticks only smooth
//! the display between reads of the wall clock, and they stop entirely while
//! the daemon is down, so every place that needs an accurate remaining time
//! goes through these helpers.

use chrono::{DateTime, Duration, Utc};

use crate::types::SessionKind;

/// Whole seconds between `started_at` and `now`, floored.
///
/// An anchor in the future (clock moved backwards) counts as zero.
pub fn elapsed_secs(started_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let millis = (now - started_at).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    u32::try_from(millis / 1000).unwrap_or(u32::MAX)
}

/// Remaining seconds of a `kind` session anchored at `started_at`.
pub fn remaining_from_anchor(
    kind: SessionKind,
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> u32 {
    kind.duration_secs().saturating_sub(elapsed_secs(started_at, now))
}

/// Anchor that makes `time_left` consistent with the wall clock at `now`.
///
/// `started_at = now - (duration - time_left)`
pub fn resume_anchor(kind: SessionKind, time_left: u32, now: DateTime<Utc>) -> DateTime<Utc> {
    let consumed = kind.duration_secs().saturating_sub(time_left);
    now - Duration::seconds(i64::from(consumed))
}

/// Remaining time of a running session, never above the last known value.
///
/// A tick-driven `time_left` can lag the wall clock (missed ticks) but should
/// never be ahead of it, so the smaller of the two wins.
pub fn reconcile_running(
    kind: SessionKind,
    time_left: u32,
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> u32 {
    time_left.min(remaining_from_anchor(kind, started_at, now))
}

/// When a session anchored at `started_at` runs out.
pub fn expiry_instant(kind: SessionKind, started_at: DateTime<Utc>) -> DateTime<Utc> {
    started_at + Duration::seconds(i64::from(kind.duration_secs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_elapsed_secs_floors() {
        let now = t0() + Duration::milliseconds(10_999);
        assert_eq!(elapsed_secs(t0(), now), 10);
    }

    #[test]
    fn test_elapsed_secs_future_anchor_is_zero() {
        let now = t0() - Duration::seconds(30);
        assert_eq!(elapsed_secs(t0(), now), 0);
    }

    #[test]
    fn test_remaining_from_anchor() {
        let now = t0() + Duration::seconds(100);
        assert_eq!(remaining_from_anchor(SessionKind::Work, t0(), now), 1400);

        let now = t0() + Duration::seconds(2000);
        assert_eq!(remaining_from_anchor(SessionKind::Work, t0(), now), 0);
    }

    #[test]
    fn test_resume_anchor_keeps_time_left() {
        let now = t0();
        let anchor = resume_anchor(SessionKind::Work, 1490, now);

        assert_eq!(anchor, now - Duration::seconds(10));
        assert_eq!(remaining_from_anchor(SessionKind::Work, anchor, now), 1490);
    }

    #[test]
    fn test_reconcile_running_catches_up_missed_ticks() {
        // Ticks only brought it to 1495 but five minutes actually passed.
        let now = t0() + Duration::seconds(300);
        assert_eq!(reconcile_running(SessionKind::Work, 1495, t0(), now), 1200);
    }

    #[test]
    fn test_reconcile_running_never_increases() {
        let now = t0() + Duration::seconds(3);
        assert_eq!(reconcile_running(SessionKind::Work, 1490, t0(), now), 1490);
    }

    #[test]
    fn test_expiry_instant() {
        assert_eq!(
            expiry_instant(SessionKind::ShortBreak, t0()),
            t0() + Duration::seconds(300)
        );
    }
}
