//! Staleness window for cached snapshots.

use chrono::{DateTime, Duration, Utc};

/// Maximum tolerated age of a snapshot before a refresh becomes mandatory.
///
/// The comparison is strict: a snapshot exactly `window` old is still
/// fresh, one a moment older is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessWindow {
    window: Duration,
}

impl StalenessWindow {
    /// Default maximum cache age in days.
    pub const DEFAULT_DAYS: i64 = 3;

    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// A window of `days` days, saturating at the largest representable span.
    pub fn days(days: i64) -> Self {
        let window = Duration::try_days(days).unwrap_or(if days < 0 {
            Duration::MIN
        } else {
            Duration::MAX
        });
        Self::new(window)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Age of a snapshot refreshed at `refreshed_at`, clamped at zero.
    pub fn age(refreshed_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        (now - refreshed_at).max(Duration::zero())
    }

    /// True iff `now - refreshed_at > window`.
    pub fn is_exceeded(&self, refreshed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - refreshed_at > self.window
    }
}

impl Default for StalenessWindow {
    fn default() -> Self {
        Self::days(Self::DEFAULT_DAYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_three_days() {
        assert_eq!(StalenessWindow::default().window(), Duration::days(3));
    }

    #[test]
    fn test_four_days_old_is_stale() {
        let now = Utc::now();
        assert!(StalenessWindow::default().is_exceeded(now - Duration::days(4), now));
    }

    #[test]
    fn test_two_days_old_is_fresh() {
        let now = Utc::now();
        assert!(!StalenessWindow::default().is_exceeded(now - Duration::days(2), now));
    }

    #[test]
    fn test_boundary_is_strict() {
        let now = Utc::now();
        let window = StalenessWindow::default();
        assert!(!window.is_exceeded(now - Duration::days(3), now));
        assert!(window.is_exceeded(now - Duration::days(3) - Duration::milliseconds(1), now));
    }

    #[test]
    fn test_huge_day_count_saturates() {
        let now = Utc::now();
        let window = StalenessWindow::days(i64::MAX);
        assert_eq!(window.window(), Duration::MAX);
        assert!(!window.is_exceeded(now - Duration::days(36_500), now));
    }

    #[test]
    fn test_age_clamps_future_timestamps() {
        let now = Utc::now();
        assert_eq!(StalenessWindow::age(now + Duration::hours(1), now), Duration::zero());
        assert_eq!(StalenessWindow::age(now - Duration::hours(1), now), Duration::hours(1));
    }
}
