use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{AnswerRecord, UserProfile, WeakSpot};

/// Audience selector for broadcast fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudienceFilter {
    Whitelisted,
    NonWhitelisted,
    ActiveWithinDays(i64),
}

impl AudienceFilter {
    /// Parse the admin-facing selector: `whitelist`, `non_whitelist`,
    /// `active_<days>`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "whitelist" => Some(AudienceFilter::Whitelisted),
            "non_whitelist" => Some(AudienceFilter::NonWhitelisted),
            _ => raw
                .strip_prefix("active_")
                .and_then(|days| days.parse::<i64>().ok())
                .filter(|days| *days > 0)
                .map(AudienceFilter::ActiveWithinDays),
        }
    }
}

/// Persistence gateway. Every call is complete-or-fail; the core never
/// spans a transaction across calls. Each update is atomic at the row level,
/// which is enough because no cross-user invariant exists.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch the profile, creating it on first contact.
    async fn get_or_create_user(
        &self,
        user_id: i64,
        username: &str,
        first_name: &str,
    ) -> Result<UserProfile>;

    async fn get_user(&self, user_id: i64) -> Result<Option<UserProfile>>;

    /// Apply one resolution to the cumulative counters. Correct bumps the
    /// streak (and the best streak when beaten); anything else zeroes it.
    /// `correct + wrong == total` holds after every call.
    async fn update_stats(&self, user_id: i64, correct: bool) -> Result<()>;

    async fn append_answer(&self, record: &AnswerRecord) -> Result<()>;

    /// Bump the per-day answered-question counter.
    async fn bump_activity(&self, user_id: i64, date: NaiveDate) -> Result<()>;

    async fn activity_window(
        &self,
        user_id: i64,
        days: i64,
    ) -> Result<Vec<(NaiveDate, i64)>>;

    /// Upsert a weak spot: error count +1, last-error refreshed. Counts only
    /// ever grow.
    async fn record_weak_spot(&self, user_id: i64, a: i64, b: i64) -> Result<()>;

    /// Top weak spots by error count desc, last-error desc.
    async fn top_weak_spots(&self, user_id: i64, limit: i64) -> Result<Vec<WeakSpot>>;

    async fn set_custom_name(&self, user_id: i64, name: &str) -> Result<()>;

    async fn set_reminder_enabled(&self, user_id: i64, enabled: bool) -> Result<()>;

    async fn set_whitelisted(&self, user_id: i64, whitelisted: bool) -> Result<()>;

    async fn whitelisted_users(&self) -> Result<Vec<UserProfile>>;

    /// Top users by correct answers desc, best streak desc.
    async fn top_leaderboard(&self, limit: i64) -> Result<Vec<UserProfile>>;

    /// Users that opted in to reminders (activity filtering happens in the
    /// scheduler, which owns the inactivity rule).
    async fn reminder_candidates(&self) -> Result<Vec<UserProfile>>;

    async fn audience(&self, filter: AudienceFilter) -> Result<Vec<i64>>;

    /// Whether resolution events for this user are mirrored to the admin.
    /// Defaults to enabled when no row exists.
    async fn admin_notif_enabled(&self, user_id: i64) -> Result<bool>;

    async fn set_admin_notif(&self, user_id: i64, enabled: bool) -> Result<()>;

    /// Liveness probe for the health endpoint.
    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audience_filter_parses_known_selectors() {
        assert_eq!(
            AudienceFilter::parse("whitelist"),
            Some(AudienceFilter::Whitelisted)
        );
        assert_eq!(
            AudienceFilter::parse("non_whitelist"),
            Some(AudienceFilter::NonWhitelisted)
        );
        assert_eq!(
            AudienceFilter::parse("active_7"),
            Some(AudienceFilter::ActiveWithinDays(7))
        );
    }

    #[test]
    fn audience_filter_rejects_junk() {
        assert_eq!(AudienceFilter::parse("active_0"), None);
        assert_eq!(AudienceFilter::parse("active_x"), None);
        assert_eq!(AudienceFilter::parse("everyone"), None);
    }
}
