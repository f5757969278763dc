use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::{AnswerRecord, UserProfile, WeakSpot};

use super::store::{AudienceFilter, Store};

/// In-process persistence gateway. Backs the integration tests and local
/// development without a MongoDB instance; implements the exact same
/// contract as `MongoStore`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<i64, UserProfile>,
    history: Vec<AnswerRecord>,
    activity: HashMap<(i64, NaiveDate), i64>,
    weak_spots: HashMap<(i64, i64, i64), (i64, DateTime<Utc>)>,
    admin_notif: HashMap<i64, bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the answer history, newest last.
    pub fn history(&self) -> Vec<AnswerRecord> {
        self.inner.lock().unwrap().history.clone()
    }

    pub fn history_len(&self) -> usize {
        self.inner.lock().unwrap().history.len()
    }

    /// Backdate a user's last activity; used to exercise the reminder sweep.
    pub fn set_last_activity(&self, user_id: i64, at: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.last_activity = at;
        }
    }

    /// Seed a weak spot with a given error count and recency.
    pub fn seed_weak_spot(&self, user_id: i64, a: i64, b: i64, count: i64, at: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        inner.weak_spots.insert((user_id, a, b), (count, at));
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_or_create_user(
        &self,
        user_id: i64,
        username: &str,
        first_name: &str,
    ) -> Result<UserProfile> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner
            .users
            .entry(user_id)
            .or_insert_with(|| UserProfile::new(user_id, username, first_name));
        Ok(user.clone())
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<UserProfile>> {
        Ok(self.inner.lock().unwrap().users.get(&user_id).cloned())
    }

    async fn update_stats(&self, user_id: i64, correct: bool) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.total_questions += 1;
            if correct {
                user.correct_answers += 1;
                user.current_streak += 1;
                user.best_streak = user.best_streak.max(user.current_streak);
            } else {
                user.wrong_answers += 1;
                user.current_streak = 0;
            }
            user.last_activity = Utc::now();
        }
        Ok(())
    }

    async fn append_answer(&self, record: &AnswerRecord) -> Result<()> {
        self.inner.lock().unwrap().history.push(record.clone());
        Ok(())
    }

    async fn bump_activity(&self, user_id: i64, date: NaiveDate) -> Result<()> {
        *self
            .inner
            .lock()
            .unwrap()
            .activity
            .entry((user_id, date))
            .or_insert(0) += 1;
        Ok(())
    }

    async fn activity_window(
        &self,
        user_id: i64,
        days: i64,
    ) -> Result<Vec<(NaiveDate, i64)>> {
        let start = (Utc::now() - Duration::days(days)).date_naive();
        let inner = self.inner.lock().unwrap();
        let mut entries: Vec<(NaiveDate, i64)> = inner
            .activity
            .iter()
            .filter(|((uid, date), _)| *uid == user_id && *date >= start)
            .map(|((_, date), count)| (*date, *count))
            .collect();
        entries.sort_by_key(|(date, _)| *date);
        Ok(entries)
    }

    async fn record_weak_spot(&self, user_id: i64, a: i64, b: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .weak_spots
            .entry((user_id, a, b))
            .or_insert((0, Utc::now()));
        entry.0 += 1;
        entry.1 = Utc::now();
        Ok(())
    }

    async fn top_weak_spots(&self, user_id: i64, limit: i64) -> Result<Vec<WeakSpot>> {
        let inner = self.inner.lock().unwrap();
        let mut spots: Vec<WeakSpot> = inner
            .weak_spots
            .iter()
            .filter(|((uid, _, _), _)| *uid == user_id)
            .map(|((_, a, b), (count, at))| WeakSpot {
                user_id,
                number1: *a,
                number2: *b,
                error_count: *count,
                last_error: *at,
            })
            .collect();
        spots.sort_by(|x, y| {
            y.error_count
                .cmp(&x.error_count)
                .then(y.last_error.cmp(&x.last_error))
        });
        spots.truncate(limit.max(0) as usize);
        Ok(spots)
    }

    async fn set_custom_name(&self, user_id: i64, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.custom_name = Some(name.to_string());
        }
        Ok(())
    }

    async fn set_reminder_enabled(&self, user_id: i64, enabled: bool) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.reminder_enabled = enabled;
        }
        Ok(())
    }

    async fn set_whitelisted(&self, user_id: i64, whitelisted: bool) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.is_whitelisted = whitelisted;
        }
        Ok(())
    }

    async fn whitelisted_users(&self) -> Result<Vec<UserProfile>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .values()
            .filter(|user| user.is_whitelisted)
            .cloned()
            .collect())
    }

    async fn top_leaderboard(&self, limit: i64) -> Result<Vec<UserProfile>> {
        let inner = self.inner.lock().unwrap();
        let mut users: Vec<UserProfile> = inner
            .users
            .values()
            .filter(|user| user.total_questions > 0)
            .cloned()
            .collect();
        users.sort_by(|x, y| {
            y.correct_answers
                .cmp(&x.correct_answers)
                .then(y.best_streak.cmp(&x.best_streak))
        });
        users.truncate(limit.max(0) as usize);
        Ok(users)
    }

    async fn reminder_candidates(&self) -> Result<Vec<UserProfile>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .values()
            .filter(|user| user.reminder_enabled)
            .cloned()
            .collect())
    }

    async fn audience(&self, filter: AudienceFilter) -> Result<Vec<i64>> {
        let inner = self.inner.lock().unwrap();
        let ids = inner
            .users
            .values()
            .filter(|user| match filter {
                AudienceFilter::Whitelisted => user.is_whitelisted,
                AudienceFilter::NonWhitelisted => !user.is_whitelisted,
                AudienceFilter::ActiveWithinDays(days) => {
                    user.last_activity >= Utc::now() - Duration::days(days)
                }
            })
            .map(|user| user.user_id)
            .collect();
        Ok(ids)
    }

    async fn admin_notif_enabled(&self, user_id: i64) -> Result<bool> {
        Ok(*self
            .inner
            .lock()
            .unwrap()
            .admin_notif
            .get(&user_id)
            .unwrap_or(&true))
    }

    async fn set_admin_notif(&self, user_id: i64, enabled: bool) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .admin_notif
            .insert(user_id, enabled);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn streak_invariant_holds() {
        let store = MemoryStore::new();
        store.get_or_create_user(1, "u", "U").await.unwrap();

        store.update_stats(1, true).await.unwrap();
        store.update_stats(1, true).await.unwrap();
        let user = store.get_user(1).await.unwrap().unwrap();
        assert_eq!(user.current_streak, 2);
        assert_eq!(user.best_streak, 2);
        assert_eq!(user.correct_answers + user.wrong_answers, user.total_questions);

        store.update_stats(1, false).await.unwrap();
        let user = store.get_user(1).await.unwrap().unwrap();
        assert_eq!(user.current_streak, 0);
        assert_eq!(user.best_streak, 2);
        assert_eq!(user.correct_answers + user.wrong_answers, user.total_questions);
    }

    #[tokio::test]
    async fn weak_spots_rank_by_count_then_recency() {
        let store = MemoryStore::new();
        for _ in 0..3 {
            store.record_weak_spot(1, 6, 7).await.unwrap();
        }
        store.record_weak_spot(1, 8, 9).await.unwrap();

        let top = store.top_weak_spots(1, 5).await.unwrap();
        assert_eq!(top[0].number1, 6);
        assert_eq!(top[0].error_count, 3);
        assert_eq!(top[1].number1, 8);
        assert_eq!(top[1].error_count, 1);
    }

    #[tokio::test]
    async fn leaderboard_orders_by_correct_then_best_streak() {
        let store = MemoryStore::new();
        store.get_or_create_user(1, "a", "A").await.unwrap();
        store.get_or_create_user(2, "b", "B").await.unwrap();
        for _ in 0..2 {
            store.update_stats(1, true).await.unwrap();
            store.update_stats(2, true).await.unwrap();
        }
        store.update_stats(2, true).await.unwrap();

        let top = store.top_leaderboard(10).await.unwrap();
        assert_eq!(top[0].user_id, 2);
        assert_eq!(top[1].user_id, 1);
    }
}
