use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::Database;

use crate::models::{AnswerRecord, UserProfile, WeakSpot};
use crate::utils::time::chrono_to_bson;

use super::store::{AudienceFilter, Store};

/// MongoDB-backed persistence gateway.
///
/// Collections: `users` keyed by the numeric messenger id, append-only
/// `answer_history`, `activity_calendar` unique on (user, date),
/// `weak_spots` unique on (user, number1, number2), and
/// `admin_notification_settings`.
pub struct MongoStore {
    mongo: Database,
}

impl MongoStore {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn users(&self) -> mongodb::Collection<UserProfile> {
        self.mongo.collection("users")
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn get_or_create_user(
        &self,
        user_id: i64,
        username: &str,
        first_name: &str,
    ) -> Result<UserProfile> {
        let fresh = UserProfile::new(user_id, username, first_name);
        let on_insert =
            mongodb::bson::to_document(&fresh).context("Failed to serialize new user")?;

        // $setOnInsert keeps the call race-safe when two events from the same
        // new user land concurrently.
        self.users()
            .update_one(doc! { "_id": user_id }, doc! { "$setOnInsert": on_insert })
            .upsert(true)
            .await
            .context("Failed to upsert user")?;

        self.users()
            .find_one(doc! { "_id": user_id })
            .await
            .context("Failed to read user back")?
            .ok_or_else(|| anyhow!("User {} missing after upsert", user_id))
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<UserProfile>> {
        self.users()
            .find_one(doc! { "_id": user_id })
            .await
            .context("Failed to query user")
    }

    async fn update_stats(&self, user_id: i64, correct: bool) -> Result<()> {
        let now = chrono_to_bson(Utc::now());

        if correct {
            // Pipeline update: stage 2 sees the streak incremented by stage 1,
            // so best_streak = max(best_streak, current_streak) holds in one
            // round trip.
            let pipeline = vec![
                doc! { "$set": {
                    "total_questions": { "$add": ["$total_questions", 1] },
                    "correct_answers": { "$add": ["$correct_answers", 1] },
                    "current_streak": { "$add": ["$current_streak", 1] },
                    "lastActivity": now,
                }},
                doc! { "$set": {
                    "best_streak": { "$max": ["$best_streak", "$current_streak"] },
                }},
            ];
            self.users()
                .update_one(doc! { "_id": user_id }, pipeline)
                .await
                .context("Failed to record correct answer")?;
        } else {
            self.users()
                .update_one(
                    doc! { "_id": user_id },
                    doc! {
                        "$inc": { "total_questions": 1, "wrong_answers": 1 },
                        "$set": { "current_streak": 0, "lastActivity": now },
                    },
                )
                .await
                .context("Failed to record wrong answer")?;
        }

        Ok(())
    }

    async fn append_answer(&self, record: &AnswerRecord) -> Result<()> {
        let collection: mongodb::Collection<AnswerRecord> =
            self.mongo.collection("answer_history");
        collection
            .insert_one(record)
            .await
            .context("Failed to append answer history")?;
        Ok(())
    }

    async fn bump_activity(&self, user_id: i64, date: NaiveDate) -> Result<()> {
        let collection: mongodb::Collection<Document> =
            self.mongo.collection("activity_calendar");
        collection
            .update_one(
                doc! { "user_id": user_id, "activity_date": date.to_string() },
                doc! { "$inc": { "questions_count": 1 } },
            )
            .upsert(true)
            .await
            .context("Failed to upsert activity entry")?;
        Ok(())
    }

    async fn activity_window(
        &self,
        user_id: i64,
        days: i64,
    ) -> Result<Vec<(NaiveDate, i64)>> {
        let collection: mongodb::Collection<Document> =
            self.mongo.collection("activity_calendar");
        let start = (Utc::now() - Duration::days(days)).date_naive();

        let mut cursor = collection
            .find(doc! {
                "user_id": user_id,
                "activity_date": { "$gte": start.to_string() },
            })
            .sort(doc! { "activity_date": 1 })
            .await
            .context("Failed to query activity calendar")?;

        let mut entries = Vec::new();
        while let Some(entry) = cursor.try_next().await? {
            let date = entry
                .get_str("activity_date")
                .ok()
                .and_then(|raw| raw.parse::<NaiveDate>().ok());
            let count = entry
                .get_i64("questions_count")
                .or_else(|_| entry.get_i32("questions_count").map(|v| v as i64))
                .unwrap_or(0);
            if let Some(date) = date {
                entries.push((date, count));
            }
        }

        Ok(entries)
    }

    async fn record_weak_spot(&self, user_id: i64, a: i64, b: i64) -> Result<()> {
        let collection: mongodb::Collection<Document> = self.mongo.collection("weak_spots");
        collection
            .update_one(
                doc! { "user_id": user_id, "number1": a, "number2": b },
                doc! {
                    "$inc": { "error_count": 1 },
                    "$set": { "lastError": chrono_to_bson(Utc::now()) },
                },
            )
            .upsert(true)
            .await
            .context("Failed to upsert weak spot")?;
        Ok(())
    }

    async fn top_weak_spots(&self, user_id: i64, limit: i64) -> Result<Vec<WeakSpot>> {
        let collection: mongodb::Collection<WeakSpot> = self.mongo.collection("weak_spots");
        let cursor = collection
            .find(doc! { "user_id": user_id })
            .sort(doc! { "error_count": -1, "lastError": -1 })
            .limit(limit)
            .await
            .context("Failed to query weak spots")?;

        cursor
            .try_collect()
            .await
            .context("Failed to collect weak spots")
    }

    async fn set_custom_name(&self, user_id: i64, name: &str) -> Result<()> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "custom_name": name } },
            )
            .await
            .context("Failed to set custom name")?;
        Ok(())
    }

    async fn set_reminder_enabled(&self, user_id: i64, enabled: bool) -> Result<()> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "reminder_enabled": enabled } },
            )
            .await
            .context("Failed to toggle reminders")?;
        Ok(())
    }

    async fn set_whitelisted(&self, user_id: i64, whitelisted: bool) -> Result<()> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "is_whitelisted": whitelisted } },
            )
            .await
            .context("Failed to update whitelist flag")?;
        Ok(())
    }

    async fn whitelisted_users(&self) -> Result<Vec<UserProfile>> {
        let cursor = self
            .users()
            .find(doc! { "is_whitelisted": true })
            .await
            .context("Failed to query whitelist")?;
        cursor
            .try_collect()
            .await
            .context("Failed to collect whitelist")
    }

    async fn top_leaderboard(&self, limit: i64) -> Result<Vec<UserProfile>> {
        let cursor = self
            .users()
            .find(doc! { "total_questions": { "$gt": 0 } })
            .sort(doc! { "correct_answers": -1, "best_streak": -1 })
            .limit(limit)
            .await
            .context("Failed to query leaderboard")?;
        cursor
            .try_collect()
            .await
            .context("Failed to collect leaderboard")
    }

    async fn reminder_candidates(&self) -> Result<Vec<UserProfile>> {
        let cursor = self
            .users()
            .find(doc! { "reminder_enabled": true })
            .await
            .context("Failed to query reminder candidates")?;
        cursor
            .try_collect()
            .await
            .context("Failed to collect reminder candidates")
    }

    async fn audience(&self, filter: AudienceFilter) -> Result<Vec<i64>> {
        let filter_doc = match filter {
            AudienceFilter::Whitelisted => doc! { "is_whitelisted": true },
            AudienceFilter::NonWhitelisted => doc! { "is_whitelisted": false },
            AudienceFilter::ActiveWithinDays(days) => {
                let cutoff = Utc::now() - Duration::days(days);
                doc! { "lastActivity": { "$gte": chrono_to_bson(cutoff) } }
            }
        };

        let cursor = self
            .users()
            .find(filter_doc)
            .await
            .context("Failed to query audience")?;
        let users: Vec<UserProfile> = cursor
            .try_collect()
            .await
            .context("Failed to collect audience")?;
        Ok(users.into_iter().map(|user| user.user_id).collect())
    }

    async fn admin_notif_enabled(&self, user_id: i64) -> Result<bool> {
        let collection: mongodb::Collection<Document> =
            self.mongo.collection("admin_notification_settings");
        let row = collection
            .find_one(doc! { "_id": user_id })
            .await
            .context("Failed to query admin notification setting")?;

        // No row means notifications are on by default.
        Ok(row
            .and_then(|doc| doc.get_bool("enabled").ok())
            .unwrap_or(true))
    }

    async fn set_admin_notif(&self, user_id: i64, enabled: bool) -> Result<()> {
        let collection: mongodb::Collection<Document> =
            self.mongo.collection("admin_notification_settings");
        collection
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "enabled": enabled } },
            )
            .upsert(true)
            .await
            .context("Failed to store admin notification setting")?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.mongo
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        Ok(())
    }
}
