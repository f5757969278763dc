use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User profile stored in the MongoDB "users" collection, keyed by the
/// messenger-assigned numeric id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub user_id: i64,
    pub username: String,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub total_questions: i64,
    #[serde(default)]
    pub correct_answers: i64,
    #[serde(default)]
    pub wrong_answers: i64,
    #[serde(default)]
    pub current_streak: i64,
    #[serde(default)]
    pub best_streak: i64,
    #[serde(rename = "startDate", with = "bson_datetime_as_chrono")]
    pub start_date: DateTime<Utc>,
    #[serde(rename = "lastActivity", with = "bson_datetime_as_chrono")]
    pub last_activity: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub reminder_enabled: bool,
    #[serde(default)]
    pub is_whitelisted: bool,
}

fn default_true() -> bool {
    true
}

impl UserProfile {
    pub fn new(user_id: i64, username: &str, first_name: &str) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            username: username.to_string(),
            first_name: first_name.to_string(),
            custom_name: None,
            total_questions: 0,
            correct_answers: 0,
            wrong_answers: 0,
            current_streak: 0,
            best_streak: 0,
            start_date: now,
            last_activity: now,
            reminder_enabled: true,
            is_whitelisted: false,
        }
    }

    /// Custom name set by the admin wins over the messenger first name.
    pub fn display_name(&self) -> &str {
        match self.custom_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => {
                if self.first_name.is_empty() {
                    "User"
                } else {
                    &self.first_name
                }
            }
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total_questions == 0 {
            0.0
        } else {
            self.correct_answers as f64 / self.total_questions as f64 * 100.0
        }
    }
}

/// Weak spot: an operand pair the user keeps getting wrong.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeakSpot {
    pub user_id: i64,
    pub number1: i64,
    pub number2: i64,
    pub error_count: i64,
    #[serde(rename = "lastError", with = "bson_datetime_as_chrono")]
    pub last_error: DateTime<Utc>,
}

// Serde converters for chrono::DateTime <-> mongodb::bson::DateTime
pub(crate) mod bson_datetime_as_chrono {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bson_dt = bson::DateTime::from_millis(date.timestamp_millis());
        bson_dt.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bson_dt = bson::DateTime::deserialize(deserializer)?;
        Ok(DateTime::from_timestamp_millis(bson_dt.timestamp_millis()).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_custom_name() {
        let mut user = UserProfile::new(7, "max", "Maksym");
        assert_eq!(user.display_name(), "Maksym");
        user.custom_name = Some("Coach".to_string());
        assert_eq!(user.display_name(), "Coach");
    }

    #[test]
    fn display_name_falls_back_when_empty() {
        let user = UserProfile::new(7, "", "");
        assert_eq!(user.display_name(), "User");
    }

    #[test]
    fn accuracy_handles_zero_questions() {
        let mut user = UserProfile::new(1, "a", "A");
        assert_eq!(user.accuracy(), 0.0);
        user.total_questions = 4;
        user.correct_answers = 3;
        assert!((user.accuracy() - 75.0).abs() < f64::EPSILON);
    }
}
