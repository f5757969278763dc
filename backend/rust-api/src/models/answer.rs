use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of evaluating a submitted answer against the expected value.
///
/// TypoTolerated neither rewards nor penalizes: the streak and the
/// accuracy counters stay untouched and no weak spot is recorded, but the
/// session still advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    TypoTolerated,
    Incorrect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Standard,
    FindUnknown,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Standard => "standard",
            QuestionKind::FindUnknown => "find_unknown",
        }
    }
}

/// Append-only answer history entry, one per resolved question.
/// Timeouts are recorded as incorrect with `submitted: None` and
/// `response_time_secs` equal to the time limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub id: String,
    pub user_id: i64,
    pub question: String,
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted: Option<i64>,
    pub expected: i64,
    pub correct: bool,
    pub response_time_secs: f64,
    pub level: u8,
    pub mode: String,
    #[serde(with = "super::user::bson_datetime_as_chrono")]
    pub timestamp: DateTime<Utc>,
}
