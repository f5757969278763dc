use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

use super::answer::QuestionKind;

pub const LIGHTNING_LIMIT: Duration = Duration::from_secs(5);
/// Standard quiz limits, indexed by level 1..=3.
pub const STANDARD_LIMITS: [Duration; 3] = [
    Duration::from_secs(15),
    Duration::from_secs(20),
    Duration::from_secs(30),
];
/// Find-unknown limits, indexed by level 1..=3. Equations take longer to
/// rearrange than plain products, so the table is distinct.
pub const FIND_UNKNOWN_LIMITS: [Duration; 3] = [
    Duration::from_secs(20),
    Duration::from_secs(30),
    Duration::from_secs(40),
];

/// Maximum consecutive timeouts before the quiz is paused for inactivity.
pub const TIMEOUT_CAP: u32 = 3;

/// Quiz mode. Each variant carries only the data that mode needs, so a
/// weak-spot worklist cannot exist on a lightning session and a pinned
/// operand cannot leak into random mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Random { level: u8 },
    Specific { number: i64 },
    WeakSpots { worklist: Vec<(i64, i64)>, cursor: usize },
    Lightning,
    Sniper,
    Training,
    FindUnknown { level: u8 },
}

impl Mode {
    pub fn tag(&self) -> &'static str {
        match self {
            Mode::Random { .. } => "random",
            Mode::Specific { .. } => "specific",
            Mode::WeakSpots { .. } => "weak_spots",
            Mode::Lightning => "lightning",
            Mode::Sniper => "sniper",
            Mode::Training => "training",
            Mode::FindUnknown { .. } => "find_unknown",
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            Mode::Random { level } | Mode::FindUnknown { level } => *level,
            _ => 1,
        }
    }

    pub fn kind(&self) -> QuestionKind {
        match self {
            Mode::FindUnknown { .. } => QuestionKind::FindUnknown,
            _ => QuestionKind::Standard,
        }
    }

    /// Time limit for one question, `None` for the untimed modes.
    pub fn time_limit(&self) -> Option<Duration> {
        match self {
            Mode::Lightning => Some(LIGHTNING_LIMIT),
            Mode::Sniper | Mode::Training => None,
            Mode::FindUnknown { level } => {
                Some(FIND_UNKNOWN_LIMITS[level_index(*level)])
            }
            // Weak-spot drills and pinned-number drills run on level-1 timing.
            Mode::WeakSpots { .. } | Mode::Specific { .. } => Some(STANDARD_LIMITS[0]),
            Mode::Random { level } => Some(STANDARD_LIMITS[level_index(*level)]),
        }
    }

    /// Training shows a hint after a miss; sniper stays silent.
    pub fn hint_after_miss(&self) -> bool {
        matches!(self, Mode::Training)
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Mode::Lightning => "⚡",
            Mode::Sniper => "🎯",
            Mode::Training => "🎓",
            Mode::WeakSpots { .. } => "🎯",
            Mode::FindUnknown { .. } => "🔍",
            _ => "❓",
        }
    }
}

fn level_index(level: u8) -> usize {
    (level.clamp(1, 3) as usize) - 1
}

/// The question body as issued to the user.
#[derive(Debug, Clone)]
pub enum QuestionBody {
    Product { a: i64, b: i64 },
    Equation { text: String, explanation: String },
}

/// A question that has been issued and not yet resolved.
///
/// `token` is the claim marker of the resolution race: the answer path and
/// the timeout watcher both try to take the pending question out of the
/// session while comparing this token, and whoever succeeds owns the
/// resolution. The loser observes a cleared or renumbered marker and no-ops.
#[derive(Debug, Clone)]
pub struct PendingQuestion {
    pub body: QuestionBody,
    pub expected: i64,
    pub token: u64,
    pub issued_at: DateTime<Utc>,
    pub issued_instant: Instant,
    pub limit: Option<Duration>,
}

impl PendingQuestion {
    /// Render used in answer-history rows.
    pub fn history_label(&self) -> String {
        match &self.body {
            QuestionBody::Product { a, b } => format!("{} × {}", a, b),
            QuestionBody::Equation { text, .. } => format!("Find x: {}", text),
        }
    }
}

/// An active quiz run: one mode, strictly alternating issue/resolve.
#[derive(Debug)]
pub struct ActiveQuiz {
    pub mode: Mode,
    pub question_count: u32,
    pub consecutive_timeouts: u32,
    pub pending: Option<PendingQuestion>,
}

impl ActiveQuiz {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            question_count: 0,
            consecutive_timeouts: 0,
            pending: None,
        }
    }
}

/// Per-conversation session state. Menu stages carry only what the next
/// callback needs; everything else is unrepresentable.
#[derive(Debug)]
pub enum SessionState {
    ChoosingLevel { kind: QuestionKind },
    ChoosingNumber,
    Active(ActiveQuiz),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_limit_table_matches_modes() {
        assert_eq!(Mode::Lightning.time_limit(), Some(Duration::from_secs(5)));
        assert_eq!(Mode::Sniper.time_limit(), None);
        assert_eq!(Mode::Training.time_limit(), None);
        assert_eq!(
            Mode::Random { level: 1 }.time_limit(),
            Some(Duration::from_secs(15))
        );
        assert_eq!(
            Mode::Random { level: 3 }.time_limit(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            Mode::Specific { number: 7 }.time_limit(),
            Some(Duration::from_secs(15))
        );
        assert_eq!(
            Mode::WeakSpots { worklist: vec![], cursor: 0 }.time_limit(),
            Some(Duration::from_secs(15))
        );
        assert_eq!(
            Mode::FindUnknown { level: 2 }.time_limit(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn only_training_hints_after_miss() {
        assert!(Mode::Training.hint_after_miss());
        assert!(!Mode::Sniper.hint_after_miss());
        assert!(!Mode::Lightning.hint_after_miss());
    }

    #[test]
    fn mode_tags_are_stable() {
        assert_eq!(Mode::Random { level: 2 }.tag(), "random");
        assert_eq!(Mode::FindUnknown { level: 1 }.tag(), "find_unknown");
        assert_eq!(
            Mode::WeakSpots { worklist: vec![(6, 7)], cursor: 0 }.tag(),
            "weak_spots"
        );
    }
}
