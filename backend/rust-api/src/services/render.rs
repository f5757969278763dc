use chrono::{Duration, NaiveDate, Utc};

use crate::models::{Choice, UserProfile, WeakSpot};

use super::advisor;

pub fn main_menu() -> Vec<Choice> {
    vec![
        Choice::new("🔍 Find X", "find_x_mode"),
        Choice::new("🎯 Start quiz", "start_quiz"),
        Choice::new("⚡ Lightning mode", "lightning_mode"),
        Choice::new("🎯 Sniper mode", "sniper_mode"),
        Choice::new("🎓 Training mode", "training_mode"),
        Choice::new("📋 Multiplication table", "view_table"),
        Choice::new("📊 My statistics", "my_stats"),
        Choice::new("📅 Activity calendar", "activity_calendar"),
        Choice::new("🤖 AI analysis", "ai_analysis"),
        Choice::new("🏆 Leaderboard", "leaderboard"),
        Choice::new("ℹ️ Info", "info"),
    ]
}

pub fn mode_menu() -> Vec<Choice> {
    vec![
        Choice::new("🎲 Random problems", "mode_random"),
        Choice::new("🔢 Specific number", "mode_specific"),
        Choice::new("🎯 Drill weak spots", "mode_weak_spots"),
        Choice::new("🔙 Back", "back_main"),
    ]
}

pub fn level_menu() -> Vec<Choice> {
    vec![
        Choice::new("⭐ Level 1: 2-9 × 2-9", "level_1"),
        Choice::new("⭐⭐ Level 2: 10-99 × 2-9", "level_2"),
        Choice::new("⭐⭐⭐ Level 3: 10-99 × 10-99", "level_3"),
        Choice::new("🔙 Back", "back_mode"),
    ]
}

pub fn number_menu() -> Vec<Choice> {
    let mut menu: Vec<Choice> = (2..=9)
        .map(|i| Choice::new(i.to_string(), format!("number_{}", i)))
        .collect();
    menu.push(Choice::new("🔙 Back", "back_mode"));
    menu
}

pub fn table_selection_menu() -> Vec<Choice> {
    let mut menu: Vec<Choice> = (2..=9)
        .map(|i| Choice::new(format!("Table of {}", i), format!("table_{}", i)))
        .collect();
    menu.push(Choice::new("🔙 Back", "back_main"));
    menu
}

pub fn next_finish_menu() -> Vec<Choice> {
    vec![
        Choice::new("▶️ Next question", "continue_quiz"),
        Choice::new("🏁 Finish", "finish_quiz"),
    ]
}

/// Menu offered after a wrong answer: the table button targets whichever
/// operand fits a single-digit table.
pub fn after_wrong_menu(a: i64, b: i64) -> Vec<Choice> {
    let table_number = if a <= 9 { a } else if b <= 9 { b } else { a };
    vec![
        Choice::new(
            format!("📋 Table of {}", table_number),
            format!("show_table_{}", table_number),
        ),
        Choice::new("💡 Hint", format!("hint_{}_{}", a, b)),
        Choice::new("▶️ Next question", "continue_quiz"),
        Choice::new("🏁 Finish", "finish_quiz"),
    ]
}

pub fn multiplication_table(number: i64) -> String {
    let mut table = format!("📋 MULTIPLICATION TABLE OF {}\n\n", number);
    for i in 1..=10i64 {
        table.push_str(&format!("{} × {:2} = {:3}\n", number, i, number * i));
    }
    table
}

pub fn welcome(display_name: &str) -> String {
    format!(
        "🎓 Hi, {}!\n\n\
         Welcome to the multiplication trainer! 📚\n\n\
         🎯 What I can do:\n\n\
         📝 Quizzes with three difficulty levels\n\
         ⚡ Lightning mode (5 seconds)\n\
         🎯 Sniper mode (no timer)\n\
         🎓 Training mode (with hints)\n\
         📋 Multiplication tables\n\
         📊 Personal statistics\n\
         📅 Activity calendar\n\
         🤖 Analysis of your weak spots\n\
         🏆 Global leaderboard\n\
         🔔 Daily reminders\n\n\
         Pick what you like! 👇",
        display_name
    )
}

pub fn payment_notice(user_id: i64, contact: &str) -> String {
    format!(
        "Hi! 👋\n\n\
         This trainer is available by subscription.\n\n\
         To get access, write to {} and mention your id: {}\n\n\
         Once confirmed you'll be let in within the hour! ⚡",
        contact, user_id
    )
}

pub fn stats_card(user: &UserProfile) -> String {
    let accuracy = user.accuracy();
    format!(
        "📊 STATISTICS: {}\n\n\
         📅 {} → {}\n\n\
         📈 Numbers:\n\
         • Questions: {}\n\
         • Correct: {} ✅\n\
         • Accuracy: {:.1}%\n\n\
         🔥 Records:\n\
         • Best streak: {}\n\
         • Current streak: {}\n\n\
         {}",
        user.display_name(),
        user.start_date.format("%Y-%m-%d"),
        user.last_activity.format("%Y-%m-%d"),
        user.total_questions,
        user.correct_answers,
        accuracy,
        user.best_streak,
        user.current_streak,
        advisor::motivational_message(accuracy, user.current_streak)
    )
}

/// 30-day activity strip: one emoji per day, bucketed by question count,
/// a week per line.
pub fn activity_calendar(entries: &[(NaiveDate, i64)]) -> String {
    if entries.is_empty() {
        return "📅 ACTIVITY CALENDAR\n\nNo data yet.".to_string();
    }

    let mut text = String::from("📅 CALENDAR (30 days)\n");
    let today = Utc::now().date_naive();

    for i in (0..30).rev() {
        let date = today - Duration::days(i);
        let count = entries
            .iter()
            .find(|(d, _)| *d == date)
            .map(|(_, c)| *c)
            .unwrap_or(0);
        let emoji = bucket_emoji(count);
        if i % 7 == 6 {
            text.push_str(&format!("\n{} {}", date.format("%d.%m"), emoji));
        } else {
            text.push_str(&format!(" {}", emoji));
        }
    }

    let total_days = entries.len();
    let total_questions: i64 = entries.iter().map(|(_, c)| c).sum();
    text.push_str(&format!(
        "\n\n📊 Totals:\n• Active days: {}\n• Questions: {}\n\n⬜ 0 | 🟩 1-9 | 🟨 10-19 | 🟥 20+",
        total_days, total_questions
    ));

    text
}

fn bucket_emoji(count: i64) -> &'static str {
    if count == 0 {
        "⬜"
    } else if count < 10 {
        "🟩"
    } else if count < 20 {
        "🟨"
    } else {
        "🟥"
    }
}

pub fn leaderboard(top: &[UserProfile]) -> String {
    if top.is_empty() {
        return "🏆 LEADERBOARD\n\nEmpty so far.".to_string();
    }

    let mut text = String::from("🏆 TOP-10\n\n");
    for (i, user) in top.iter().enumerate() {
        let place = match i {
            0 => "🥇".to_string(),
            1 => "🥈".to_string(),
            2 => "🥉".to_string(),
            _ => format!("{}.", i + 1),
        };
        text.push_str(&format!(
            "{} {}\n   ✅ {} | 🔥 {} | 📊 {:.0}%\n\n",
            place,
            user.display_name(),
            user.correct_answers,
            user.best_streak,
            user.accuracy()
        ));
    }
    text
}

pub fn info() -> String {
    "ℹ️ INFO\n\n\
     📚 Multiplication-table trainer\n\n\
     🚀 Features:\n\
     • 3 difficulty levels\n\
     • 3 special modes\n\
     • Built-in assistant\n\
     • Activity calendar\n\
     • Daily reminders\n\
     • Weak-spot analysis\n\
     • Global leaderboard\n\n\
     Good luck! 🚀"
        .to_string()
}

/// AI-analysis view over the weak-spot set.
pub fn analysis(weak_spots: &[WeakSpot]) -> String {
    format!("🤖 {}", advisor::analyze(weak_spots))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_contains_all_ten_rows() {
        let table = multiplication_table(7);
        assert!(table.contains("7 ×  1 =   7"));
        assert!(table.contains("7 × 10 =  70"));
        assert_eq!(table.lines().filter(|l| l.contains('=')).count(), 10);
    }

    #[test]
    fn after_wrong_menu_picks_single_digit_table() {
        let menu = after_wrong_menu(12, 7);
        assert_eq!(menu[0].token, "show_table_7");
        let menu = after_wrong_menu(6, 7);
        assert_eq!(menu[0].token, "show_table_6");
    }

    #[test]
    fn calendar_buckets_counts() {
        assert_eq!(bucket_emoji(0), "⬜");
        assert_eq!(bucket_emoji(5), "🟩");
        assert_eq!(bucket_emoji(15), "🟨");
        assert_eq!(bucket_emoji(25), "🟥");
    }

    #[test]
    fn calendar_without_entries_reports_no_data() {
        assert!(activity_calendar(&[]).contains("No data yet"));
    }

    #[test]
    fn leaderboard_renders_medals() {
        let mut a = UserProfile::new(1, "a", "Ann");
        a.total_questions = 10;
        a.correct_answers = 9;
        a.best_streak = 4;
        let text = leaderboard(&[a]);
        assert!(text.contains("🥇 Ann"));
        assert!(text.contains("✅ 9"));
    }
}
