use rand::prelude::IndexedRandom;
use std::collections::HashMap;

use crate::models::WeakSpot;

static TIER_EXCELLENT: [&str; 3] = [
    "Phenomenal! You're a true master!",
    "Perfect precision! Keep it going!",
    "Outstanding! You're a legend!",
];
static TIER_GOOD: [&str; 3] = [
    "Excellent! A little more and you'll be flawless!",
    "Very good! Keep practicing!",
    "Great progress!",
];
static TIER_FAIR: [&str; 3] = [
    "Not bad, but you can do better!",
    "Practice makes the master!",
    "Every mistake is a lesson!",
];
static TIER_ROUGH: [&str; 3] = [
    "The beginning is always the hardest!",
    "Every mathematician started with mistakes!",
    "Review the tables and try again!",
];

/// Templated motivational line: accuracy picks the tier, a long streak adds
/// a celebration suffix (stronger wording from 10).
pub fn motivational_message(accuracy: f64, streak: i64) -> String {
    let templates: &[&str] = if accuracy >= 90.0 {
        &TIER_EXCELLENT
    } else if accuracy >= 75.0 {
        &TIER_GOOD
    } else if accuracy >= 50.0 {
        &TIER_FAIR
    } else {
        &TIER_ROUGH
    };

    let mut rng = rand::rng();
    let mut message = (*templates.choose(&mut rng).unwrap()).to_string();

    if streak >= 10 {
        message.push_str(&format!("\nIncredible run: {} in a row!", streak));
    } else if streak >= 5 {
        message.push_str(&format!("\nGreat run: {} in a row!", streak));
    }

    message
}

/// Rule-based analysis of the user's hardest pairs: top-5 with counts, the
/// single most frequent operand across them, and three fixed coaching tips.
pub fn analyze(weak_spots: &[WeakSpot]) -> String {
    if weak_spots.is_empty() {
        return "Not enough data for an analysis yet. Keep practicing!".to_string();
    }

    let mut analysis = String::from("ANALYSIS OF YOUR RESULTS\n\nHardest problems:\n");
    for (i, spot) in weak_spots.iter().take(5).enumerate() {
        analysis.push_str(&format!(
            "{}. {} × {} — mistakes: {}\n",
            i + 1,
            spot.number1,
            spot.number2,
            spot.error_count
        ));
    }

    analysis.push_str("\nObservations:\n");
    if let Some(number) = most_frequent_operand(weak_spots) {
        analysis.push_str(&format!("• Most slips involve the number {}\n", number));
    }

    analysis.push_str(
        "\nRecommendations:\n\
         • Drill these problems in training mode\n\
         • Review the multiplication table for the hard numbers\n\
         • Try splitting a problem apart (7×8 = 7×7 + 7)\n",
    );

    analysis
}

/// Majority vote over the operands appearing in the weak-spot set.
fn most_frequent_operand(weak_spots: &[WeakSpot]) -> Option<i64> {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for spot in weak_spots.iter().take(5) {
        *counts.entry(spot.number1).or_insert(0) += 1;
        *counts.entry(spot.number2).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .max_by_key(|&(number, count)| (count, -number))
        .map(|(number, _)| number)
}

/// One of three hint framings for a product, picked uniformly.
pub fn hint(a: i64, b: i64) -> String {
    let hints = [
        format!("Hint: {} × {} = {} + {} + ... ({} times)", a, b, a, a, b),
        format!(
            "Hint: {} × {} = {}, so {} × {} = {} + {}",
            a,
            b - 1,
            a * (b - 1),
            a,
            b,
            a * (b - 1),
            a
        ),
        "Hint: try splitting the problem into parts!".to_string(),
    ];

    let mut rng = rand::rng();
    hints.choose(&mut rng).unwrap().clone()
}

/// Reminder nudge template: greeting line, body, call to action.
pub struct ReminderTemplate {
    pub greeting: &'static str,
    pub text: &'static str,
    pub cta: &'static str,
}

pub static REMINDER_TEMPLATES: [ReminderTemplate; 3] = [
    ReminderTemplate {
        greeting: "Hi",
        text: "The multiplication table misses you! A few minutes a day keeps the skill sharp.",
        cta: "Jump back in?",
    },
    ReminderTemplate {
        greeting: "Hey",
        text: "Quick practice round? Short sessions beat long breaks every time.",
        cta: "One quiz won't hurt!",
    },
    ReminderTemplate {
        greeting: "Hello",
        text: "Your streak is waiting. Champions train even on busy days!",
        cta: "Ready for a question?",
    },
];

pub fn pick_reminder_template() -> &'static ReminderTemplate {
    let mut rng = rand::rng();
    REMINDER_TEMPLATES.choose(&mut rng).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn spot(a: i64, b: i64, count: i64) -> WeakSpot {
        WeakSpot {
            user_id: 1,
            number1: a,
            number2: b,
            error_count: count,
            last_error: Utc::now(),
        }
    }

    #[test]
    fn motivational_message_picks_from_the_right_tier() {
        for _ in 0..20 {
            let message = motivational_message(95.0, 0);
            assert!(TIER_EXCELLENT.contains(&message.as_str()));

            let message = motivational_message(60.0, 0);
            assert!(TIER_FAIR.contains(&message.as_str()));

            let message = motivational_message(10.0, 0);
            assert!(TIER_ROUGH.contains(&message.as_str()));
        }
    }

    #[test]
    fn streak_suffix_appears_from_five() {
        let message = motivational_message(95.0, 4);
        assert!(!message.contains("in a row"));

        let message = motivational_message(95.0, 5);
        assert!(message.contains("Great run: 5 in a row!"));

        let message = motivational_message(95.0, 12);
        assert!(message.contains("Incredible run: 12 in a row!"));
    }

    #[test]
    fn analyze_without_data_asks_for_more_practice() {
        assert!(analyze(&[]).contains("Not enough data"));
    }

    #[test]
    fn analyze_lists_pairs_and_most_frequent_operand() {
        let spots = vec![spot(7, 8, 5), spot(7, 6, 3), spot(9, 4, 2)];
        let text = analyze(&spots);
        assert!(text.contains("1. 7 × 8 — mistakes: 5"));
        assert!(text.contains("3. 9 × 4 — mistakes: 2"));
        assert!(text.contains("the number 7"));
        assert!(text.contains("training mode"));
    }

    #[test]
    fn hint_mentions_the_operands_or_generic_framing() {
        for _ in 0..20 {
            let text = hint(7, 8);
            assert!(text.starts_with("Hint:"));
        }
    }
}
