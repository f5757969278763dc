use crate::models::Verdict;

/// Classify a submitted answer.
///
/// A miss within ±1 of the expected value, or within one edit of its decimal
/// rendering (for expected values of two or more digits), is treated as a
/// slip of the finger rather than a conceptual error.
pub fn evaluate(submitted: i64, expected: i64) -> Verdict {
    if submitted == expected {
        return Verdict::Correct;
    }

    if (submitted - expected).abs() <= 1 {
        return Verdict::TypoTolerated;
    }

    let expected_str = expected.to_string();
    if expected_str.chars().count() >= 2
        && levenshtein(&submitted.to_string(), &expected_str) <= 1
    {
        return Verdict::TypoTolerated;
    }

    Verdict::Incorrect
}

/// Classic Levenshtein distance over the two strings.
pub fn levenshtein(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous_row: Vec<usize> = (0..=b.len()).collect();

    for (i, c1) in a.iter().enumerate() {
        let mut current_row = vec![i + 1];
        for (j, c2) in b.iter().enumerate() {
            let insertions = previous_row[j + 1] + 1;
            let deletions = current_row[j] + 1;
            let substitutions = previous_row[j] + usize::from(c1 != c2);
            current_row.push(insertions.min(deletions).min(substitutions));
        }
        previous_row = current_row;
    }

    previous_row[b.len()]
}

/// For a genuinely wrong product answer, guess which neighbouring fact the
/// user computed instead: if the answer divides evenly by one operand and the
/// quotient lands in a plausible slot, surface that fact.
pub fn confusion_hint(a: i64, b: i64, submitted: i64, expected: i64) -> Option<String> {
    if submitted != 0 && a != 0 && submitted % a == 0 {
        let quotient = submitted / a;
        if quotient != b && (1..=10).contains(&quotient) {
            return Some(format!(
                "Looks like a mix-up!\n{} × {} = {}\nBut we need: {} × {} = {}",
                a, quotient, submitted, a, b, expected
            ));
        }
    }

    if submitted != 0 && b != 0 && submitted % b == 0 {
        let quotient = submitted / b;
        if quotient != a && (1..=100).contains(&quotient) {
            return Some(format!(
                "Looks like a mix-up!\n{} × {} = {}\nBut we need: {} × {} = {}",
                quotient, b, submitted, a, b, expected
            ));
        }
    }

    None
}

/// Full explanation shown after a wrong product answer.
pub fn explain_mistake(a: i64, b: i64, submitted: i64, expected: i64) -> String {
    let mut explanation = format!(
        "Wrong!\n\nThe right answer: {} × {} = {}\n\n",
        a, b, expected
    );

    if let Some(hint) = confusion_hint(a, b, submitted, expected) {
        explanation.push_str(&hint);
        explanation.push_str("\n\n");
    }

    explanation.push_str(&format!("Remember: {} × {} = {}", a, b, expected));
    explanation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_is_correct() {
        assert_eq!(evaluate(42, 42), Verdict::Correct);
        assert_eq!(evaluate(-15, -15), Verdict::Correct);
        assert_eq!(evaluate(0, 0), Verdict::Correct);
    }

    #[test]
    fn off_by_one_is_tolerated() {
        assert_eq!(evaluate(43, 42), Verdict::TypoTolerated);
        assert_eq!(evaluate(41, 42), Verdict::TypoTolerated);
        assert_eq!(evaluate(8, 7), Verdict::TypoTolerated);
    }

    #[test]
    fn transposition_on_two_digits_is_tolerated() {
        // 42 -> 45: one substitution on a two-digit expected value.
        assert_eq!(evaluate(45, 42), Verdict::TypoTolerated);
        // Dropped digit: 142 vs 42.
        assert_eq!(evaluate(142, 42), Verdict::TypoTolerated);
    }

    #[test]
    fn edit_distance_rule_needs_two_digit_expected() {
        // |9 - 4| > 1 and expected has one digit: edit distance does not apply.
        assert_eq!(evaluate(9, 4), Verdict::Incorrect);
        // The same near-string answer against a two-digit expected is tolerated.
        assert_eq!(evaluate(94, 94), Verdict::Correct);
        assert_eq!(evaluate(24, 42), Verdict::Incorrect); // distance 2
    }

    #[test]
    fn plainly_wrong_is_incorrect() {
        assert_eq!(evaluate(24, 42), Verdict::Incorrect);
        assert_eq!(evaluate(100, 42), Verdict::Incorrect);
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("42", "42"), 0);
        assert_eq!(levenshtein("42", "45"), 1);
        assert_eq!(levenshtein("42", "142"), 1);
        assert_eq!(levenshtein("24", "42"), 2);
        assert_eq!(levenshtein("", "42"), 2);
    }

    #[test]
    fn confusion_hint_finds_neighbouring_fact() {
        // 6 × 7 expected, 24 submitted: 24 / 6 = 4, a plausible second operand.
        let hint = confusion_hint(6, 7, 24, 42).expect("hint expected");
        assert!(hint.contains("6 × 4 = 24"));
        assert!(hint.contains("6 × 7 = 42"));
    }

    #[test]
    fn confusion_hint_checks_second_operand_slot() {
        // 12 × 7 expected 84, submitted 35 = 5 × 7.
        let hint = confusion_hint(12, 7, 35, 84).expect("hint expected");
        assert!(hint.contains("5 × 7 = 35"));
    }

    #[test]
    fn confusion_hint_absent_when_nothing_divides() {
        assert!(confusion_hint(6, 7, 41, 42).is_none());
        assert!(confusion_hint(6, 7, 0, 42).is_none());
    }

    #[test]
    fn explain_mistake_always_restates_the_fact() {
        let text = explain_mistake(6, 7, 24, 42);
        assert!(text.contains("6 × 7 = 42"));
        assert!(text.contains("Remember"));
    }
}
