use rand::Rng;

/// Generate a multiplication question for the given level.
///
/// Level 1: both operands in [2,9] (one pinned when `pinned` is given).
/// Level 2: first operand in [10,99], second in [2,9].
/// Level 3: both operands in [10,99].
pub fn generate(level: u8, pinned: Option<i64>) -> (i64, i64, i64) {
    let mut rng = rand::rng();

    let (a, b) = match level {
        1 => match pinned {
            Some(number) => (number, rng.random_range(2..=9)),
            None => (rng.random_range(2..=9), rng.random_range(2..=9)),
        },
        2 => (rng.random_range(10..=99), rng.random_range(2..=9)),
        _ => (rng.random_range(10..=99), rng.random_range(10..=99)),
    };

    (a, b, a * b)
}

/// A rendered "solve for the unknown" problem.
#[derive(Debug, Clone)]
pub struct Equation {
    pub text: String,
    pub unknown: i64,
    pub explanation: String,
    pub known_multiplier: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    /// a·x = b
    PlainLeft,
    /// x·a = b
    PlainRight,
    /// a·x + c = b
    PlusConst,
    /// a·x − c = b
    MinusConst,
    /// c + a·x = b
    ConstPlus,
    /// c − a·x = b  (isolating x negates both sides)
    ConstMinus,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct EquationParts {
    pub shape: Shape,
    pub a: i64,
    pub c: i64,
    pub x: i64,
    pub b: i64,
}

impl EquationParts {
    /// The equation must be satisfied exactly by the unknown.
    pub fn holds(&self) -> bool {
        match self.shape {
            Shape::PlainLeft | Shape::PlainRight => self.a * self.x == self.b,
            Shape::PlusConst => self.a * self.x + self.c == self.b,
            Shape::MinusConst => self.a * self.x - self.c == self.b,
            Shape::ConstPlus => self.c + self.a * self.x == self.b,
            Shape::ConstMinus => self.c - self.a * self.x == self.b,
        }
    }
}

pub(crate) fn sample_parts(level: u8) -> EquationParts {
    let mut rng = rand::rng();

    match level {
        1 => {
            let a = rng.random_range(2..=20);
            let x = rng.random_range(2..=20);
            let shape = if rng.random_bool(0.5) {
                Shape::PlainLeft
            } else {
                Shape::PlainRight
            };
            EquationParts { shape, a, c: 0, x, b: a * x }
        }
        2 => {
            let mut x = rng.random_range(-10..=10);
            if x == 0 {
                x = 2;
            }
            let mut a = rng.random_range(2..=10);
            if rng.random_bool(0.5) {
                a = -a;
            }
            let c = rng.random_range(0..=9);

            let shape = match rng.random_range(1..=4) {
                1 => Shape::PlusConst,
                2 => Shape::MinusConst,
                3 => Shape::ConstPlus,
                _ => Shape::ConstMinus,
            };
            let b = match shape {
                Shape::PlusConst => a * x + c,
                Shape::MinusConst => a * x - c,
                Shape::ConstPlus => c + a * x,
                _ => c - a * x,
            };
            EquationParts { shape, a, c, x, b }
        }
        _ => {
            let mut x = rng.random_range(-20..=20);
            if x == 0 {
                x = 5;
            }
            let mut a = rng.random_range(2..=20);
            if rng.random_bool(0.5) {
                a = -a;
            }
            let c = rng.random_range(10..=999);

            let shape = if rng.random_range(1..=2) == 1 {
                Shape::PlusConst
            } else {
                Shape::MinusConst
            };
            let b = match shape {
                Shape::PlusConst => a * x + c,
                _ => a * x - c,
            };
            EquationParts { shape, a, c, x, b }
        }
    }
}

pub(crate) fn render(parts: EquationParts) -> Equation {
    let EquationParts { shape, a, c, x, b } = parts;

    let (text, explanation) = match shape {
        Shape::PlainLeft | Shape::PlainRight => {
            let text = if shape == Shape::PlainLeft {
                format!("{} × x = {}", a, b)
            } else {
                format!("x × {} = {}", a, b)
            };
            let explanation = format!(
                "Equation: {}\nTo find x, divide the product by the known factor:\nx = {} / {} = {}",
                text, b, a, x
            );
            (text, explanation)
        }
        Shape::PlusConst => (
            format!("{} · x + {} = {}", a, c, b),
            format!(
                "{}·x = {} - {}\n{}·x = {}\nx = {} / {} = {}",
                a,
                b,
                c,
                a,
                b - c,
                b - c,
                a,
                x
            ),
        ),
        Shape::MinusConst => (
            format!("{} · x - {} = {}", a, c, b),
            format!(
                "{}·x = {} + {}\n{}·x = {}\nx = {} / {} = {}",
                a,
                b,
                c,
                a,
                b + c,
                b + c,
                a,
                x
            ),
        ),
        Shape::ConstPlus => (
            format!("{} + {} · x = {}", c, a, b),
            format!(
                "{}·x = {} - {}\n{}·x = {}\nx = {} / {} = {}",
                a,
                b,
                c,
                a,
                b - c,
                b - c,
                a,
                x
            ),
        ),
        // Moving c across leaves -a·x on the left; both sides must be
        // divided by -a, not a.
        Shape::ConstMinus => (
            format!("{} - {} · x = {}", c, a, b),
            format!(
                "-{}·x = {} - {}\n-{}·x = {}\nx = {} / -{} = {}",
                a,
                b,
                c,
                a,
                b - c,
                b - c,
                a,
                x
            ),
        ),
    };

    Equation {
        text,
        unknown: x,
        explanation,
        known_multiplier: a.abs(),
    }
}

/// Generate a "solve for the unknown" problem for the given level.
pub fn generate_equation(level: u8) -> Equation {
    render(sample_parts(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_1_operands_in_range() {
        for _ in 0..200 {
            let (a, b, product) = generate(1, None);
            assert!((2..=9).contains(&a));
            assert!((2..=9).contains(&b));
            assert_eq!(product, a * b);
        }
    }

    #[test]
    fn level_1_respects_pinned_operand() {
        for _ in 0..100 {
            let (a, b, product) = generate(1, Some(7));
            assert_eq!(a, 7);
            assert!((2..=9).contains(&b));
            assert_eq!(product, 7 * b);
        }
    }

    #[test]
    fn level_2_and_3_operands_in_range() {
        for _ in 0..200 {
            let (a, b, product) = generate(2, None);
            assert!((10..=99).contains(&a));
            assert!((2..=9).contains(&b));
            assert_eq!(product, a * b);

            let (a, b, product) = generate(3, None);
            assert!((10..=99).contains(&a));
            assert!((10..=99).contains(&b));
            assert_eq!(product, a * b);
        }
    }

    #[test]
    fn equation_round_trip_level_1() {
        for _ in 0..300 {
            let parts = sample_parts(1);
            assert!(parts.holds(), "level-1 parts must satisfy the equation");
            assert!((2..=20).contains(&parts.a));
            assert!((2..=20).contains(&parts.x));
        }
    }

    #[test]
    fn equation_round_trip_level_2_all_shapes() {
        let mut seen_const_minus = false;
        for _ in 0..500 {
            let parts = sample_parts(2);
            assert!(parts.holds(), "level-2 parts must satisfy the equation");
            assert!(parts.x != 0);
            assert!((-10..=10).contains(&parts.x));
            assert!((2..=10).contains(&parts.a.abs()));
            assert!((0..=9).contains(&parts.c));
            if parts.shape == Shape::ConstMinus {
                seen_const_minus = true;
            }
        }
        assert!(seen_const_minus, "shape 4 should appear in 500 samples");
    }

    #[test]
    fn equation_round_trip_level_3() {
        for _ in 0..300 {
            let parts = sample_parts(3);
            assert!(parts.holds(), "level-3 parts must satisfy the equation");
            assert!(parts.x != 0);
            assert!((-20..=20).contains(&parts.x));
            assert!((2..=20).contains(&parts.a.abs()));
            assert!((10..=999).contains(&parts.c));
            assert!(matches!(parts.shape, Shape::PlusConst | Shape::MinusConst));
        }
    }

    #[test]
    fn const_minus_explanation_divides_by_negated_factor() {
        // c − a·x = b  ⇒  x = (b − c) / (−a); the division step must show -a.
        let parts = EquationParts {
            shape: Shape::ConstMinus,
            a: 4,
            c: 7,
            x: -3,
            b: 7 - 4 * -3,
        };
        assert!(parts.holds());
        let equation = render(parts);
        assert_eq!(equation.unknown, -3);
        assert_eq!(equation.known_multiplier, 4);
        assert!(equation.text.starts_with("7 - 4 · x"));
        assert!(equation.explanation.contains("/ -4"));
    }

    #[test]
    fn plain_equation_renders_division_step() {
        let parts = EquationParts {
            shape: Shape::PlainLeft,
            a: 6,
            c: 0,
            x: 9,
            b: 54,
        };
        let equation = render(parts);
        assert_eq!(equation.text, "6 × x = 54");
        assert!(equation.explanation.contains("x = 54 / 6 = 9"));
    }
}
