use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;

use crate::types::{now_millis, Operation, Problem, MAX_LEVEL, MIN_LEVEL};

/// Source of inclusive-bounded uniform integers.
pub trait Draw {
    fn uniform(&mut self, min: u32, max: u32) -> u32;
}

/// `Draw` backed by a `rand` generator.
pub struct RandomDraw<R: Rng>(pub R);

impl RandomDraw<rand::rngs::ThreadRng> {
    pub fn thread() -> Self {
        RandomDraw(rand::thread_rng())
    }
}

impl<R: Rng> Draw for RandomDraw<R> {
    fn uniform(&mut self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        self.0.gen_range(min..=max)
    }
}

/// Levels outside 1..=5 use the level 1 ranges.
pub fn effective_level(level: u8) -> u8 {
    if (MIN_LEVEL..=MAX_LEVEL).contains(&level) {
        level
    } else {
        MIN_LEVEL
    }
}

/// Operand range for addition, subtraction and the division ceiling.
pub fn range_for_level(level: u8) -> (u32, u32) {
    match level {
        2 => (0, 20),
        3 => (0, 50),
        4 => (0, 100),
        5 => (0, 500),
        _ => (0, 10),
    }
}

/// Multiplication grows slower so products stay readable.
pub fn multiplication_range(level: u8) -> (u32, u32) {
    match level {
        3 => (0, 20),
        4 => (0, 50),
        5 => (0, 100),
        _ => (0, 12),
    }
}

pub fn generate_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!("q_{}_{}", now_millis().timestamp_millis(), suffix)
}

/// Generates a problem using the thread RNG.
pub fn generate(operation: Operation, level: u8) -> Problem {
    generate_with(&mut RandomDraw::thread(), operation, level)
}

pub fn generate_with<D: Draw + ?Sized>(draw: &mut D, operation: Operation, level: u8) -> Problem {
    let level = effective_level(level);
    let (min, max) = range_for_level(level);

    let (a, b, correct_answer) = match operation {
        Operation::Add => {
            let a = draw.uniform(min, max);
            let b = draw.uniform(min, max);
            (a, b, (a + b).to_string())
        }
        Operation::Subtract => {
            // a >= b keeps the result non-negative
            let b = draw.uniform(min, max);
            let a = draw.uniform(b, max);
            (a, b, (a - b).to_string())
        }
        Operation::Multiply => {
            let (mul_min, mul_max) = multiplication_range(level);
            let a = draw.uniform(mul_min, mul_max);
            let b = draw.uniform(mul_min, mul_max);
            (a, b, (a * b).to_string())
        }
        Operation::Divide => {
            let b = draw.uniform(1, max);
            let quotient = draw.uniform(0, max / b);
            let remainder = draw.uniform(0, b - 1);
            let a = quotient * b + remainder;
            let answer = if remainder == 0 {
                quotient.to_string()
            } else {
                format!("{} R {}", quotient, remainder)
            };
            (a, b, answer)
        }
    };

    let problem = Problem {
        id: generate_id(),
        operation,
        level,
        a,
        b,
        display_text: format!("{} {} {}", a, operation.symbol(), b),
        correct_answer,
        choices: Vec::new(),
        created_at: now_millis(),
    };

    debug!(
        id = %problem.id,
        operation = %operation,
        level = level,
        text = %problem.display_text,
        answer = %problem.correct_answer,
        "Generated problem"
    );

    problem
}

/// Splits a division answer into (quotient, remainder).
pub fn parse_division_answer(answer: &str) -> Option<(i64, i64)> {
    let mut parts = answer.split(" R ");
    let quotient = parts.next()?.trim().parse().ok()?;
    let remainder = match parts.next() {
        Some(r) => r.trim().parse().ok()?,
        None => 0,
    };
    Some((quotient, remainder))
}
