use tracing::{debug, warn};

use crate::generator::parse_division_answer;
use crate::types::{Operation, Problem};

pub const CHOICE_COUNT: usize = 4;

/// Builds the answer choices for a problem.
///
/// The correct answer is always first; callers that want a shuffled layout
/// reorder for display. Distractors come in a fixed priority order:
///
/// * division: wrong quotient, wrong remainder, then the "forgot the
///   remainder" answer;
/// * everything else: ±1, ±2 and (for answers of 10 or more) ±10, skipping
///   negatives.
///
/// Missing slots are padded with `correct + 5n`, or `correct + 10n` if that
/// collides. The padding is a heuristic and does not prove uniqueness for
/// every conceivable answer, only for the ones the generator produces.
pub fn make_choices(problem: &Problem) -> Vec<String> {
    let correct = problem.correct_answer.clone();
    let mut choices = vec![correct.clone()];

    let candidates = match problem.operation {
        Operation::Divide => division_distractors(&correct, problem.b as i64),
        _ => nearby_distractors(&correct),
    };

    for candidate in candidates {
        if choices.len() >= CHOICE_COUNT {
            break;
        }
        if !choices.contains(&candidate) {
            choices.push(candidate);
        }
    }

    pad_choices(&mut choices, &correct);
    choices.truncate(CHOICE_COUNT);

    debug!(
        id = %problem.id,
        choices = ?choices,
        "Generated choices"
    );

    choices
}

/// Returns the problem with freshly generated choices attached.
pub fn attach_choices(problem: Problem) -> Problem {
    let choices = make_choices(&problem);
    problem.with_choices(choices)
}

fn division_distractors(correct: &str, divisor: i64) -> Vec<String> {
    let Some((quotient, remainder)) = parse_division_answer(correct) else {
        warn!(answer = correct, "Division answer is not numeric");
        return Vec::new();
    };

    let mut distractors = Vec::with_capacity(3);

    let wrong_quotient = if quotient > 0 { quotient - 1 } else { quotient + 1 };
    distractors.push(format!("{} R {}", wrong_quotient, remainder));

    let wrong_remainder = if remainder > 0 && remainder < divisor - 1 {
        remainder + 1
    } else if remainder > 0 {
        remainder - 1
    } else {
        1
    };
    distractors.push(format!("{} R {}", quotient, wrong_remainder));

    if remainder != 0 {
        distractors.push(quotient.to_string());
    } else {
        distractors.push((quotient + 1).to_string());
    }

    distractors
}

fn nearby_distractors(correct: &str) -> Vec<String> {
    let Ok(value) = correct.trim().parse::<i64>() else {
        warn!(answer = correct, "Answer is not numeric");
        return Vec::new();
    };

    let mut offsets = vec![1, -1, 2, -2];
    if value >= 10 {
        offsets.extend([10, -10]);
    }

    let mut seen = Vec::with_capacity(offsets.len());
    for offset in offsets {
        let candidate = value + offset;
        if candidate >= 0 && candidate != value && !seen.contains(&candidate) {
            seen.push(candidate);
        }
    }

    seen.into_iter().map(|n| n.to_string()).collect()
}

/// Leading integer of an answer, "7 R 2" reads as 7.
fn leading_integer(answer: &str) -> Option<i64> {
    answer.split(" R ").next()?.trim().parse().ok()
}

fn pad_choices(choices: &mut Vec<String>, correct: &str) {
    let numeric = leading_integer(correct);

    while choices.len() < CHOICE_COUNT {
        let count = choices.len() as i64;
        let filler = match numeric {
            Some(value) => {
                let first = (value + 5 * count).to_string();
                if choices.contains(&first) {
                    let second = (value + 10 * count).to_string();
                    if choices.contains(&second) {
                        warn!(correct = correct, filler = %second, "Padding choice collides");
                    }
                    second
                } else {
                    first
                }
            }
            None => format!("Option {}", count + 1),
        };
        choices.push(filler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::tests::ScriptedDraw;
    use crate::generator::{generate, generate_with};
    use crate::types::{now_millis, MAX_LEVEL, MIN_LEVEL};
    use std::collections::HashSet;

    fn problem(operation: Operation, b: u32, answer: &str) -> Problem {
        Problem {
            id: "q_test".to_string(),
            operation,
            level: 1,
            a: 0,
            b,
            display_text: String::new(),
            correct_answer: answer.to_string(),
            choices: Vec::new(),
            created_at: now_millis(),
        }
    }

    #[test]
    fn test_division_scenario_choices() {
        let mut draw = ScriptedDraw::new(&[5, 2, 3]);
        let problem = generate_with(&mut draw, Operation::Divide, 1);
        assert_eq!(make_choices(&problem), vec!["2 R 3", "1 R 3", "2 R 4", "2"]);
    }

    #[test]
    fn test_division_zero_quotient_and_remainder() {
        let choices = make_choices(&problem(Operation::Divide, 7, "0"));
        assert_eq!(choices, vec!["0", "1 R 0", "0 R 1", "1"]);
    }

    #[test]
    fn test_division_remainder_at_top_steps_down() {
        let choices = make_choices(&problem(Operation::Divide, 4, "3 R 3"));
        assert_eq!(choices, vec!["3 R 3", "2 R 3", "3 R 2", "3"]);
    }

    #[test]
    fn test_nearby_values_in_generation_order() {
        let choices = make_choices(&problem(Operation::Add, 3, "15"));
        assert_eq!(choices, vec!["15", "16", "14", "17"]);
    }

    #[test]
    fn test_negative_candidates_are_dropped() {
        let choices = make_choices(&problem(Operation::Subtract, 1, "1"));
        assert_eq!(choices, vec!["1", "2", "0", "3"]);
    }

    #[test]
    fn test_zero_answer_is_padded() {
        let choices = make_choices(&problem(Operation::Multiply, 0, "0"));
        assert_eq!(choices, vec!["0", "1", "2", "15"]);
    }

    fn seeded(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_padding_escalates_to_tens_on_collision() {
        // 10 + 5*2 = 20 is taken, so 10 + 10*2 = 30 is used
        let mut choices = seeded(&["10", "20"]);
        pad_choices(&mut choices, "10");
        assert_eq!(choices, vec!["10", "20", "30", "25"]);
    }

    #[test]
    fn test_padding_second_collision_is_best_effort() {
        // Both 0 + 15 and 0 + 30 are taken; the duplicate is kept, not retried
        let mut choices = seeded(&["0", "15", "30"]);
        pad_choices(&mut choices, "0");
        assert_eq!(choices, vec!["0", "15", "30", "30"]);
    }

    #[test]
    fn test_padding_reads_leading_quotient() {
        let mut choices = seeded(&["2 R 3"]);
        pad_choices(&mut choices, "2 R 3");
        assert_eq!(choices, vec!["2 R 3", "7", "12", "17"]);
    }

    #[test]
    fn test_non_numeric_answer_gets_placeholders() {
        let choices = make_choices(&problem(Operation::Add, 0, "banana"));
        assert_eq!(choices, vec!["banana", "Option 2", "Option 3", "Option 4"]);
    }

    #[test]
    fn test_attach_choices_keeps_problem() {
        let problem = attach_choices(problem(Operation::Add, 3, "8"));
        assert_eq!(problem.correct_answer, "8");
        assert_eq!(problem.choices.len(), CHOICE_COUNT);
    }

    #[test]
    fn test_every_generated_problem_gets_four_distinct_choices() {
        for operation in Operation::ALL {
            for level in MIN_LEVEL..=MAX_LEVEL {
                for _ in 0..300 {
                    let problem = generate(operation, level);
                    let choices = make_choices(&problem);

                    assert_eq!(choices.len(), CHOICE_COUNT);
                    assert_eq!(choices[0], problem.correct_answer);
                    let unique: HashSet<&String> = choices.iter().collect();
                    assert_eq!(unique.len(), CHOICE_COUNT, "duplicates in {:?}", choices);
                }
            }
        }
    }
}
