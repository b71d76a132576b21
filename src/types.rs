use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::TrainerError;

/// Format version written into every persisted record.
pub const RECORD_VERSION: u32 = 1;

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 5;

/// Current time truncated to whole milliseconds, the resolution records are stored at.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "add")]
    Add,
    #[serde(rename = "sub")]
    Subtract,
    #[serde(rename = "mul")]
    Multiply,
    #[serde(rename = "div")]
    Divide,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Subtract => "sub",
            Operation::Multiply => "mul",
            Operation::Divide => "div",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operation::Add => "+",
            Operation::Subtract => "−",
            Operation::Multiply => "×",
            Operation::Divide => "÷",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Operation::Add => "Addition",
            Operation::Subtract => "Subtraction",
            Operation::Multiply => "Multiplication",
            Operation::Divide => "Division",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Operation {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Symbols first, "-" would otherwise be eaten by the dash trimming
        match s.trim() {
            "+" => return Ok(Operation::Add),
            "-" | "−" => return Ok(Operation::Subtract),
            "*" | "x" | "×" => return Ok(Operation::Multiply),
            "/" | "÷" => return Ok(Operation::Divide),
            _ => {}
        }

        let arg = s.trim().trim_start_matches('-').to_lowercase();
        match arg.as_str() {
            "add" | "addition" | "plus" => Ok(Operation::Add),
            "sub" | "subtract" | "subtraction" | "minus" => Ok(Operation::Subtract),
            "mul" | "multiply" | "multiplication" | "times" => Ok(Operation::Multiply),
            "div" | "divide" | "division" => Ok(Operation::Divide),
            _ => Err(TrainerError::InvalidInput(format!(
                "unknown operation '{}'",
                s
            ))),
        }
    }
}

/// One generated arithmetic exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    pub operation: Operation,
    pub level: u8,
    pub a: u32,
    pub b: u32,
    #[serde(rename = "text", alias = "displayText")]
    pub display_text: String,
    pub correct_answer: String,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Problem {
    /// Attaches answer choices, consuming the choice-less problem.
    pub fn with_choices(mut self, choices: Vec<String>) -> Self {
        self.choices = choices;
        self
    }

    pub fn is_correct(&self, answer: &str) -> bool {
        answer.trim() == self.correct_answer
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Statistics {
    pub version: u32,
    pub attempted: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub time_spent_seconds: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            version: RECORD_VERSION,
            attempted: 0,
            correct: 0,
            incorrect: 0,
            time_spent_seconds: 0.0,
            updated_at: now_millis(),
        }
    }
}

impl Statistics {
    pub fn record_attempt(&mut self, success: bool, seconds: f64) {
        self.attempted = self.attempted.saturating_add(1);
        if success {
            self.correct = self.correct.saturating_add(1);
        } else {
            self.incorrect = self.incorrect.saturating_add(1);
        }

        if seconds.is_finite() && seconds > 0.0 {
            self.time_spent_seconds += seconds;
        } else if seconds != 0.0 {
            warn!(seconds = seconds, "Ignoring invalid elapsed time");
        }
    }

    /// Restores `attempted == correct + incorrect` on records edited outside the app.
    /// Counters that cannot be reconciled reset the record to zero.
    pub fn reconcile(&mut self) -> bool {
        let Some(expected) = self.correct.checked_add(self.incorrect) else {
            warn!(
                correct = self.correct,
                incorrect = self.incorrect,
                "Stored outcome counts overflow, discarding statistics"
            );
            *self = Statistics::default();
            return true;
        };
        let mut changed = false;
        if self.attempted != expected {
            warn!(
                attempted = self.attempted,
                correct = self.correct,
                incorrect = self.incorrect,
                "Stored attempt count disagrees with outcomes, recomputing"
            );
            self.attempted = expected;
            changed = true;
        }
        if !self.time_spent_seconds.is_finite() || self.time_spent_seconds < 0.0 {
            warn!(time_spent = self.time_spent_seconds, "Resetting invalid stored time");
            self.time_spent_seconds = 0.0;
            changed = true;
        }
        changed
    }

    pub fn accuracy_percent(&self) -> u32 {
        if self.attempted == 0 {
            return 0;
        }
        (self.correct as f64 / self.attempted as f64 * 100.0).round() as u32
    }

    pub fn average_seconds(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.time_spent_seconds / self.attempted as f64
    }
}

/// Previously missed problems, kept in the order they were first missed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MistakeBank {
    pub version: u32,
    pub questions_by_id: HashMap<String, Problem>,
    pub mistake_ids: Vec<String>,
}

impl Default for MistakeBank {
    fn default() -> Self {
        Self {
            version: RECORD_VERSION,
            questions_by_id: HashMap::new(),
            mistake_ids: Vec::new(),
        }
    }
}

impl MistakeBank {
    pub fn len(&self) -> usize {
        self.mistake_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mistake_ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.questions_by_id.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Problem> {
        self.questions_by_id.get(id)
    }

    /// Returns false when the id is already banked.
    pub fn insert(&mut self, problem: Problem) -> bool {
        if self.questions_by_id.contains_key(&problem.id) {
            return false;
        }
        self.mistake_ids.push(problem.id.clone());
        self.questions_by_id.insert(problem.id.clone(), problem);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<Problem> {
        let removed = self.questions_by_id.remove(id)?;
        self.mistake_ids.retain(|existing| existing != id);
        Some(removed)
    }

    /// Problems oldest-first.
    pub fn ordered(&self) -> impl Iterator<Item = &Problem> {
        self.mistake_ids
            .iter()
            .filter_map(|id| self.questions_by_id.get(id))
    }

    /// Drops duplicate and orphaned ids and re-links unlisted entries.
    /// Returns true if anything was repaired.
    pub fn normalize(&mut self) -> bool {
        let before = self.mistake_ids.len();
        let mut seen = HashSet::new();
        let questions = &self.questions_by_id;
        self.mistake_ids
            .retain(|id| questions.contains_key(id) && seen.insert(id.clone()));
        let dropped = before - self.mistake_ids.len();

        let mut unlisted: Vec<&Problem> = self
            .questions_by_id
            .values()
            .filter(|problem| !seen.contains(&problem.id))
            .collect();
        unlisted.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let relinked: Vec<String> = unlisted.iter().map(|problem| problem.id.clone()).collect();
        let appended = relinked.len();
        self.mistake_ids.extend(relinked);

        if dropped > 0 || appended > 0 {
            warn!(
                dropped_ids = dropped,
                relinked_entries = appended,
                "Repaired inconsistent mistake bank"
            );
            true
        } else {
            debug!(mistakes = self.mistake_ids.len(), "Mistake bank consistent");
            false
        }
    }
}

/// Renders accumulated seconds as "42s", "3m 07s" or "1h 02m".
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    Practice(Operation),
    Review,
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Front,      // Choosing an answer
    Back,       // Answer revealed, waiting for self-assessment
    Empty,      // Nothing to show (review bank drained)
}

#[derive(Debug)]
pub struct AppState {
    pub screen: Screen,
    pub mode: AppMode,
    pub level: u8,
    pub current: Option<Problem>,
    pub selected: Option<usize>,
    pub review_cursor: usize,
    pub stats: Statistics,
    pub mistake_count: usize,
    pub pending_confirm: Option<char>,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            screen: Screen::Home,
            mode: AppMode::Empty,
            level: MIN_LEVEL,
            current: None,
            selected: None,
            review_cursor: 0,
            stats: Statistics::default(),
            mistake_count: 0,
            pending_confirm: None,
            status_line: None,
        }
    }
}
