use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::choices::attach_choices;
use crate::generator::{generate_with, Draw, RandomDraw};
use crate::progress::ProgressStore;
use crate::store::KeyValueStore;
use crate::timer::SessionTimer;
use crate::types::{MistakeBank, Operation, Problem, Statistics};

/// Where a review pass goes after a self-assessment.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub stats: Statistics,
    pub remaining: usize,
    /// Index of the next problem to show, `None` when the pass is over.
    pub next: Option<usize>,
}

/// Entry point for a front-end: hands out problems and records outcomes.
pub struct Trainer<S: KeyValueStore> {
    progress: ProgressStore<S>,
    timer: SessionTimer,
    draw: Box<dyn Draw>,
}

impl<S: KeyValueStore> Trainer<S> {
    pub fn new(backend: S) -> Self {
        Self::with_draw(backend, Box::new(RandomDraw::thread()))
    }

    pub fn with_draw(backend: S, draw: Box<dyn Draw>) -> Self {
        Self {
            progress: ProgressStore::new(backend),
            timer: SessionTimer::new(),
            draw,
        }
    }

    pub fn progress(&self) -> &ProgressStore<S> {
        &self.progress
    }

    pub fn timer(&self) -> &SessionTimer {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut SessionTimer {
        &mut self.timer
    }

    /// A fresh problem with its choices attached.
    pub fn next_problem(&mut self, operation: Operation, level: u8) -> Problem {
        attach_choices(generate_with(self.draw.as_mut(), operation, level))
    }

    pub fn stats(&self) -> Statistics {
        self.progress.load_stats()
    }

    pub fn mistakes(&self) -> MistakeBank {
        self.progress.load_mistakes()
    }

    /// Banked problems oldest-first, each with freshly generated choices.
    pub fn review_queue(&self) -> Vec<Problem> {
        self.mistakes().ordered().cloned().map(attach_choices).collect()
    }

    /// The review problem at `cursor`, clamped into the current bank.
    pub fn review_at(&self, cursor: usize) -> Option<(usize, Problem)> {
        let bank = self.mistakes();
        if bank.is_empty() {
            return None;
        }
        let cursor = cursor.min(bank.len() - 1);
        let problem = bank.get(&bank.mistake_ids[cursor])?.clone();
        Some((cursor, attach_choices(problem)))
    }

    pub fn assess_practice(
        &mut self,
        problem: &Problem,
        got_it_right: bool,
        now: DateTime<Utc>,
    ) -> Statistics {
        let seconds = self.timer.take(now);
        let stats = self.progress.record_attempt(got_it_right, seconds);
        if !got_it_right {
            self.progress.add_mistake(problem);
        }
        stats
    }

    pub fn assess_review(
        &mut self,
        problem: &Problem,
        cursor: usize,
        got_it_right: bool,
        now: DateTime<Utc>,
    ) -> ReviewOutcome {
        let seconds = self.timer.take(now);
        let stats = self.progress.record_attempt(got_it_right, seconds);

        if got_it_right {
            let bank = self.progress.remove_mistake(&problem.id);
            let remaining = bank.len();
            // The following problem slides into the cursor's slot
            let next = if remaining == 0 {
                info!("Mistake bank cleared by review");
                None
            } else {
                Some(cursor.min(remaining - 1))
            };
            ReviewOutcome { stats, remaining, next }
        } else {
            let remaining = self.progress.load_mistakes().len();
            if remaining == 0 {
                warn!(id = %problem.id, "Reviewed problem is no longer banked");
            }
            let next = (cursor + 1 < remaining).then_some(cursor + 1);
            ReviewOutcome { stats, remaining, next }
        }
    }

    pub fn reset_stats(&mut self) {
        self.progress.clear_stats();
    }

    pub fn clear_mistakes(&mut self) {
        self.progress.clear_mistakes();
    }
}
