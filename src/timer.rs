use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

/// How often the front-end folds running time into the total.
pub const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerState {
    Idle,
    Running { since: DateTime<Utc> },
}

/// Active-time accumulator for one practice session.
///
/// Time only counts while `Running`; the front-end pauses the timer when the
/// terminal loses focus so an abandoned session does not inflate the totals.
#[derive(Debug, Clone)]
pub struct SessionTimer {
    state: TimerState,
    accumulated: f64,
}

impl Default for SessionTimer {
    fn default() -> Self {
        Self::new()
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_milliseconds() as f64 / 1000.0).max(0.0)
}

impl SessionTimer {
    pub fn new() -> Self {
        Self {
            state: TimerState::Idle,
            accumulated: 0.0,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running { .. })
    }

    /// Starts a fresh measurement, discarding anything accumulated.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.accumulated = 0.0;
        self.state = TimerState::Running { since: now };
        debug!("Session timer started");
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        if let TimerState::Running { since } = self.state {
            self.accumulated += seconds_between(since, now);
            self.state = TimerState::Idle;
            debug!(accumulated = self.accumulated, "Session timer paused");
        }
    }

    pub fn resume(&mut self, now: DateTime<Utc>) {
        if self.state == TimerState::Idle {
            self.state = TimerState::Running { since: now };
            debug!(accumulated = self.accumulated, "Session timer resumed");
        }
    }

    pub fn checkpoint(&mut self, now: DateTime<Utc>) {
        if let TimerState::Running { since } = self.state {
            self.accumulated += seconds_between(since, now);
            self.state = TimerState::Running { since: now };
        }
    }

    /// Accumulated seconds, including the currently running stretch.
    pub fn sample(&self, now: DateTime<Utc>) -> f64 {
        match self.state {
            TimerState::Running { since } => self.accumulated + seconds_between(since, now),
            TimerState::Idle => self.accumulated,
        }
    }

    /// Samples and starts counting again from zero, keeping the current state.
    pub fn take(&mut self, now: DateTime<Utc>) -> f64 {
        let elapsed = self.sample(now);
        self.accumulated = 0.0;
        if self.is_running() {
            self.state = TimerState::Running { since: now };
        }
        elapsed
    }

    pub fn reset(&mut self) {
        self.accumulated = 0.0;
        self.state = TimerState::Idle;
    }
}
