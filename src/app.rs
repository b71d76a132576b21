use chrono::{DateTime, Utc};
use crossterm::event::KeyCode;
use ratatui::layout::Alignment;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use tracing::{debug, info};

use crate::choices::CHOICE_COUNT;
use crate::config::Config;
use crate::error::Result;
use crate::store::KeyValueStore;
use crate::timer::CHECKPOINT_INTERVAL;
use crate::trainer::Trainer;
use crate::types::*;

pub struct App<S: KeyValueStore> {
    pub state: AppState,
    pub trainer: Trainer<S>,
    pub should_quit: bool,
    last_checkpoint: DateTime<Utc>,
}

impl<S: KeyValueStore> App<S> {
    pub fn new(trainer: Trainer<S>, config: &Config) -> Self {
        let mut app = Self {
            state: AppState {
                level: config.level,
                ..AppState::default()
            },
            trainer,
            should_quit: false,
            last_checkpoint: Utc::now(),
        };
        app.open(config.start_screen, Utc::now());
        app
    }

    fn refresh_summary(&mut self) {
        self.state.stats = self.trainer.stats();
        self.state.mistake_count = self.trainer.mistakes().len();
    }

    fn on_card_screen(&self) -> bool {
        matches!(self.state.screen, Screen::Practice(_) | Screen::Review)
    }

    pub fn open(&mut self, screen: Screen, now: DateTime<Utc>) {
        info!("Opening screen {:?}", screen);
        self.state.screen = screen;
        self.state.pending_confirm = None;
        self.state.status_line = None;

        match screen {
            Screen::Practice(operation) => {
                self.trainer.timer_mut().start(now);
                self.show_practice_problem(operation);
            }
            Screen::Review => {
                self.trainer.timer_mut().start(now);
                self.state.review_cursor = 0;
                self.show_review_problem(now);
            }
            Screen::Home | Screen::Stats => {
                self.trainer.timer_mut().pause(now);
                self.state.current = None;
                self.state.mode = AppMode::Empty;
            }
        }
        self.refresh_summary();
    }

    fn show_practice_problem(&mut self, operation: Operation) {
        let problem = self.trainer.next_problem(operation, self.state.level);
        self.state.current = Some(problem);
        self.state.selected = None;
        self.state.mode = AppMode::Front;
    }

    fn show_review_problem(&mut self, now: DateTime<Utc>) {
        match self.trainer.review_at(self.state.review_cursor) {
            Some((cursor, problem)) => {
                self.state.review_cursor = cursor;
                self.state.current = Some(problem);
                self.state.selected = None;
                self.state.mode = AppMode::Front;
            }
            None => self.show_empty(now),
        }
    }

    /// Nothing on the card, so nothing is being practiced.
    fn show_empty(&mut self, now: DateTime<Utc>) {
        self.state.current = None;
        self.state.mode = AppMode::Empty;
        self.trainer.timer_mut().pause(now);
    }

    /// Terminal focus stands in for page visibility.
    pub fn handle_focus(&mut self, focused: bool, now: DateTime<Utc>) {
        if !self.on_card_screen() || self.state.mode == AppMode::Empty {
            return;
        }
        if focused {
            self.trainer.timer_mut().resume(now);
        } else {
            self.trainer.timer_mut().pause(now);
        }
    }

    pub fn tick(&mut self, now: DateTime<Utc>) {
        let interval = chrono::Duration::from_std(CHECKPOINT_INTERVAL)
            .unwrap_or_else(|_| chrono::Duration::seconds(10));
        if now - self.last_checkpoint >= interval {
            self.trainer.timer_mut().checkpoint(now);
            self.last_checkpoint = now;
        }
    }

    pub fn handle_key(&mut self, code: KeyCode, now: DateTime<Utc>) -> Result<()> {
        match self.state.screen {
            Screen::Home => self.handle_home_key(code, now),
            Screen::Stats => self.handle_stats_key(code, now),
            Screen::Practice(_) | Screen::Review => self.handle_card_key(code, now),
        }
        Ok(())
    }

    fn handle_home_key(&mut self, code: KeyCode, now: DateTime<Utc>) {
        match code {
            KeyCode::Char(c) => {
                let operation = match c {
                    '1' | 'a' => Some(Operation::Add),
                    '2' | 's' => Some(Operation::Subtract),
                    '3' | 'm' => Some(Operation::Multiply),
                    '4' | 'd' => Some(Operation::Divide),
                    _ => None,
                };
                if let Some(operation) = operation {
                    self.open(Screen::Practice(operation), now);
                } else if c == 'r' {
                    self.open(Screen::Review, now);
                } else if c == 't' {
                    self.open(Screen::Stats, now);
                } else if c == 'q' {
                    self.should_quit = true;
                } else if c == '+' || c == '-' {
                    self.change_level(c);
                }
            }
            KeyCode::Esc => self.should_quit = true,
            _ => {}
        }
    }

    fn handle_stats_key(&mut self, code: KeyCode, now: DateTime<Utc>) {
        match code {
            KeyCode::Char(c @ ('x' | 'c')) => {
                if self.state.pending_confirm == Some(c) {
                    if c == 'x' {
                        self.trainer.reset_stats();
                        self.state.status_line = Some("Statistics reset".to_string());
                    } else {
                        self.trainer.clear_mistakes();
                        self.state.status_line = Some("Mistakes cleared!".to_string());
                    }
                    self.state.pending_confirm = None;
                    self.refresh_summary();
                } else {
                    self.state.pending_confirm = Some(c);
                    self.state.status_line = Some(format!(
                        "Press '{}' again to confirm, this cannot be undone",
                        c
                    ));
                }
            }
            KeyCode::Esc => self.open(Screen::Home, now),
            _ => {
                self.state.pending_confirm = None;
                self.state.status_line = None;
            }
        }
    }

    fn handle_card_key(&mut self, code: KeyCode, now: DateTime<Utc>) {
        match self.state.mode {
            AppMode::Front => match code {
                KeyCode::Char(c @ '1'..='4') => {
                    self.state.selected = Some(c as usize - '1' as usize);
                }
                KeyCode::Up | KeyCode::Left => self.move_selection(CHOICE_COUNT - 1),
                KeyCode::Down | KeyCode::Right | KeyCode::Tab => self.move_selection(1),
                KeyCode::Enter | KeyCode::Char(' ') => {
                    if self.state.selected.is_some() {
                        self.state.mode = AppMode::Back;
                    }
                }
                KeyCode::Char(c @ ('+' | '-')) => {
                    if let Screen::Practice(operation) = self.state.screen {
                        self.change_level(c);
                        // The skipped card's time is not charged to the next answer
                        self.trainer.timer_mut().start(now);
                        self.show_practice_problem(operation);
                    }
                }
                KeyCode::Esc => self.open(Screen::Home, now),
                _ => {}
            },
            AppMode::Back => match code {
                KeyCode::Enter | KeyCode::Char(' ') => self.assess(true, now),
                KeyCode::Esc | KeyCode::Backspace => self.assess(false, now),
                _ => {}
            },
            AppMode::Empty => match code {
                KeyCode::Enter | KeyCode::Char(' ') if self.state.screen == Screen::Review => {
                    self.state.review_cursor = 0;
                    self.trainer.timer_mut().start(now);
                    self.show_review_problem(now);
                }
                KeyCode::Esc => self.open(Screen::Home, now),
                _ => {}
            },
        }
    }

    fn move_selection(&mut self, step: usize) {
        let next = match self.state.selected {
            Some(index) => (index + step) % CHOICE_COUNT,
            None => 0,
        };
        self.state.selected = Some(next);
    }

    fn change_level(&mut self, direction: char) {
        self.state.level = match direction {
            '+' => (self.state.level + 1).min(MAX_LEVEL),
            _ => self.state.level.saturating_sub(1).max(MIN_LEVEL),
        };
        debug!(level = self.state.level, "Changed level");
    }

    fn assess(&mut self, got_it_right: bool, now: DateTime<Utc>) {
        let Some(problem) = self.state.current.take() else {
            return;
        };

        match self.state.screen {
            Screen::Practice(operation) => {
                self.state.stats = self.trainer.assess_practice(&problem, got_it_right, now);
                self.state.status_line = Some(if got_it_right {
                    "Nice work!".to_string()
                } else {
                    format!("{} = {} saved for review", problem.display_text, problem.correct_answer)
                });
                self.show_practice_problem(operation);
            }
            Screen::Review => {
                let outcome =
                    self.trainer
                        .assess_review(&problem, self.state.review_cursor, got_it_right, now);
                self.state.stats = outcome.stats;
                match outcome.next {
                    Some(cursor) => {
                        self.state.review_cursor = cursor;
                        self.show_review_problem(now);
                    }
                    None => {
                        self.show_empty(now);
                        self.state.status_line = Some(if outcome.remaining == 0 {
                            "No mistakes to review! Great job!".to_string()
                        } else {
                            format!("Review pass finished, {} left in the bank", outcome.remaining)
                        });
                    }
                }
            }
            Screen::Home | Screen::Stats => {}
        }
        self.state.mistake_count = self.trainer.mistakes().len();
    }

    pub fn render(&self, f: &mut Frame) {
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(10),  // Title
                Constraint::Percentage(80),  // Screen body
                Constraint::Percentage(10),  // Help information
            ])
            .split(f.area());

        self.render_title(f, main_chunks[0]);
        match self.state.screen {
            Screen::Home => self.render_home(f, main_chunks[1]),
            Screen::Stats => self.render_stats(f, main_chunks[1]),
            Screen::Practice(_) | Screen::Review => self.render_card(f, main_chunks[1]),
        }
        self.render_help(f, main_chunks[2]);
    }

    fn render_title(&self, f: &mut Frame, area: Rect) {
        let title = match self.state.screen {
            Screen::Home => "Math Flashcards".to_string(),
            Screen::Practice(operation) => {
                format!("{} · Level {}", operation.label(), self.state.level)
            }
            Screen::Review => format!("Review Mistakes ({} banked)", self.state.mistake_count),
            Screen::Stats => "Statistics".to_string(),
        };

        let paragraph = Paragraph::new(Line::from(vec![
            Span::styled(title, Style::default().fg(Color::Cyan))
        ]))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(Style::default().add_modifier(Modifier::BOLD));

        f.render_widget(paragraph, area);
    }

    fn render_home(&self, f: &mut Frame, area: Rect) {
        let mut text = vec![
            Line::from(Span::styled(
                "What do you want to practice?",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
        ];

        for (index, operation) in Operation::ALL.iter().enumerate() {
            text.push(Line::from(vec![
                Span::styled(format!("{}", index + 1), Style::default().fg(Color::Yellow)),
                Span::raw(format!("  {}  {}", operation.symbol(), operation.label())),
            ]));
        }

        text.push(Line::from(""));
        text.push(Line::from(vec![
            Span::styled("r", Style::default().fg(Color::Yellow)),
            Span::raw(format!("  Review mistakes ({})", self.state.mistake_count)),
        ]));
        text.push(Line::from(vec![
            Span::styled("t", Style::default().fg(Color::Yellow)),
            Span::raw(format!(
                "  Statistics ({} attempted, {}% correct)",
                self.state.stats.attempted,
                self.state.stats.accuracy_percent()
            )),
        ]));
        text.push(Line::from(""));
        text.push(Line::from(format!("Level: {} (+/- to change)", self.state.level)));

        let home = Paragraph::new(text)
            .block(Block::default().title("Home").borders(Borders::ALL))
            .alignment(Alignment::Center);

        f.render_widget(home, area);
    }

    fn render_card(&self, f: &mut Frame, area: Rect) {
        let Some(problem) = self.state.current.as_ref() else {
            let message = self
                .state
                .status_line
                .clone()
                .unwrap_or_else(|| "No mistakes to review! Great job!".to_string());
            let empty = Paragraph::new(vec![
                Line::from(""),
                Line::from(Span::styled(message, Style::default().fg(Color::Green))),
            ])
            .block(Block::default().title("Review").borders(Borders::ALL))
            .alignment(Alignment::Center);
            f.render_widget(empty, area);
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(30),  // Problem
                Constraint::Percentage(55),  // Choices or answer
                Constraint::Percentage(15),  // Status
            ])
            .split(area);

        let question = match self.state.mode {
            AppMode::Back => format!("{} = {}", problem.display_text, problem.correct_answer),
            _ => format!("{} = ?", problem.display_text),
        };
        f.render_widget(
            Paragraph::new(Line::from(Span::styled(
                question,
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )))
            .block(Block::default().title("Problem").borders(Borders::ALL))
            .alignment(Alignment::Center),
            chunks[0],
        );

        match self.state.mode {
            AppMode::Back => self.render_answer(f, chunks[1], problem),
            _ => self.render_choices(f, chunks[1], problem),
        }

        let status = self.state.status_line.clone().unwrap_or_default();
        f.render_widget(
            Paragraph::new(Line::from(Span::raw(status)))
                .block(Block::default().borders(Borders::ALL))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true }),
            chunks[2],
        );
    }

    fn render_choices(&self, f: &mut Frame, area: Rect, problem: &Problem) {
        let mut text = vec![Line::from("")];
        for (index, choice) in problem.choices.iter().enumerate() {
            let style = if self.state.selected == Some(index) {
                Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            text.push(Line::from(vec![
                Span::styled(format!("{}", index + 1), Style::default().fg(Color::Yellow)),
                Span::raw("  "),
                Span::styled(format!(" {} ", choice), style),
            ]));
        }

        f.render_widget(
            Paragraph::new(text)
                .block(Block::default().title("Choices").borders(Borders::ALL))
                .alignment(Alignment::Center),
            area,
        );
    }

    fn render_answer(&self, f: &mut Frame, area: Rect, problem: &Problem) {
        let selected = self
            .state
            .selected
            .and_then(|index| problem.choices.get(index))
            .map(String::as_str)
            .unwrap_or("");
        let correct = problem.is_correct(selected);
        let (mark, color) = if correct { ("✓", Color::Green) } else { ("✗", Color::Red) };

        let text = vec![
            Line::from(""),
            Line::from(Span::styled(
                mark,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(vec![
                Span::raw("You selected: "),
                Span::styled(selected.to_string(), Style::default().add_modifier(Modifier::BOLD)),
            ]),
        ];

        f.render_widget(
            Paragraph::new(text)
                .block(Block::default().title("Answer").borders(Borders::ALL))
                .alignment(Alignment::Center),
            area,
        );
    }

    fn render_stats(&self, f: &mut Frame, area: Rect) {
        let stats = &self.state.stats;
        let accuracy_color = match stats.accuracy_percent() {
            p if p < 80 => Color::Red,
            p if p < 90 => Color::Yellow,
            _ => Color::Green,
        };

        let row = |label: &str, value: String, color: Color| {
            Line::from(vec![
                Span::raw(format!("{:<18}", label)),
                Span::styled(value, Style::default().fg(color)),
            ])
        };

        let mut text = vec![
            Line::from(""),
            row("Attempted", stats.attempted.to_string(), Color::White),
            row("Correct", stats.correct.to_string(), Color::Green),
            row("Incorrect", stats.incorrect.to_string(), Color::Red),
            row("Accuracy", format!("{}%", stats.accuracy_percent()), accuracy_color),
            row("Time spent", format_duration(stats.time_spent_seconds), Color::Cyan),
            row("Avg per problem", format!("{:.1}s", stats.average_seconds()), Color::Cyan),
            row("Mistakes banked", self.state.mistake_count.to_string(), Color::Yellow),
            Line::from(""),
        ];

        if let Some(status) = &self.state.status_line {
            text.push(Line::from(Span::styled(
                status.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )));
        }

        f.render_widget(
            Paragraph::new(text)
                .block(Block::default().title("Progress").borders(Borders::ALL))
                .alignment(Alignment::Center),
            area,
        );
    }

    fn render_help(&self, f: &mut Frame, area: Rect) {
        let help = match (self.state.screen, self.state.mode) {
            (Screen::Home, _) => "1-4 pick operation | r review | t stats | +/- level | ESC quit",
            (Screen::Stats, _) => "x reset stats | c clear mistakes | ESC home",
            (_, AppMode::Front) => "1-4 or arrows choose | Enter flip | +/- level | ESC home",
            (_, AppMode::Back) => "Enter/Space: I got it right | ESC/Backspace: I got it wrong",
            (_, AppMode::Empty) => "Enter restart review | ESC home",
        };

        let help = Paragraph::new(Line::from(vec![Span::raw(help)]))
            .block(Block::default().borders(Borders::ALL));

        f.render_widget(help, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    fn app_on(screen: Screen) -> App<MemoryStore> {
        let config = Config {
            start_screen: screen,
            ..Config::default()
        };
        App::new(Trainer::new(MemoryStore::new()), &config)
    }

    fn answer(app: &mut App<MemoryStore>, right: bool, now: DateTime<Utc>) {
        app.handle_key(KeyCode::Char('2'), now).unwrap();
        app.handle_key(KeyCode::Enter, now).unwrap();
        assert_eq!(app.state.mode, AppMode::Back);
        let key = if right { KeyCode::Enter } else { KeyCode::Esc };
        app.handle_key(key, now).unwrap();
    }

    #[test]
    fn test_flip_requires_selection() {
        let mut app = app_on(Screen::Practice(Operation::Add));
        app.handle_key(KeyCode::Enter, at(0)).unwrap();
        assert_eq!(app.state.mode, AppMode::Front);
        app.handle_key(KeyCode::Down, at(0)).unwrap();
        assert_eq!(app.state.selected, Some(0));
        app.handle_key(KeyCode::Up, at(0)).unwrap();
        assert_eq!(app.state.selected, Some(3));
    }

    #[test]
    fn test_practice_miss_lands_in_review() {
        let mut app = app_on(Screen::Practice(Operation::Multiply));
        let missed = app.state.current.clone().unwrap();
        answer(&mut app, false, at(1));
        answer(&mut app, true, at(2));

        assert_eq!(app.state.stats.attempted, 2);
        assert_eq!(app.state.mistake_count, 1);

        app.handle_key(KeyCode::Esc, at(3)).unwrap();
        assert_eq!(app.state.screen, Screen::Home);
        app.handle_key(KeyCode::Char('r'), at(3)).unwrap();
        assert_eq!(app.state.current.as_ref().unwrap().id, missed.id);

        answer(&mut app, true, at(4));
        assert_eq!(app.state.mode, AppMode::Empty);
        assert_eq!(app.state.mistake_count, 0);
    }

    #[test]
    fn test_level_keys_are_bounded() {
        let mut app = app_on(Screen::Home);
        for _ in 0..10 {
            app.handle_key(KeyCode::Char('+'), at(0)).unwrap();
        }
        assert_eq!(app.state.level, MAX_LEVEL);
        for _ in 0..10 {
            app.handle_key(KeyCode::Char('-'), at(0)).unwrap();
        }
        assert_eq!(app.state.level, MIN_LEVEL);
    }

    #[test]
    fn test_stats_reset_needs_confirmation() {
        let mut app = app_on(Screen::Practice(Operation::Add));
        answer(&mut app, true, at(1));
        app.open(Screen::Stats, at(2));

        app.handle_key(KeyCode::Char('x'), at(2)).unwrap();
        assert_eq!(app.state.stats.attempted, 1);
        app.handle_key(KeyCode::Char('x'), at(2)).unwrap();
        assert_eq!(app.state.stats.attempted, 0);
    }

    #[test]
    fn test_finished_review_pass_does_not_count_idle_time() {
        let mut app = app_on(Screen::Home);
        app.open(Screen::Practice(Operation::Add), at(0));
        answer(&mut app, false, at(1));
        app.handle_key(KeyCode::Esc, at(2)).unwrap();

        app.handle_key(KeyCode::Char('r'), at(2)).unwrap();
        answer(&mut app, false, at(3));
        assert_eq!(app.state.mode, AppMode::Empty);
        assert!(!app.trainer.timer().is_running());

        // Focus changes while idle must not restart the clock
        app.handle_focus(false, at(100));
        app.handle_focus(true, at(200));
        assert!(!app.trainer.timer().is_running());

        app.handle_key(KeyCode::Enter, at(3603)).unwrap();
        assert_eq!(app.state.mode, AppMode::Front);
        answer(&mut app, false, at(3604));

        assert_eq!(app.state.stats.attempted, 3);
        assert_eq!(app.state.stats.time_spent_seconds, 3.0);
    }

    #[test]
    fn test_empty_bank_review_is_idle() {
        let mut app = app_on(Screen::Home);
        app.open(Screen::Review, at(0));
        assert_eq!(app.state.mode, AppMode::Empty);
        assert!(!app.trainer.timer().is_running());
    }

    #[test]
    fn test_level_change_restarts_timer() {
        let mut app = app_on(Screen::Home);
        app.open(Screen::Practice(Operation::Divide), at(0));
        app.handle_key(KeyCode::Char('+'), at(50)).unwrap();
        assert_eq!(app.state.level, 2);

        answer(&mut app, true, at(52));
        assert_eq!(app.state.stats.time_spent_seconds, 2.0);
    }

    #[test]
    fn test_focus_loss_pauses_timer() {
        let mut app = app_on(Screen::Home);
        app.open(Screen::Practice(Operation::Subtract), at(0));
        app.handle_focus(false, at(4));
        app.handle_focus(true, at(100));
        assert_eq!(app.trainer.timer().sample(at(101)), 5.0);

        answer(&mut app, true, at(101));
        assert_eq!(app.state.stats.time_spent_seconds, 5.0);
    }
}
