use chrono::Utc;
use crossterm::{
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
        Event, KeyEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use math_flashcards::app::App;
use math_flashcards::config::{log_dir_from_env, Config};
use math_flashcards::error::{Result, TrainerError};
use math_flashcards::store::{FileStore, KeyValueStore};
use math_flashcards::trainer::Trainer;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::path::Path;
use std::{
    io,
    time::{Duration, Instant},
};

use tracing::{debug, error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

fn setup_logging(log_dir: &Path) -> Result<()> {
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "math_flashcards.log");

    // RUST_LOG wins, otherwise debug builds log more
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(file_appender)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .try_init()
        .map_err(|e| TrainerError::Terminal(e.to_string()))?;

    info!("Logging system initialized");
    debug!("Debug logging {}", if cfg!(debug_assertions) { "enabled" } else { "disabled" });

    Ok(())
}

fn main() -> Result<()> {
    setup_logging(&log_dir_from_env())?;
    info!("Starting math flashcards");

    let config = Config::from_env();
    info!(
        data_dir = %config.data_dir.display(),
        log_dir = %config.log_dir.display(),
        level = config.level,
        "Loaded configuration"
    );
    let trainer = Trainer::new(FileStore::new(config.data_dir.clone()));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(trainer, &config);

    let tick_rate = Duration::from_millis(250);
    let res = run_app(&mut terminal, &mut app, tick_rate);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableFocusChange
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("Application error: {}", err);
        println!("Error: {}", err);
    }

    let stats = app.trainer.stats();
    info!(
        attempted = stats.attempted,
        correct = stats.correct,
        incorrect = stats.incorrect,
        "Application terminated"
    );
    Ok(())
}

fn run_app<B: ratatui::backend::Backend, S: KeyValueStore>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| app.render(f))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    app.handle_key(key.code, Utc::now())?;
                }
                Event::FocusLost => app.handle_focus(false, Utc::now()),
                Event::FocusGained => app.handle_focus(true, Utc::now()),
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick(Utc::now());
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
