use std::env;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::types::{Operation, Screen, MAX_LEVEL, MIN_LEVEL};

pub const DATA_DIR_VAR: &str = "MATH_FLASHCARDS_DATA_DIR";
pub const LOG_DIR_VAR: &str = "MATH_FLASHCARDS_LOG_DIR";

const DEFAULT_DATA_DIR: &str = ".math_flashcards";
const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub start_screen: Screen,
    pub level: u8,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_screen: Screen::Home,
            level: MIN_LEVEL,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

/// Directory settings only; read before logging exists.
pub fn log_dir_from_env() -> PathBuf {
    env::var(LOG_DIR_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR))
}

fn parse_screen(arg: &str) -> Option<Screen> {
    let lowered = arg.trim_start_matches('-').to_lowercase();
    match lowered.as_str() {
        "review" | "rev" | "mistakes" => Some(Screen::Review),
        "stats" | "statistics" => Some(Screen::Stats),
        "home" => Some(Screen::Home),
        _ => arg.parse::<Operation>().ok().map(Screen::Practice),
    }
}

fn parse_level(value: &str) -> Option<u8> {
    let level: i64 = value.trim().parse().ok()?;
    Some(level.clamp(MIN_LEVEL as i64, MAX_LEVEL as i64) as u8)
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_parts(env::args().skip(1), |key| env::var(key).ok())
    }

    pub fn from_parts<I, F>(args: I, lookup: F) -> Self
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(dir) = lookup(DATA_DIR_VAR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(LOG_DIR_VAR) {
            config.log_dir = PathBuf::from(dir);
        }

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "--level" || arg == "-l" {
                match args.next().as_deref().and_then(parse_level) {
                    Some(level) => config.level = level,
                    None => warn!("Missing or invalid value for {}, keeping level {}", arg, config.level),
                }
            } else if let Some(value) = arg.strip_prefix("--level=") {
                match parse_level(value) {
                    Some(level) => config.level = level,
                    None => warn!("Invalid level '{}', keeping level {}", value, config.level),
                }
            } else if let Some(screen) = parse_screen(&arg) {
                info!("Selected start screen {:?} from argument '{}'", screen, arg);
                config.start_screen = screen;
            } else {
                warn!("Ignoring unknown argument '{}'", arg);
            }
        }

        config
    }
}
