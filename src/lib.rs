//! Arithmetic flash-card trainer.
//!
//! The core is three pieces: [`generator`] builds problems, [`choices`] adds
//! plausible wrong answers, and [`progress`] keeps statistics and the mistake
//! bank in an injected [`store::KeyValueStore`]. [`trainer::Trainer`] ties
//! them together for a front-end such as the terminal [`app`].

pub mod app;
pub mod choices;
pub mod config;
pub mod error;
pub mod generator;
pub mod progress;
pub mod store;
pub mod timer;
pub mod trainer;
pub mod types;

pub use choices::make_choices;
pub use error::{Result, TrainerError};
pub use generator::generate;
pub use progress::ProgressStore;
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use timer::SessionTimer;
pub use trainer::{ReviewOutcome, Trainer};
pub use types::{MistakeBank, Operation, Problem, Statistics};
