//! Statistics and mistake bank persistence.
//!
//! Every operation reloads the record, applies the change and writes it back.
//! Reads never fail: a missing, unreadable or corrupt record comes back as the
//! empty default. Write failures are logged and swallowed so a broken store
//! never interrupts practice.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::store::KeyValueStore;
use crate::types::{now_millis, MistakeBank, Problem, Statistics, RECORD_VERSION};

pub const STATS_KEY: &str = "math-practice-stats";
pub const MISTAKES_KEY: &str = "math-practice-mistakes";

pub struct ProgressStore<S: KeyValueStore> {
    backend: S,
}

impl<S: KeyValueStore> ProgressStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    fn try_read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.backend.get(key)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn try_write<T: Serialize>(&mut self, key: &str, record: &T) -> Result<()> {
        let json = serde_json::to_string(record)?;
        self.backend.set(key, &json)
    }

    fn read_record<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_read(key) {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                debug!(key = key, "No stored record, using defaults");
                None
            }
            Err(e) => {
                error!(key = key, error = %e, "Error loading record, using defaults");
                None
            }
        }
    }

    fn write_record<T: Serialize>(&mut self, key: &str, record: &T) {
        if let Err(e) = self.try_write(key, record) {
            error!(key = key, error = %e, "Error saving record");
        }
    }

    fn delete_record(&mut self, key: &str) {
        match self.backend.remove(key) {
            Ok(()) => info!(key = key, "Cleared record"),
            Err(e) => error!(key = key, error = %e, "Error clearing record"),
        }
    }

    pub fn load_stats(&self) -> Statistics {
        let Some(mut stats) = self.read_record::<Statistics>(STATS_KEY) else {
            return Statistics::default();
        };
        if stats.version > RECORD_VERSION {
            warn!(
                version = stats.version,
                supported = RECORD_VERSION,
                "Statistics written by a newer version"
            );
        }
        stats.reconcile();
        stats
    }

    /// Stamps `updated_at` and persists. Returns the stamped record.
    pub fn save_stats(&mut self, stats: &Statistics) -> Statistics {
        let mut stamped = stats.clone();
        stamped.version = RECORD_VERSION;
        stamped.updated_at = now_millis().max(stats.updated_at);
        self.write_record(STATS_KEY, &stamped);
        stamped
    }

    pub fn record_attempt(&mut self, got_it_right: bool, seconds: f64) -> Statistics {
        let mut stats = self.load_stats();
        stats.record_attempt(got_it_right, seconds);
        let stats = self.save_stats(&stats);

        info!(
            correct = got_it_right,
            seconds = seconds,
            attempted = stats.attempted,
            total_correct = stats.correct,
            total_incorrect = stats.incorrect,
            "Recorded attempt"
        );

        stats
    }

    pub fn clear_stats(&mut self) {
        self.delete_record(STATS_KEY);
    }

    pub fn load_mistakes(&self) -> MistakeBank {
        let Some(mut bank) = self.read_record::<MistakeBank>(MISTAKES_KEY) else {
            return MistakeBank::default();
        };
        if bank.version > RECORD_VERSION {
            warn!(
                version = bank.version,
                supported = RECORD_VERSION,
                "Mistake bank written by a newer version"
            );
        }
        bank.normalize();
        bank
    }

    pub fn save_mistakes(&mut self, bank: &MistakeBank) {
        let mut bank = bank.clone();
        bank.version = RECORD_VERSION;
        self.write_record(MISTAKES_KEY, &bank);
    }

    /// Banks a missed problem. Repeated misses of the same id are ignored.
    pub fn add_mistake(&mut self, problem: &Problem) -> MistakeBank {
        let mut bank = self.load_mistakes();
        if bank.insert(problem.clone()) {
            self.save_mistakes(&bank);
            info!(id = %problem.id, text = %problem.display_text, mistakes = bank.len(), "Added mistake");
        } else {
            debug!(id = %problem.id, "Mistake already banked");
        }
        bank
    }

    pub fn remove_mistake(&mut self, id: &str) -> MistakeBank {
        let mut bank = self.load_mistakes();
        if bank.remove(id).is_some() {
            self.save_mistakes(&bank);
            info!(id = id, mistakes = bank.len(), "Removed mistake");
        } else {
            debug!(id = id, "Mistake not banked, nothing to remove");
        }
        bank
    }

    pub fn clear_mistakes(&mut self) {
        self.delete_record(MISTAKES_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrainerError;
    use crate::generator::generate;
    use crate::store::MemoryStore;
    use crate::types::Operation;

    /// Backend whose every call fails.
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(TrainerError::Storage("unavailable".into()))
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(TrainerError::Storage("quota exceeded".into()))
        }

        fn remove(&mut self, _key: &str) -> Result<()> {
            Err(TrainerError::Storage("unavailable".into()))
        }
    }

    fn memory_store() -> ProgressStore<MemoryStore> {
        ProgressStore::new(MemoryStore::new())
    }

    #[test]
    fn test_first_load_is_zeroed() {
        let store = memory_store();
        let stats = store.load_stats();
        assert_eq!(stats.attempted, 0);
        assert_eq!(stats.correct, 0);
        assert_eq!(stats.incorrect, 0);
        assert_eq!(stats.time_spent_seconds, 0.0);
        assert!(store.load_mistakes().is_empty());
    }

    #[test]
    fn test_record_attempt_scenario() {
        let mut store = memory_store();
        store.record_attempt(true, 5.0);
        store.record_attempt(false, 3.0);
        let stats = store.record_attempt(true, 2.0);

        assert_eq!(stats.attempted, 3);
        assert_eq!(stats.correct, 2);
        assert_eq!(stats.incorrect, 1);
        assert_eq!(stats.time_spent_seconds, 10.0);
        assert_eq!(store.load_stats(), stats);
    }

    #[test]
    fn test_attempt_invariant_holds_over_many_updates() {
        let mut store = memory_store();
        let mut total = 0.0;
        for i in 0..50u32 {
            let seconds = (i % 7) as f64 * 0.5;
            total += seconds;
            let stats = store.record_attempt(i % 3 != 0, seconds);
            assert_eq!(stats.attempted, stats.correct + stats.incorrect);
        }
        let stats = store.load_stats();
        assert_eq!(stats.attempted, 50);
        assert!((stats.time_spent_seconds - total).abs() < 1e-9);
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let mut store = memory_store();
        let stats = Statistics {
            attempted: 7,
            correct: 4,
            incorrect: 3,
            time_spent_seconds: 12.5,
            ..Statistics::default()
        };
        let saved = store.save_stats(&stats);
        let loaded = store.load_stats();

        assert_eq!(loaded, saved);
        assert_eq!(loaded.attempted, 7);
        assert_eq!(loaded.time_spent_seconds, 12.5);
        assert!(loaded.updated_at >= stats.updated_at);

        let resaved = store.save_stats(&loaded);
        assert!(resaved.updated_at >= loaded.updated_at);
    }

    #[test]
    fn test_corrupt_records_degrade_to_defaults() {
        let mut store = memory_store();
        store.backend_mut().set(STATS_KEY, "{not json").unwrap();
        store.backend_mut().set(MISTAKES_KEY, "[1,2,3]").unwrap();

        assert_eq!(store.load_stats().attempted, 0);
        assert!(store.load_mistakes().is_empty());

        let stats = store.record_attempt(false, 1.0);
        assert_eq!(stats.attempted, 1);
    }

    #[test]
    fn test_overflowing_counts_load_as_defaults() {
        let mut store = memory_store();
        store
            .backend_mut()
            .set(STATS_KEY, r#"{"attempted":1,"correct":4294967295,"incorrect":1}"#)
            .unwrap();

        let stats = store.load_stats();
        assert_eq!(stats.attempted, 0);
        assert_eq!(stats.correct, 0);
        assert_eq!(stats.incorrect, 0);

        let stats = store.record_attempt(false, 2.0);
        assert_eq!(stats.attempted, 1);
        assert_eq!(stats.incorrect, 1);
    }

    #[test]
    fn test_serialization_errors_surface_from_reads() {
        let mut store = memory_store();
        store.backend_mut().set(STATS_KEY, "{not json").unwrap();
        assert!(matches!(
            store.try_read::<Statistics>(STATS_KEY),
            Err(TrainerError::Serialization(_))
        ));
    }

    #[test]
    fn test_broken_backend_never_raises() {
        let mut store = ProgressStore::new(BrokenStore);
        let stats = store.record_attempt(true, 4.0);
        assert_eq!(stats.attempted, 1);
        assert_eq!(store.load_stats().attempted, 0);

        let problem = generate(Operation::Add, 1);
        assert_eq!(store.add_mistake(&problem).len(), 1);
        assert!(store.remove_mistake(&problem.id).is_empty());
        store.clear_stats();
        store.clear_mistakes();
    }

    #[test]
    fn test_add_mistake_is_idempotent() {
        let mut store = memory_store();
        let first = generate(Operation::Subtract, 2);
        let second = generate(Operation::Divide, 3);

        store.add_mistake(&first);
        let once = store.add_mistake(&second);
        let twice = store.add_mistake(&second);

        assert_eq!(once, twice);
        assert_eq!(twice.mistake_ids, vec![first.id.clone(), second.id.clone()]);
        assert_eq!(store.load_mistakes(), twice);
    }

    #[test]
    fn test_remove_mistake() {
        let mut store = memory_store();
        let problems: Vec<Problem> = (0..3).map(|_| generate(Operation::Multiply, 2)).collect();
        for problem in &problems {
            store.add_mistake(problem);
        }

        let bank = store.remove_mistake(&problems[1].id);
        assert_eq!(bank.len(), 2);
        assert!(!bank.contains(&problems[1].id));
        assert_eq!(bank.mistake_ids, vec![problems[0].id.clone(), problems[2].id.clone()]);

        let unchanged = store.remove_mistake("q_missing");
        assert_eq!(unchanged, bank);
    }

    #[test]
    fn test_banked_problem_roundtrips_intact() {
        let mut store = memory_store();
        let problem = crate::choices::attach_choices(generate(Operation::Divide, 4));
        store.add_mistake(&problem);

        let bank = store.load_mistakes();
        assert_eq!(bank.get(&problem.id), Some(&problem));
    }

    #[test]
    fn test_clear_resets_to_defaults() {
        let mut store = memory_store();
        store.record_attempt(true, 1.0);
        store.add_mistake(&generate(Operation::Add, 1));

        store.clear_stats();
        store.clear_mistakes();

        assert_eq!(store.load_stats().attempted, 0);
        assert!(store.load_mistakes().is_empty());
        assert!(store.backend().is_empty());
    }

    #[test]
    fn test_loaded_bank_is_repaired() {
        let mut store = memory_store();
        let problem = generate(Operation::Add, 1);
        store.add_mistake(&problem);

        let raw = store.backend().get(MISTAKES_KEY).unwrap().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        value["mistakeIds"] = serde_json::json!(["q_orphan", problem.id.clone(), problem.id.clone()]);
        store.backend_mut().set(MISTAKES_KEY, &value.to_string()).unwrap();

        let bank = store.load_mistakes();
        assert_eq!(bank.mistake_ids, vec![problem.id.clone()]);
    }
}
