//! Rotation state persistence.
//!
//! State is reached through the [`StateStore`] trait so the session can run
//! against the JSON file in production and an in-memory store in tests.
//!
//! The file store locks each individual read and write, but nothing spans the
//! whole load → session → save cycle: two concurrent runs race on the file.

use crate::{Config, Error, Result, RotationState};
use fs2::FileExt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;

impl RotationState {
    /// Every category and every exercise remaining, never executed
    pub fn fresh(config: &Config) -> Self {
        Self {
            remaining_categories: config.categories.names().map(String::from).collect(),
            remaining_exercises: config
                .categories
                .iter()
                .map(|c| (c.name.clone(), c.exercises.clone()))
                .collect(),
            last_executed: None,
        }
    }

    /// Bring a persisted snapshot in line with the current config
    ///
    /// Names no longer configured are dropped and newly configured categories
    /// join with every exercise remaining. Returns true if anything changed.
    pub fn reconcile(&mut self, config: &Config) -> bool {
        let before = self.clone();

        self.remaining_categories
            .retain(|name| config.categories.contains(name));
        dedup_in_order(&mut self.remaining_categories);

        self.remaining_exercises
            .retain(|name, _| config.categories.contains(name));

        for category in config.categories.iter() {
            match self.remaining_exercises.get_mut(&category.name) {
                Some(pool) => {
                    pool.retain(|e| category.has_exercise(e));
                    dedup_in_order(pool);
                }
                None => {
                    self.remaining_exercises
                        .insert(category.name.clone(), category.exercises.clone());
                    if !self.remaining_categories.contains(&category.name) {
                        self.remaining_categories.push(category.name.clone());
                    }
                }
            }
        }

        let changed = *self != before;
        if changed {
            tracing::info!("Reconciled rotation state with current config");
        }
        changed
    }

    /// Refill the category pool with every configured category
    pub fn refill_categories(&mut self, config: &Config) {
        tracing::info!("Category pool exhausted, starting a new cycle");
        self.remaining_categories = config.categories.names().map(String::from).collect();
    }

    /// Refill one category's exercise pool from its configured list
    pub fn refill_exercises(&mut self, config: &Config, category: &str) -> Result<()> {
        let configured = config
            .categories
            .get(category)
            .ok_or_else(|| Error::UnknownCategory(category.to_string()))?;
        tracing::info!("Exercise pool for {} exhausted, refilling", category);
        self.remaining_exercises
            .insert(category.to_string(), configured.exercises.clone());
        Ok(())
    }

    /// Remove a completed pair from both pools
    ///
    /// Fails without touching either pool if the category or the exercise is
    /// not currently remaining, so completing the same pair twice is an error.
    pub fn complete(&mut self, category: &str, exercise: &str) -> Result<()> {
        let category_idx = self
            .remaining_categories
            .iter()
            .position(|c| c == category)
            .ok_or_else(|| {
                Error::NotFound(format!("category `{}` is not in the remaining pool", category))
            })?;

        let pool = self.remaining_exercises.get_mut(category).ok_or_else(|| {
            Error::NotFound(format!("category `{}` has no exercise pool", category))
        })?;
        let exercise_idx = pool.iter().position(|e| e == exercise).ok_or_else(|| {
            Error::NotFound(format!(
                "exercise `{}` is not in the remaining pool for `{}`",
                exercise, category
            ))
        })?;

        pool.remove(exercise_idx);
        self.remaining_categories.remove(category_idx);
        tracing::debug!("Completed {} / {}", category, exercise);
        Ok(())
    }

    /// Remaining exercises for a category, empty if unknown
    pub fn exercises_remaining(&self, category: &str) -> &[String] {
        self.remaining_exercises
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

/// Storage for the rotation snapshot
pub trait StateStore {
    /// Returns `None` when nothing has been saved yet
    fn load(&self) -> Result<Option<RotationState>>;
    fn save(&mut self, state: &RotationState) -> Result<()>;
}

/// Load the saved state, or start fresh, then reconcile against config
pub fn load_or_init(store: &dyn StateStore, config: &Config) -> Result<RotationState> {
    let mut state = match store.load()? {
        Some(state) => state,
        None => {
            tracing::info!("No saved rotation, starting fresh from config");
            RotationState::fresh(config)
        }
    };
    state.reconcile(config);
    Ok(state)
}

/// JSON file store with file locking and atomic replace
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore for JsonStateStore {
    /// Load state with a shared lock
    ///
    /// A missing file yields `None`. A corrupted or unreadable file is logged
    /// and also yields `None`, so the rotation starts over.
    fn load(&self) -> Result<Option<RotationState>> {
        let path = &self.path;
        if !path.exists() {
            tracing::info!("No state file at {:?}", path);
            return Ok(None);
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open state file {:?}: {}. Starting fresh.", path, e);
                return Ok(None);
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock state file {:?}: {}. Starting fresh.", path, e);
            return Ok(None);
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!("Failed to read state file {:?}: {}. Starting fresh.", path, e);
            return Ok(None);
        }

        file.unlock()?;

        match serde_json::from_str::<RotationState>(&contents) {
            Ok(state) => {
                tracing::debug!("Loaded rotation state from {:?}", path);
                Ok(Some(state))
            }
            Err(e) => {
                tracing::warn!("Failed to parse state file {:?}: {}. Starting fresh.", path, e);
                Ok(None)
            }
        }
    }

    /// Write to a temp file, sync, then rename over the original
    fn save(&mut self, state: &RotationState) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::State(format!("state path {:?} has no parent", self.path)))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(state)?;
            writer.write_all(contents.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved rotation state to {:?}", self.path);
        Ok(())
    }
}

/// Volatile store for tests
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Option<RotationState>,
    saves: usize,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: RotationState) -> Self {
        Self {
            state: Some(state),
            saves: 0,
        }
    }

    pub fn state(&self) -> Option<&RotationState> {
        self.state.as_ref()
    }

    /// Number of successful saves
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<RotationState>> {
        Ok(self.state.clone())
    }

    fn save(&mut self, state: &RotationState) -> Result<()> {
        self.state = Some(state.clone());
        self.saves += 1;
        Ok(())
    }
}
