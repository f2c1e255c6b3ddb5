//! Configuration file support for Git Fit.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/gitfit/config.json` unless a
//! path is given. Files ending in `.toml` are parsed as TOML, anything else as
//! JSON. A missing or invalid config is fatal.

use crate::rotation::RoutineKind;
use crate::{Categories, Cooldown, Error, Result, WorkoutHours};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub cooldown: Cooldown,

    pub workout_hours: WorkoutHours,

    /// Length of the timed interval, in seconds
    pub exercise_duration: u64,

    pub routine: RoutineKind,

    pub categories: Categories,

    /// Speak countdown cues aloud (console echo is always on)
    #[serde(default = "default_speech")]
    pub speech: bool,

    /// Where state.json and log.csv live
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

fn default_speech() -> bool {
    true
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_path()?)
    }

    /// Load and validate configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Unable to read config file {:?}: {}", path, e))
        })?;

        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        let config: Config = if is_toml {
            toml::from_str(&contents)?
        } else {
            serde_json::from_str(&contents)?
        };

        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| Error::Config("Unable to determine config directory".into()))?;
        Ok(base.join("gitfit").join("config.json"))
    }

    /// Directory holding state and log files
    ///
    /// Uses `data_dir` from the config when set, otherwise the platform's
    /// local data directory.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let base = dirs::data_local_dir()
            .ok_or_else(|| Error::Config("Unable to determine data directory".into()))?;
        Ok(base.join("gitfit"))
    }

    /// Check structural rules the rotation engine depends on
    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(Error::Config("At least one category is required".into()));
        }

        for category in self.categories.iter() {
            if category.name.trim().is_empty() {
                return Err(Error::Config("Category names must not be empty".into()));
            }
            if category.exercises.is_empty() {
                return Err(Error::Config(format!(
                    "Category `{}` has no exercises",
                    category.name
                )));
            }
            let mut seen = HashSet::new();
            for exercise in &category.exercises {
                if exercise.trim().is_empty() {
                    return Err(Error::Config(format!(
                        "Category `{}` has an empty exercise name",
                        category.name
                    )));
                }
                if !seen.insert(exercise.as_str()) {
                    return Err(Error::Config(format!(
                        "Category `{}` lists `{}` more than once",
                        category.name, exercise
                    )));
                }
            }
        }

        let hours = self.workout_hours;
        if hours.end > 24 || hours.start >= hours.end {
            return Err(Error::Config(format!(
                "workout_hours must satisfy start < end <= 24 (got {}..{})",
                hours.start, hours.end
            )));
        }

        if self.exercise_duration == 0 {
            return Err(Error::Config("exercise_duration must be positive".into()));
        }

        Ok(())
    }
}
