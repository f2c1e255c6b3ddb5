//! Core domain types for Git Fit.
//!
//! This module defines the fundamental types used throughout the system:
//! - Categories and their exercises (from config)
//! - Cooldown and workout window values
//! - The persisted rotation snapshot
//! - Log entries for completed sets

use chrono::{DateTime, Duration, Local, NaiveDateTime};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Timestamp format used in the set log
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Category Types
// ============================================================================

/// A named group of exercises, in configured order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub exercises: Vec<String>,
}

impl Category {
    pub fn has_exercise(&self, exercise: &str) -> bool {
        self.exercises.iter().any(|e| e == exercise)
    }
}

/// All configured categories, keeping the order they appear in the config file
///
/// Stored as a JSON/TOML table (`{"push": ["pushup", ...]}`); the ordering is
/// what `FixedSplit` walks and what every selection pool is built from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Categories(Vec<Category>);

impl Categories {
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|c| c.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Category> {
        self.0.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N, E> FromIterator<(N, Vec<E>)> for Categories
where
    N: Into<String>,
    E: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, Vec<E>)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, exercises)| Category {
                    name: name.into(),
                    exercises: exercises.into_iter().map(Into::into).collect(),
                })
                .collect(),
        )
    }
}

impl Serialize for Categories {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for category in &self.0 {
            map.serialize_entry(&category.name, &category.exercises)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Categories {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CategoriesVisitor;

        impl<'de> Visitor<'de> for CategoriesVisitor {
            type Value = Categories;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of category name to a list of exercises")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Categories, A::Error> {
                let mut seen = HashSet::new();
                let mut categories = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, exercises)) = access.next_entry::<String, Vec<String>>()? {
                    if !seen.insert(name.clone()) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate category `{}`",
                            name
                        )));
                    }
                    categories.push(Category { name, exercises });
                }
                Ok(Categories(categories))
            }
        }

        deserializer.deserialize_map(CategoriesVisitor)
    }
}

// ============================================================================
// Timing Types
// ============================================================================

/// Minimum gap between two recorded sessions
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cooldown {
    #[serde(default)]
    pub days: u32,
    #[serde(default)]
    pub hours: u32,
    #[serde(default)]
    pub minutes: u32,
}

impl Cooldown {
    pub fn duration(&self) -> Duration {
        Duration::days(i64::from(self.days))
            + Duration::hours(i64::from(self.hours))
            + Duration::minutes(i64::from(self.minutes))
    }
}

/// Allowed local hours for a session, half-open `[start, end)`
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkoutHours {
    pub start: u32,
    pub end: u32,
}

impl Default for WorkoutHours {
    fn default() -> Self {
        Self { start: 0, end: 24 }
    }
}

// ============================================================================
// Rotation and Log Types
// ============================================================================

/// Persisted rotation snapshot
///
/// Pools are kept as ordered lists without duplicates. An empty pool is a
/// valid persisted value: it is refilled by the next selection that needs it.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RotationState {
    #[serde(default)]
    pub remaining_categories: Vec<String>,
    #[serde(default)]
    pub remaining_exercises: BTreeMap<String, Vec<String>>,
    #[serde(default, with = "last_executed_format")]
    pub last_executed: Option<DateTime<Local>>,
}

/// One completed set in the log
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: NaiveDateTime,
    pub category: String,
    pub exercise: String,
    pub reps: u32,
}

/// `last_executed` is written as RFC 3339 or `""` when never run.
///
/// Naive ISO timestamps without an offset are read as local time.
mod last_executed_format {
    use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Local>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Secs, false)),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Local>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Some(t.with_timezone(&Local)));
        }

        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .map_err(|e| {
                serde::de::Error::custom(format!("invalid last_executed `{}`: {}", raw, e))
            })?;

        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("nonexistent local time `{}`", raw)))
    }
}
