//! Rotation engine for picking the next category and exercise.
//!
//! Each cycle works through a shrinking pool of categories, and each category
//! through a shrinking pool of exercises:
//! - Skipped names are filtered out of a pool before choosing
//! - A pool that is empty after filtering is refilled from the config,
//!   ignoring the skip list
//! - The most recently skipped name is not offered again while another
//!   candidate exists
//!
//! `select` never mutates state. The [`Selection`] it returns remembers which
//! pools it refilled, and `record` consumes it to commit those refills along
//! with the removal.

use crate::{Config, Error, Result, RotationState};
use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a selection drew its candidates from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolSource {
    /// The persisted remaining pool
    Remaining,
    /// The full configured list, because the remaining pool was exhausted
    Refill,
}

/// A chosen category/exercise pair, valid for exactly one `record`
#[derive(Debug, PartialEq, Eq)]
pub struct Selection {
    category: String,
    exercise: String,
    category_source: PoolSource,
    exercise_source: PoolSource,
}

impl Selection {
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn exercise(&self) -> &str {
        &self.exercise
    }

    pub fn category_source(&self) -> PoolSource {
        self.category_source
    }

    pub fn exercise_source(&self) -> PoolSource {
        self.exercise_source
    }
}

/// Names the user turned down during the current session, oldest first
#[derive(Clone, Debug, Default)]
pub struct SkipList {
    categories: Vec<String>,
    exercises: Vec<String>,
}

impl SkipList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip_category(&mut self, category: impl Into<String>) {
        self.categories.push(category.into());
    }

    pub fn skip_exercise(&mut self, exercise: impl Into<String>) {
        self.exercises.push(exercise.into());
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    pub fn has_exercise(&self, exercise: &str) -> bool {
        self.exercises.iter().any(|e| e == exercise)
    }

    pub fn last_category(&self) -> Option<&str> {
        self.categories.last().map(String::as_str)
    }

    pub fn last_exercise(&self) -> Option<&str> {
        self.exercises.last().map(String::as_str)
    }
}

/// A rotation strategy
///
/// Implementations only decide which candidate to take; pool filtering,
/// refill and the anti-repeat rule are shared.
pub trait Routine {
    fn name(&self) -> &'static str;

    /// Choose one of `candidates` (never empty)
    fn pick<'a>(&self, candidates: &[&'a str], rng: &mut dyn RngCore) -> Option<&'a str>;

    /// Choose the next pair without touching `state`
    ///
    /// With `pinned`, that category is used as long as it is still selectable
    /// this cycle and only the exercise is chosen.
    fn select(
        &self,
        config: &Config,
        state: &RotationState,
        skips: &SkipList,
        pinned: Option<&str>,
        rng: &mut dyn RngCore,
    ) -> Result<Selection> {
        let (category, category_source) = match pinned {
            Some(name) => pinned_category(config, state, skips, name)?,
            None => {
                let (pool, source) = category_pool(config, state, skips);
                let candidates = without_repeat(pool, skips.last_category());
                let category = self.pick(&candidates, rng).ok_or_else(|| {
                    Error::Rotation("No categories configured".into())
                })?;
                (category, source)
            }
        };

        let (pool, exercise_source) = exercise_pool(config, state, skips, category)?;
        let candidates = without_repeat(pool, skips.last_exercise());
        let exercise = self.pick(&candidates, rng).ok_or_else(|| {
            Error::Rotation(format!("No exercises configured for `{}`", category))
        })?;

        tracing::info!(
            "{} selected {} / {} (categories: {:?}, exercises: {:?})",
            self.name(),
            category,
            exercise,
            category_source,
            exercise_source
        );

        Ok(Selection {
            category: category.to_string(),
            exercise: exercise.to_string(),
            category_source,
            exercise_source,
        })
    }

    /// Commit a completed selection: apply its refills, then remove the pair
    ///
    /// All-or-nothing; on error `state` is unchanged.
    fn record(
        &self,
        config: &Config,
        state: &mut RotationState,
        selection: Selection,
    ) -> Result<()> {
        let mut next = state.clone();

        if selection.category_source == PoolSource::Refill {
            next.refill_categories(config);
        }
        if selection.exercise_source == PoolSource::Refill {
            next.refill_exercises(config, &selection.category)?;
        }

        next.complete(&selection.category, &selection.exercise)?;
        *state = next;
        Ok(())
    }
}

/// Uniform random choice
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomCycle;

impl Routine for RandomCycle {
    fn name(&self) -> &'static str {
        "RandomCycle"
    }

    fn pick<'a>(&self, candidates: &[&'a str], rng: &mut dyn RngCore) -> Option<&'a str> {
        candidates.choose(rng).copied()
    }
}

/// Deterministic split: always the first candidate in config order
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedSplit;

impl Routine for FixedSplit {
    fn name(&self) -> &'static str {
        "FixedSplit"
    }

    fn pick<'a>(&self, candidates: &[&'a str], _rng: &mut dyn RngCore) -> Option<&'a str> {
        candidates.first().copied()
    }
}

static RANDOM_CYCLE: RandomCycle = RandomCycle;
static FIXED_SPLIT: FixedSplit = FixedSplit;

/// Routine selector as written in the config file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RoutineKind {
    RandomCycle,
    FixedSplit,
}

impl RoutineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutineKind::RandomCycle => "RandomCycle",
            RoutineKind::FixedSplit => "FixedSplit",
        }
    }

    /// The strategy instance registered for this kind
    pub fn routine(self) -> &'static dyn Routine {
        match self {
            RoutineKind::RandomCycle => &RANDOM_CYCLE,
            RoutineKind::FixedSplit => &FIXED_SPLIT,
        }
    }
}

impl fmt::Display for RoutineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RandomCycle" | "random_cycle" | "random" => Ok(RoutineKind::RandomCycle),
            "FixedSplit" | "fixed_split" | "FourDaySplit" | "four_day_split" => {
                Ok(RoutineKind::FixedSplit)
            }
            other => Err(Error::Config(format!(
                "Unknown routine `{}` (expected RandomCycle or FixedSplit)",
                other
            ))),
        }
    }
}

impl TryFrom<String> for RoutineKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RoutineKind> for String {
    fn from(kind: RoutineKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Remaining, unskipped categories in config order; everything if none are left
fn category_pool<'c>(
    config: &'c Config,
    state: &RotationState,
    skips: &SkipList,
) -> (Vec<&'c str>, PoolSource) {
    let pool: Vec<&str> = config
        .categories
        .names()
        .filter(|name| state.remaining_categories.iter().any(|c| c == name))
        .filter(|name| !skips.has_category(name))
        .collect();

    if pool.is_empty() {
        (config.categories.names().collect(), PoolSource::Refill)
    } else {
        (pool, PoolSource::Remaining)
    }
}

fn pinned_category<'c>(
    config: &'c Config,
    state: &RotationState,
    skips: &SkipList,
    name: &str,
) -> Result<(&'c str, PoolSource)> {
    let category = config
        .categories
        .get(name)
        .ok_or_else(|| Error::UnknownCategory(name.to_string()))?;
    let name = category.name.as_str();

    let (pool, source) = category_pool(config, state, skips);
    if pool.contains(&name) {
        Ok((name, source))
    } else if state.remaining_categories.iter().any(|c| c == name) {
        Ok((name, PoolSource::Remaining))
    } else {
        Err(Error::Rotation(format!(
            "Category `{}` is already done this cycle",
            name
        )))
    }
}

/// Remaining, unskipped exercises for `category`; its full list if none are left
fn exercise_pool<'c>(
    config: &'c Config,
    state: &RotationState,
    skips: &SkipList,
    category: &str,
) -> Result<(Vec<&'c str>, PoolSource)> {
    let configured = config
        .categories
        .get(category)
        .ok_or_else(|| Error::UnknownCategory(category.to_string()))?;
    let remaining = state.exercises_remaining(category);

    let pool: Vec<&str> = configured
        .exercises
        .iter()
        .map(String::as_str)
        .filter(|e| remaining.iter().any(|r| r == e))
        .filter(|e| !skips.has_exercise(e))
        .collect();

    if pool.is_empty() {
        Ok((
            configured.exercises.iter().map(String::as_str).collect(),
            PoolSource::Refill,
        ))
    } else {
        Ok((pool, PoolSource::Remaining))
    }
}

/// Drop the just-skipped name, unless it is the only candidate
fn without_repeat<'a>(pool: Vec<&'a str>, last_skipped: Option<&str>) -> Vec<&'a str> {
    match last_skipped {
        Some(skipped) if pool.len() > 1 => {
            pool.into_iter().filter(|c| *c != skipped).collect()
        }
        _ => pool,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Categories, Cooldown, WorkoutHours};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn config_with(routine: RoutineKind, categories: Vec<(&str, Vec<&str>)>) -> Config {
        Config {
            cooldown: Cooldown::default(),
            workout_hours: WorkoutHours::default(),
            exercise_duration: 60,
            routine,
            categories: Categories::from_iter(categories),
            speech: false,
            data_dir: None,
        }
    }

    fn push_pull() -> Config {
        config_with(
            RoutineKind::RandomCycle,
            vec![("push", vec!["pushup"]), ("pull", vec!["pullup"])],
        )
    }

    fn three_categories(routine: RoutineKind) -> Config {
        config_with(
            routine,
            vec![
                ("push", vec!["pushup", "dip", "pike"]),
                ("pull", vec!["pullup", "row"]),
                ("legs", vec!["squat", "lunge"]),
            ],
        )
    }

    #[test]
    fn test_select_returns_configured_pair() {
        let config = three_categories(RoutineKind::RandomCycle);
        let state = RotationState::fresh(&config);

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let selection = RandomCycle
                .select(&config, &state, &SkipList::new(), None, &mut rng)
                .unwrap();
            let category = config.categories.get(selection.category()).unwrap();
            assert!(category.has_exercise(selection.exercise()));
            assert_eq!(selection.category_source(), PoolSource::Remaining);
        }
    }

    #[test]
    fn test_select_does_not_mutate_state() {
        let config = three_categories(RoutineKind::RandomCycle);
        let mut state = RotationState::fresh(&config);
        state.remaining_categories.clear();
        let before = state.clone();

        let mut rng = StdRng::seed_from_u64(7);
        let selection = RandomCycle
            .select(&config, &state, &SkipList::new(), None, &mut rng)
            .unwrap();

        assert_eq!(selection.category_source(), PoolSource::Refill);
        assert_eq!(state, before);
    }

    #[test]
    fn test_push_pull_scenario() {
        let config = push_pull();
        let mut state = RotationState::fresh(&config);
        let mut rng = StdRng::seed_from_u64(1);

        let first = RandomCycle
            .select(&config, &state, &SkipList::new(), None, &mut rng)
            .unwrap();
        let first_category = first.category().to_string();
        let expected_exercise = if first_category == "push" { "pushup" } else { "pullup" };
        assert_eq!(first.exercise(), expected_exercise);

        RandomCycle.record(&config, &mut state, first).unwrap();
        assert!(state.exercises_remaining(&first_category).is_empty());

        let second = RandomCycle
            .select(&config, &state, &SkipList::new(), None, &mut rng)
            .unwrap();
        assert_ne!(second.category(), first_category);
    }

    #[test]
    fn test_refill_after_cycle_exhausted() {
        let config = three_categories(RoutineKind::RandomCycle);
        let mut state = RotationState::fresh(&config);
        let mut rng = StdRng::seed_from_u64(42);

        let mut done = HashSet::new();
        for _ in 0..3 {
            let selection = RandomCycle
                .select(&config, &state, &SkipList::new(), None, &mut rng)
                .unwrap();
            assert_eq!(selection.category_source(), PoolSource::Remaining);
            assert!(done.insert(selection.category().to_string()));
            RandomCycle.record(&config, &mut state, selection).unwrap();
        }
        assert!(state.remaining_categories.is_empty());

        let mut seen = HashSet::new();
        for seed in 0..60 {
            let mut rng = StdRng::seed_from_u64(seed);
            let selection = RandomCycle
                .select(&config, &state, &SkipList::new(), None, &mut rng)
                .unwrap();
            assert_eq!(selection.category_source(), PoolSource::Refill);
            seen.insert(selection.category().to_string());
        }
        let all: HashSet<String> = config.categories.names().map(String::from).collect();
        assert_eq!(seen, all);

        let selection = RandomCycle
            .select(&config, &state, &SkipList::new(), None, &mut rng)
            .unwrap();
        let chosen = selection.category().to_string();
        RandomCycle.record(&config, &mut state, selection).unwrap();
        assert_eq!(state.remaining_categories.len(), 2);
        assert!(!state.remaining_categories.contains(&chosen));
    }

    #[test]
    fn test_exercise_pool_refill_is_committed_on_record() {
        let config = three_categories(RoutineKind::RandomCycle);
        let mut state = RotationState::fresh(&config);
        state.remaining_exercises.insert("pull".into(), vec![]);
        state.remaining_categories = vec!["pull".into()];

        let mut rng = StdRng::seed_from_u64(3);
        let selection = RandomCycle
            .select(&config, &state, &SkipList::new(), None, &mut rng)
            .unwrap();
        assert_eq!(selection.category(), "pull");
        assert_eq!(selection.exercise_source(), PoolSource::Refill);

        let exercise = selection.exercise().to_string();
        RandomCycle.record(&config, &mut state, selection).unwrap();

        let remaining = state.exercises_remaining("pull");
        assert_eq!(remaining.len(), 1);
        assert!(!remaining.contains(&exercise));
    }

    #[test]
    fn test_skipped_categories_filtered() {
        let config = three_categories(RoutineKind::RandomCycle);
        let state = RotationState::fresh(&config);
        let mut skips = SkipList::new();
        skips.skip_category("push");
        skips.skip_category("legs");

        for seed in 0..30 {
            let mut rng = StdRng::seed_from_u64(seed);
            let selection = RandomCycle
                .select(&config, &state, &skips, None, &mut rng)
                .unwrap();
            assert_eq!(selection.category(), "pull");
        }
    }

    #[test]
    fn test_anti_repeat_after_forced_refill() {
        let config = three_categories(RoutineKind::RandomCycle);
        let mut state = RotationState::fresh(&config);
        state.remaining_categories = vec!["push".into()];

        let mut skips = SkipList::new();
        skips.skip_category("push");

        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let selection = RandomCycle
                .select(&config, &state, &skips, None, &mut rng)
                .unwrap();
            assert_eq!(selection.category_source(), PoolSource::Refill);
            assert_ne!(selection.category(), "push");
        }
    }

    #[test]
    fn test_anti_repeat_exercise_with_two_candidates() {
        let config = three_categories(RoutineKind::RandomCycle);
        let mut state = RotationState::fresh(&config);
        state.remaining_exercises.insert("legs".into(), vec!["squat".into()]);

        let mut skips = SkipList::new();
        skips.skip_exercise("squat");

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let selection = RandomCycle
                .select(&config, &state, &skips, Some("legs"), &mut rng)
                .unwrap();
            assert_eq!(selection.exercise(), "lunge");
            assert_eq!(selection.exercise_source(), PoolSource::Refill);
        }
    }

    #[test]
    fn test_single_exercise_repeat_terminates() {
        let config = push_pull();
        let state = RotationState::fresh(&config);
        let mut skips = SkipList::new();
        skips.skip_exercise("pullup");

        let mut rng = StdRng::seed_from_u64(9);
        let selection = RandomCycle
            .select(&config, &state, &skips, Some("pull"), &mut rng)
            .unwrap();
        assert_eq!(selection.exercise(), "pullup");
    }

    #[test]
    fn test_record_twice_fails() {
        let config = push_pull();
        let mut state = RotationState::fresh(&config);
        let mut rng = StdRng::seed_from_u64(5);

        let selection = RandomCycle
            .select(&config, &state, &SkipList::new(), None, &mut rng)
            .unwrap();
        let category = selection.category().to_string();
        let exercise = selection.exercise().to_string();
        RandomCycle.record(&config, &mut state, selection).unwrap();

        let before = state.clone();
        assert!(matches!(
            state.complete(&category, &exercise),
            Err(Error::NotFound(_))
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn test_pinned_category() {
        let config = three_categories(RoutineKind::RandomCycle);
        let mut state = RotationState::fresh(&config);
        let mut rng = StdRng::seed_from_u64(11);

        let selection = RandomCycle
            .select(&config, &state, &SkipList::new(), Some("legs"), &mut rng)
            .unwrap();
        assert_eq!(selection.category(), "legs");

        let unknown = RandomCycle.select(&config, &state, &SkipList::new(), Some("arms"), &mut rng);
        assert!(matches!(unknown, Err(Error::UnknownCategory(_))));

        RandomCycle.record(&config, &mut state, selection).unwrap();
        let done = RandomCycle.select(&config, &state, &SkipList::new(), Some("legs"), &mut rng);
        assert!(matches!(done, Err(Error::Rotation(_))));
    }

    #[test]
    fn test_pinned_category_after_cycle_uses_refill() {
        let config = three_categories(RoutineKind::RandomCycle);
        let mut state = RotationState::fresh(&config);
        state.remaining_categories.clear();
        let mut rng = StdRng::seed_from_u64(5);

        let selection = RandomCycle
            .select(&config, &state, &SkipList::new(), Some("legs"), &mut rng)
            .unwrap();
        assert_eq!(selection.category(), "legs");
        assert_eq!(selection.category_source(), PoolSource::Refill);
        assert!(state.remaining_categories.is_empty());

        RandomCycle.record(&config, &mut state, selection).unwrap();
        assert_eq!(state.remaining_categories, vec!["push", "pull"]);
    }

    #[test]
    fn test_fixed_split_walks_config_order() {
        let config = three_categories(RoutineKind::FixedSplit);
        let routine = config.routine.routine();
        let mut state = RotationState::fresh(&config);
        let mut rng = StdRng::seed_from_u64(0);

        let mut order = Vec::new();
        for _ in 0..4 {
            let selection = routine
                .select(&config, &state, &SkipList::new(), None, &mut rng)
                .unwrap();
            order.push((selection.category().to_string(), selection.exercise().to_string()));
            routine.record(&config, &mut state, selection).unwrap();
        }

        assert_eq!(
            order,
            vec![
                ("push".to_string(), "pushup".to_string()),
                ("pull".to_string(), "pullup".to_string()),
                ("legs".to_string(), "squat".to_string()),
                ("push".to_string(), "dip".to_string()),
            ]
        );
    }

    #[test]
    fn test_fixed_split_skip_moves_to_next() {
        let config = three_categories(RoutineKind::FixedSplit);
        let state = RotationState::fresh(&config);
        let mut skips = SkipList::new();
        skips.skip_category("push");
        let mut rng = StdRng::seed_from_u64(0);

        let selection = FixedSplit
            .select(&config, &state, &skips, None, &mut rng)
            .unwrap();
        assert_eq!(selection.category(), "pull");
    }

    #[test]
    fn test_routine_kind_parsing() {
        assert_eq!("RandomCycle".parse::<RoutineKind>().unwrap(), RoutineKind::RandomCycle);
        assert_eq!("FourDaySplit".parse::<RoutineKind>().unwrap(), RoutineKind::FixedSplit);
        assert!("Zumba".parse::<RoutineKind>().is_err());

        let kind: RoutineKind = serde_json::from_str("\"fixed_split\"").unwrap();
        assert_eq!(kind, RoutineKind::FixedSplit);
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"FixedSplit\"");
        assert_eq!(kind.routine().name(), "FixedSplit");
    }
}
