//! Interactive session controller.
//!
//! Drives one run: gate check, selection, the confirm/change/skip prompt, the
//! timed interval, the rep prompt and the final record. At most one set is
//! recorded per run.
//!
//! ```text
//! Selecting → Presenting → AwaitingCommand ─┬─ confirm ──→ Timing → AwaitingReps → Recorded
//!     ↑                                     ├─ c / e ──→ Selecting
//!     └─────────────────────────────────────┴─ s ──────→ Skipped
//! ```

use crate::announcer::{run_countdown, Announcer, Pacer};
use crate::gate::{self, GateStatus};
use crate::history::SetLog;
use crate::rotation::{Routine, Selection, SkipList};
use crate::state::{load_or_init, StateStore};
use crate::{Config, LogEntry, Result, RotationState};
use chrono::{DateTime, Local};
use rand::RngCore;
use std::io::{BufRead, Write};

/// A command typed at the selection prompt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    Confirm,
    ChangeCategory,
    ChangeExercise,
    Skip,
}

impl SessionCommand {
    /// `y`/`1` confirm, `c` change category, `e` change exercise, `s`/`0` skip
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "y" | "1" => Some(SessionCommand::Confirm),
            "c" => Some(SessionCommand::ChangeCategory),
            "e" => Some(SessionCommand::ChangeExercise),
            "s" | "0" => Some(SessionCommand::Skip),
            _ => None,
        }
    }
}

/// A positive rep count, or `None` for anything else
pub fn parse_reps(input: &str) -> Option<u32> {
    input.trim().parse::<u32>().ok().filter(|reps| *reps > 0)
}

/// Per-run switches
#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Ignore cooldown and workout hours
    pub force: bool,
    /// Stop after showing the selection
    pub dry_run: bool,
    /// Run the narrated countdown
    pub timer: bool,
    /// Start with this category
    pub category: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            force: false,
            dry_run: false,
            timer: true,
            category: None,
        }
    }
}

/// How a run ended
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// Gate closed, nothing shown
    Blocked(GateStatus),
    /// Dry run, nothing recorded
    Previewed { category: String, exercise: String },
    /// User skipped, nothing recorded
    Skipped,
    /// Input ended before reps were entered, nothing recorded
    Abandoned,
    Recorded(LogEntry),
}

/// The session's external dependencies
pub struct Collaborators<'a> {
    pub store: &'a mut dyn StateStore,
    pub log: &'a mut dyn SetLog,
    pub announcer: &'a mut dyn Announcer,
    pub pacer: &'a mut dyn Pacer,
    pub rng: &'a mut dyn RngCore,
}

enum Step {
    Selecting,
    Presenting(Selection),
    AwaitingCommand(Selection),
    Timing(Selection),
    AwaitingReps(Selection),
}

pub struct Session<'a> {
    config: &'a Config,
    routine: &'static dyn Routine,
    state: RotationState,
    deps: Collaborators<'a>,
    skips: SkipList,
    pinned: Option<String>,
}

impl<'a> Session<'a> {
    /// Load (or initialize) rotation state and prepare a run
    pub fn new(config: &'a Config, deps: Collaborators<'a>) -> Result<Self> {
        let state = load_or_init(&*deps.store, config)?;
        Ok(Self {
            config,
            routine: config.routine.routine(),
            state,
            deps,
            skips: SkipList::new(),
            pinned: None,
        })
    }

    pub fn state(&self) -> &RotationState {
        &self.state
    }

    /// Run one session to completion
    pub fn run(
        &mut self,
        options: &SessionOptions,
        now: DateTime<Local>,
        input: &mut dyn BufRead,
        out: &mut dyn Write,
    ) -> Result<Outcome> {
        if !options.force {
            let status = gate::evaluate(self.config, &self.state, now);
            match status {
                GateStatus::Open => {}
                GateStatus::Cooldown { remaining } => {
                    writeln!(
                        out,
                        "Cooldown: next session in {}",
                        gate::format_wait(remaining)
                    )?;
                    return Ok(Outcome::Blocked(status));
                }
                GateStatus::OffHours { hour } => {
                    writeln!(
                        out,
                        "Off hours: workouts run {:02}:00-{:02}:00 (now {:02}:xx)",
                        self.config.workout_hours.start, self.config.workout_hours.end, hour
                    )?;
                    return Ok(Outcome::Blocked(status));
                }
            }
        }

        self.pinned = options.category.clone();
        writeln!(out, "Routine: {}", self.routine.name())?;

        let mut step = Step::Selecting;
        loop {
            step = match step {
                Step::Selecting => Step::Presenting(self.routine.select(
                    self.config,
                    &self.state,
                    &self.skips,
                    self.pinned.as_deref(),
                    &mut *self.deps.rng,
                )?),

                Step::Presenting(selection) => {
                    self.present(&selection, out)?;
                    if options.dry_run {
                        writeln!(out, "[Dry run - not logging]")?;
                        return Ok(Outcome::Previewed {
                            category: selection.category().to_string(),
                            exercise: selection.exercise().to_string(),
                        });
                    }
                    Step::AwaitingCommand(selection)
                }

                Step::AwaitingCommand(selection) => match prompt_command(input, out)? {
                    Some(SessionCommand::Confirm) => Step::Timing(selection),
                    Some(SessionCommand::ChangeCategory) => {
                        self.skips.skip_category(selection.category());
                        self.pinned = None;
                        Step::Selecting
                    }
                    Some(SessionCommand::ChangeExercise) => {
                        self.skips.skip_exercise(selection.exercise());
                        self.pinned = Some(selection.category().to_string());
                        Step::Selecting
                    }
                    Some(SessionCommand::Skip) | None => {
                        writeln!(out, "Skipped. Nothing logged.")?;
                        return Ok(Outcome::Skipped);
                    }
                },

                Step::Timing(selection) => {
                    if options.timer {
                        run_countdown(
                            selection.exercise(),
                            self.config.exercise_duration,
                            &mut *self.deps.announcer,
                            &mut *self.deps.pacer,
                        );
                    }
                    Step::AwaitingReps(selection)
                }

                Step::AwaitingReps(selection) => {
                    write!(out, "How many reps did you do?: ")?;
                    out.flush()?;
                    match read_line(input)? {
                        None => {
                            writeln!(out)?;
                            writeln!(out, "No reps entered. Nothing logged.")?;
                            return Ok(Outcome::Abandoned);
                        }
                        Some(line) => match parse_reps(&line) {
                            Some(reps) => return self.finish(selection, reps, now, out),
                            None => {
                                writeln!(out, "Enter a whole number greater than zero.")?;
                                Step::AwaitingReps(selection)
                            }
                        },
                    }
                }
            };
        }
    }

    fn present(&self, selection: &Selection, out: &mut dyn Write) -> Result<()> {
        writeln!(out)?;
        writeln!(out, "Category: {}", selection.category())?;
        writeln!(out, "Exercise: {}", selection.exercise())?;

        match self.deps.log.last_reps(selection.exercise()) {
            Ok(Some(reps)) => writeln!(out, "Last time: {} reps", reps)?,
            Ok(None) => {}
            Err(e) => tracing::warn!("Unable to read set history: {}", e),
        }

        writeln!(out, "--")?;
        Ok(())
    }

    /// Commit the set: engine update on a copy, log append, then state save
    fn finish(
        &mut self,
        selection: Selection,
        reps: u32,
        now: DateTime<Local>,
        out: &mut dyn Write,
    ) -> Result<Outcome> {
        let entry = LogEntry {
            timestamp: now.naive_local(),
            category: selection.category().to_string(),
            exercise: selection.exercise().to_string(),
            reps,
        };

        let mut next = self.state.clone();
        self.routine.record(self.config, &mut next, selection)?;
        next.last_executed = Some(now);

        self.deps.log.append(&entry)?;
        self.deps.store.save(&next)?;
        self.state = next;

        tracing::info!("Recorded {} / {} x{}", entry.category, entry.exercise, reps);

        writeln!(out)?;
        writeln!(out, "✓ Logged {} x {}", entry.exercise, reps)?;
        writeln!(
            out,
            "Remaining categories: {}",
            list_or_none(&self.state.remaining_categories)
        )?;
        let exercises = self.state.exercises_remaining(&entry.category);
        writeln!(
            out,
            "Remaining exercises in {}: {}",
            entry.category,
            list_or_none(exercises)
        )?;

        if exercises.is_empty() {
            writeln!(
                out,
                "★ Every {} exercise done. That pool starts over next time.",
                entry.category
            )?;
        }
        if self.state.remaining_categories.is_empty() {
            writeln!(out, "★ Cycle complete! Every category done.")?;
        }

        Ok(Outcome::Recorded(entry))
    }
}

fn prompt_command(input: &mut dyn BufRead, out: &mut dyn Write) -> Result<Option<SessionCommand>> {
    loop {
        write!(
            out,
            "[y/1] start  [c] change category  [e] change exercise  [s/0] skip\n> "
        )?;
        out.flush()?;

        let Some(line) = read_line(input)? else {
            writeln!(out)?;
            return Ok(None);
        };
        match SessionCommand::parse(&line) {
            Some(command) => return Ok(Some(command)),
            None => writeln!(out, "Unrecognized command `{}`", line.trim())?,
        }
    }
}

/// One line without its terminator, `None` at end of input
fn read_line(input: &mut dyn BufRead) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}
