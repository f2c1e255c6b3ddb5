#![forbid(unsafe_code)]

//! Core domain model and business logic for Git Fit.
//!
//! This crate provides:
//! - Domain types (categories, cooldown, rotation state, log entries)
//! - Config loading and validation
//! - Cooldown and workout-window gate
//! - Rotation engine (selection, skip handling, refill, record)
//! - Persistence (JSON state, CSV set log)
//! - Countdown narration and the interactive session controller
//!
//! Everything assumes a single user and a single process. Individual file
//! writes are locked and atomic, but a whole session is not: two runs at once
//! race on the state file.

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod gate;
pub mod rotation;
pub mod state;
pub mod history;
pub mod announcer;
pub mod session;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use gate::GateStatus;
pub use rotation::{RandomCycle, FixedSplit, Routine, RoutineKind, Selection, SkipList};
pub use state::{JsonStateStore, MemoryStateStore, StateStore};
pub use history::{CsvSetLog, MemorySetLog, SetLog};
pub use announcer::{SpeechAnnouncer, ThreadPacer};
pub use session::{Collaborators, Outcome, Session, SessionOptions};
