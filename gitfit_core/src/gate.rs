//! Cooldown and workout-window gate.
//!
//! Pure predicates over a supplied `now`; the session refuses to start unless
//! both pass.

use crate::{Config, Cooldown, RotationState, WorkoutHours};
use chrono::{DateTime, Duration, Local, Timelike};

/// Why a session may or may not start
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateStatus {
    Open,
    /// Cooldown has not elapsed; `remaining` until it does
    Cooldown { remaining: Duration },
    /// Current local hour is outside the workout window
    OffHours { hour: u32 },
}

impl GateStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, GateStatus::Open)
    }
}

/// True when the session has never run or at least `cooldown` has passed
pub fn cooldown_elapsed(
    cooldown: &Cooldown,
    last_executed: Option<DateTime<Local>>,
    now: DateTime<Local>,
) -> bool {
    match last_executed {
        None => true,
        Some(last) => now - last >= cooldown.duration(),
    }
}

/// Time left before the cooldown elapses, if any
pub fn cooldown_remaining(
    cooldown: &Cooldown,
    last_executed: Option<DateTime<Local>>,
    now: DateTime<Local>,
) -> Option<Duration> {
    let last = last_executed?;
    let remaining = cooldown.duration() - (now - last);
    (remaining > Duration::zero()).then_some(remaining)
}

/// True when `start <= hour(now) < end`
pub fn within_workout_hours(hours: &WorkoutHours, now: DateTime<Local>) -> bool {
    let hour = now.hour();
    hours.start <= hour && hour < hours.end
}

/// Check the cooldown first, then the window
pub fn evaluate(config: &Config, state: &RotationState, now: DateTime<Local>) -> GateStatus {
    if !cooldown_elapsed(&config.cooldown, state.last_executed, now) {
        let remaining = cooldown_remaining(&config.cooldown, state.last_executed, now)
            .unwrap_or_else(Duration::zero);
        tracing::info!("Cooldown active, {} minutes remaining", remaining.num_minutes());
        return GateStatus::Cooldown { remaining };
    }

    if !within_workout_hours(&config.workout_hours, now) {
        tracing::info!(
            "Hour {} is outside workout hours {}..{}",
            now.hour(),
            config.workout_hours.start,
            config.workout_hours.end
        );
        return GateStatus::OffHours { hour: now.hour() };
    }

    GateStatus::Open
}

/// Human-readable wait such as `1d 2h 5m`, rounded up to the minute
pub fn format_wait(wait: Duration) -> String {
    let minutes = (wait.num_seconds().max(0) + 59) / 60;
    let (days, hours, minutes) = (minutes / 1440, (minutes % 1440) / 60, minutes % 60);

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 || parts.is_empty() {
        parts.push(format!("{}m", minutes));
    }
    parts.join(" ")
}
