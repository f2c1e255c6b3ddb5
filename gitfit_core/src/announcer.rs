//! Spoken countdown for the timed interval.
//!
//! Speech is best effort: every cue is echoed to the console, and a failed
//! text-to-speech call only disables speech for the rest of the run.

use crate::{Error, Result};
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

/// Pause before the five-second count
pub const PREPARE_SECONDS: u64 = 5;

/// Durations at or above this get the thirty-second cue
pub const THIRTY_SECOND_CUE_MIN: u64 = 45;

const COUNT_IN: [&str; 5] = ["Five", "Four", "Three", "Two", "One"];

/// Something that can say a cue
pub trait Announcer {
    fn announce(&mut self, text: &str);
}

/// Something that can wait
pub trait Pacer {
    fn pause(&mut self, duration: Duration);
}

/// Blocks the current thread
#[derive(Debug, Default)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Echoes cues to a writer and, when enabled, speaks them
pub struct SpeechAnnouncer<W: Write> {
    out: W,
    speech: bool,
    /// Replaces the platform command; the cue is passed as the only argument
    program: Option<String>,
}

impl SpeechAnnouncer<std::io::Stdout> {
    pub fn stdout(speech: bool) -> Self {
        Self::new(std::io::stdout(), speech)
    }
}

impl<W: Write> SpeechAnnouncer<W> {
    pub fn new(out: W, speech: bool) -> Self {
        Self {
            out,
            speech,
            program: None,
        }
    }

    /// Speak through `program` instead of the platform default
    pub fn with_program(out: W, program: impl Into<String>) -> Self {
        Self {
            out,
            speech: true,
            program: Some(program.into()),
        }
    }

    pub fn speech_enabled(&self) -> bool {
        self.speech
    }

    fn speak(&self, text: &str) -> Result<()> {
        match &self.program {
            Some(program) => {
                let mut command = Command::new(program);
                command.arg(text);
                run_speech(command)
            }
            None => speak(text),
        }
    }
}

impl<W: Write> Announcer for SpeechAnnouncer<W> {
    fn announce(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text).and_then(|_| self.out.flush()) {
            tracing::warn!("Failed to echo cue: {}", e);
        }

        if self.speech {
            if let Err(e) = self.speak(text) {
                tracing::warn!("{}. Continuing without speech.", e);
                self.speech = false;
            }
        }
    }
}

/// Run the platform text-to-speech command and wait for it
pub fn speak(text: &str) -> Result<()> {
    let command = speech_command(text)
        .ok_or_else(|| Error::Speech("No text-to-speech command for this platform".into()))?;
    run_speech(command)
}

fn run_speech(mut command: Command) -> Result<()> {
    let status = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| Error::Speech(format!("Failed to start speech command: {}", e)))?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::Speech(format!("Speech command exited with {}", status)))
    }
}

fn speech_command(text: &str) -> Option<Command> {
    if cfg!(target_os = "macos") {
        let mut command = Command::new("say");
        command.arg(text);
        Some(command)
    } else if cfg!(target_os = "windows") {
        let script = format!(
            "Add-Type -AssemblyName System.Speech; \
             (New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak('{}')",
            text.replace('\'', "''")
        );
        let mut command = Command::new("powershell");
        command.args(["-NoProfile", "-Command", &script]);
        Some(command)
    } else if cfg!(target_os = "linux") {
        let mut command = Command::new("espeak");
        command.arg(text);
        Some(command)
    } else {
        None
    }
}

/// Narrate one interval of `duration_secs`
///
/// Get-ready cue, a five-second pause, a "Five".."One", "Go" count-in, then
/// the interval itself with a thirty-second cue (only when the interval is at
/// least 45 s long) and a fifteen-second cue. Intervals shorter than fifteen
/// seconds still run the final fifteen.
pub fn run_countdown(
    exercise: &str,
    duration_secs: u64,
    announcer: &mut dyn Announcer,
    pacer: &mut dyn Pacer,
) {
    tracing::debug!("Starting {}s interval for {}", duration_secs, exercise);

    announcer.announce(&format!("Get ready for {}", exercise));
    pacer.pause(Duration::from_secs(PREPARE_SECONDS));

    for word in COUNT_IN {
        announcer.announce(word);
        pacer.pause(Duration::from_secs(1));
    }
    announcer.announce("Go");

    if duration_secs >= THIRTY_SECOND_CUE_MIN {
        pacer.pause(Duration::from_secs(duration_secs - 30));
        announcer.announce("Thirty seconds remaining");
        pacer.pause(Duration::from_secs(15));
    } else {
        pacer.pause(Duration::from_secs(duration_secs.saturating_sub(15)));
    }

    announcer.announce("Fifteen seconds remaining");
    pacer.pause(Duration::from_secs(15));
    announcer.announce("Time! Set complete");
}
