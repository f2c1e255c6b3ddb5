//! Completed-set log.
//!
//! The log is a CSV file with the newest row first. Appending reads the
//! existing rows, writes header + new row + old rows to a temp file, and
//! renames it over the original. Old rows are rewritten field for field, so a
//! row this version cannot parse is still preserved.

use crate::{LogEntry, Result, LOG_TIMESTAMP_FORMAT};
use chrono::NaiveDateTime;
use csv::{ByteRecord, ReaderBuilder, WriterBuilder};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Column names, in order
pub const LOG_HEADERS: [&str; 4] = ["timestamp", "category", "exercise", "reps"];

/// Destination for completed sets
pub trait SetLog {
    fn append(&mut self, entry: &LogEntry) -> Result<()>;

    /// All readable entries, newest first
    fn entries(&self) -> Result<Vec<LogEntry>>;

    /// Reps from the most recent set of `exercise`
    fn last_reps(&self, exercise: &str) -> Result<Option<u32>> {
        Ok(self
            .entries()?
            .into_iter()
            .find(|e| e.exercise == exercise)
            .map(|e| e.reps))
    }
}

/// CSV row format
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    timestamp: String,
    category: String,
    exercise: String,
    reps: u32,
}

impl From<&LogEntry> for CsvRow {
    fn from(entry: &LogEntry) -> Self {
        CsvRow {
            timestamp: entry.timestamp.format(LOG_TIMESTAMP_FORMAT).to_string(),
            category: entry.category.clone(),
            exercise: entry.exercise.clone(),
            reps: entry.reps,
        }
    }
}

impl TryFrom<CsvRow> for LogEntry {
    type Error = crate::Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let timestamp = NaiveDateTime::parse_from_str(&row.timestamp, LOG_TIMESTAMP_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(&row.timestamp, "%Y-%m-%dT%H:%M:%S%.f"))
            .map_err(|e| {
                crate::Error::State(format!("Invalid log timestamp `{}`: {}", row.timestamp, e))
            })?;

        Ok(LogEntry {
            timestamp,
            category: row.category,
            exercise: row.exercise,
            reps: row.reps,
        })
    }
}

/// Newest-first CSV log file
pub struct CsvSetLog {
    path: PathBuf,
}

impl CsvSetLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Existing data rows as raw records, header excluded
    fn read_raw(&self) -> Result<Vec<ByteRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(&file);
        let records: std::result::Result<Vec<_>, _> = reader.byte_records().collect();

        file.unlock()?;
        Ok(records?)
    }
}

impl SetLog for CsvSetLog {
    fn append(&mut self, entry: &LogEntry) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let existing = self.read_raw()?;

        let temp = NamedTempFile::new_in(&parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_writer(temp.as_file());
            writer.write_record(LOG_HEADERS)?;
            writer.serialize(CsvRow::from(entry))?;
            for record in &existing {
                writer.write_byte_record(record)?;
            }
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(&self.path)
            .map_err(|e| crate::Error::Io(e.error))?;

        tracing::debug!(
            "Logged {} x{} to {:?} ({} earlier rows)",
            entry.exercise,
            entry.reps,
            self.path,
            existing.len()
        );
        Ok(())
    }

    /// Missing file means no history; unparsable rows are skipped
    fn entries(&self) -> Result<Vec<LogEntry>> {
        if !self.path.exists() {
            tracing::debug!("No log file at {:?}", self.path);
            return Ok(Vec::new());
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;

        let mut entries = Vec::new();
        for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
            match result {
                Ok(row) => match LogEntry::try_from(row) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => tracing::warn!("Skipping log row {}: {}", line + 2, e),
                },
                Err(e) => tracing::warn!("Failed to deserialize log row {}: {}", line + 2, e),
            }
        }

        Ok(entries)
    }
}

/// Volatile log for tests
#[derive(Debug, Default)]
pub struct MemorySetLog {
    entries: Vec<LogEntry>,
}

impl MemorySetLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with entries given newest first
    pub fn with_entries(entries: Vec<LogEntry>) -> Self {
        Self { entries }
    }
}

impl SetLog for MemorySetLog {
    fn append(&mut self, entry: &LogEntry) -> Result<()> {
        self.entries.insert(0, entry.clone());
        Ok(())
    }

    fn entries(&self) -> Result<Vec<LogEntry>> {
        Ok(self.entries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(day: u32, exercise: &str, reps: u32) -> LogEntry {
        LogEntry {
            timestamp: NaiveDate::from_ymd_opt(2024, 4, day)
                .unwrap()
                .and_hms_opt(7, 30, 0)
                .unwrap(),
            category: "push".into(),
            exercise: exercise.into(),
            reps,
        }
    }

    #[test]
    fn test_append_creates_file_with_header() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("log.csv");
        let mut log = CsvSetLog::new(&path);

        log.append(&entry(1, "pushup", 20)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("timestamp,category,exercise,reps"));
        assert_eq!(lines.next(), Some("2024-04-01 07:30:00,push,pushup,20"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_new_rows_are_prepended() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut log = CsvSetLog::new(temp_dir.path().join("log.csv"));

        log.append(&entry(1, "pushup", 20)).unwrap();
        log.append(&entry(2, "dip", 12)).unwrap();
        log.append(&entry(3, "pushup", 22)).unwrap();

        let entries = log.entries().unwrap();
        let days: Vec<_> = entries
            .iter()
            .map(|e| e.timestamp.format("%d").to_string())
            .collect();
        assert_eq!(days, vec!["03", "02", "01"]);
    }

    #[test]
    fn test_last_reps_takes_newest_match() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut log = CsvSetLog::new(temp_dir.path().join("log.csv"));

        log.append(&entry(1, "pushup", 20)).unwrap();
        log.append(&entry(2, "dip", 12)).unwrap();
        log.append(&entry(3, "pushup", 22)).unwrap();

        assert_eq!(log.last_reps("pushup").unwrap(), Some(22));
        assert_eq!(log.last_reps("dip").unwrap(), Some(12));
        assert_eq!(log.last_reps("squat").unwrap(), None);
    }

    #[test]
    fn test_missing_log_is_empty_history() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log = CsvSetLog::new(temp_dir.path().join("absent.csv"));
        assert!(log.entries().unwrap().is_empty());
        assert_eq!(log.last_reps("pushup").unwrap(), None);
    }

    #[test]
    fn test_malformed_rows_skipped_but_preserved() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("log.csv");
        std::fs::write(
            &path,
            "timestamp,category,exercise,reps\n\
             yesterday,push,pushup,lots\n\
             2024-04-01 07:30:00,pull,pullup,8\n",
        )
        .unwrap();

        let mut log = CsvSetLog::new(&path);
        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].exercise, "pullup");

        log.append(&entry(2, "dip", 10)).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "2024-04-02 07:30:00,push,dip,10");
        assert_eq!(lines[2], "yesterday,push,pushup,lots");
    }

    #[test]
    fn test_memory_log_newest_first() {
        let mut log = MemorySetLog::new();
        log.append(&entry(1, "pushup", 20)).unwrap();
        log.append(&entry(2, "pushup", 25)).unwrap();
        assert_eq!(log.last_reps("pushup").unwrap(), Some(25));
    }
}
