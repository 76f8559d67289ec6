//! Lookup of the time remaining until the next scheduled alarm.
//!
//! The daemon does not schedule alarms itself. Whatever does (a phone bridge,
//! a cron job, a calendar sync) writes the next trigger time into a plain text
//! file, one timestamp on the first non-comment line:
//!
//! ```text
//! # next alarm
//! 2026-10-18 07:30:00
//! ```
//!
//! Local `YYYY-MM-DD HH:MM:SS` and RFC 3339 with an explicit offset are accepted.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, TimeZone};

use crate::error::AlarmError;

pub const ALARM_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of the remaining time until the next alarm.
///
/// May block briefly; callers on the event loop go through `spawn_blocking`.
pub trait AlarmQuery: Send + Sync {
    /// A zero or negative delta means the alarm is already due.
    fn remaining_to_next_alarm(&self) -> Result<TimeDelta, AlarmError>;
}

/// Reads the next alarm from a text file.
#[derive(Debug, Clone)]
pub struct AlarmFile {
    path: PathBuf,
}

impl AlarmFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remaining time from `now` to the alarm recorded in the file.
    pub fn remaining_at(&self, now: DateTime<Local>) -> Result<TimeDelta, AlarmError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                return Err(match e.kind() {
                    ErrorKind::NotFound => AlarmError::NoAlarmSet,
                    ErrorKind::PermissionDenied => AlarmError::PermissionRequired,
                    _ => AlarmError::QueryFailed(format!("{}: {e}", self.path.display())),
                })
            }
        };
        let entry = next_entry(&content).ok_or(AlarmError::NoAlarmSet)?;
        let alarm = parse_alarm_time(entry)?;
        Ok(alarm.signed_duration_since(now))
    }
}

impl AlarmQuery for AlarmFile {
    fn remaining_to_next_alarm(&self) -> Result<TimeDelta, AlarmError> {
        self.remaining_at(Local::now())
    }
}

/// Parses an alarm trigger time, either RFC 3339 or local [`ALARM_TIME_FORMAT`].
pub fn parse_alarm_time(input: &str) -> Result<DateTime<Local>, AlarmError> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Local));
    }
    let parse_error = |reason: String| AlarmError::TimeParse {
        input: input.to_string(),
        reason,
    };
    let naive = NaiveDateTime::parse_from_str(input, ALARM_TIME_FORMAT)
        .map_err(|e| parse_error(e.to_string()))?;
    // Ambiguous local times (DST fall-back) resolve to the first occurrence.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| parse_error("time does not exist in the local time zone".to_string()))
}

fn next_entry(content: &str) -> Option<&str> {
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
}
