//! Shared domain types: task/status enums, pomodoro event kinds, and the
//! fixed local zone all timestamps are anchored to.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four canonical study tasks, or the `all` aggregate used by
/// whole-day confirmations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Vocab,
    Grammar,
    Listening,
    Reading,
    All,
}

impl TaskType {
    /// The four tasks a full-done day requires.
    pub const CANONICAL: [TaskType; 4] = [
        TaskType::Vocab,
        TaskType::Grammar,
        TaskType::Listening,
        TaskType::Reading,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Vocab => "vocab",
            TaskType::Grammar => "grammar",
            TaskType::Listening => "listening",
            TaskType::Reading => "reading",
            TaskType::All => "all",
        }
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vocab" => Ok(TaskType::Vocab),
            "grammar" => Ok(TaskType::Grammar),
            "listening" => Ok(TaskType::Listening),
            "reading" => Ok(TaskType::Reading),
            "all" => Ok(TaskType::All),
            other => Err(format!("unknown task: {other}")),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-reported outcome of a task for a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    Done,
    Miss,
}

impl ConfirmationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationStatus::Done => "done",
            ConfirmationStatus::Miss => "miss",
        }
    }
}

impl FromStr for ConfirmationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "done" => Ok(ConfirmationStatus::Done),
            "miss" => Ok(ConfirmationStatus::Miss),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Phase transitions recorded in the pomodoro event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PomodoroEventKind {
    StartFocus,
    EndFocus,
    StartBreak,
    StartLongBreak,
    Pause,
    Stop,
}

impl PomodoroEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PomodoroEventKind::StartFocus => "start_focus",
            PomodoroEventKind::EndFocus => "end_focus",
            PomodoroEventKind::StartBreak => "start_break",
            PomodoroEventKind::StartLongBreak => "start_long_break",
            PomodoroEventKind::Pause => "pause",
            PomodoroEventKind::Stop => "stop",
        }
    }
}

impl FromStr for PomodoroEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start_focus" => Ok(PomodoroEventKind::StartFocus),
            "end_focus" => Ok(PomodoroEventKind::EndFocus),
            "start_break" => Ok(PomodoroEventKind::StartBreak),
            "start_long_break" => Ok(PomodoroEventKind::StartLongBreak),
            "pause" => Ok(PomodoroEventKind::Pause),
            "stop" => Ok(PomodoroEventKind::Stop),
            other => Err(format!("unknown pomodoro event: {other}")),
        }
    }
}

/// The single fixed local zone the whole ledger lives in.
///
/// Timestamps are stored as RFC 3339 strings carrying this offset, so
/// lexicographic comparison matches chronological order and day boundaries
/// are plain string ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalZone(FixedOffset);

impl LocalZone {
    /// Build from a whole-hour UTC offset. `None` if out of range.
    pub fn from_offset_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours * 3600).map(LocalZone)
    }

    pub fn offset(&self) -> FixedOffset {
        self.0
    }

    /// Current instant in the local zone.
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.0)
    }

    /// Today's local calendar date.
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Midnight at the start of `date`.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<FixedOffset> {
        self.at(date, NaiveTime::MIN)
    }

    /// Last representable instant of `date` (inclusive day boundary).
    pub fn end_of_day(&self, date: NaiveDate) -> DateTime<FixedOffset> {
        let t = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap();
        self.at(date, t)
    }

    fn at(&self, date: NaiveDate, time: NaiveTime) -> DateTime<FixedOffset> {
        // A fixed offset maps every local time to exactly one instant.
        let naive = date.and_time(time);
        DateTime::from_naive_utc_and_offset(naive - Duration::seconds(self.0.local_minus_utc() as i64), self.0)
    }
}

impl Default for LocalZone {
    fn default() -> Self {
        // Matches the deployment the coach was built for (UTC+9).
        LocalZone(FixedOffset::east_opt(9 * 3600).expect("+09:00 is in range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_round_trips_through_str() {
        for t in [
            TaskType::Vocab,
            TaskType::Grammar,
            TaskType::Listening,
            TaskType::Reading,
            TaskType::All,
        ] {
            assert_eq!(t.as_str().parse::<TaskType>().unwrap(), t);
        }
    }

    #[test]
    fn day_boundaries_are_inclusive_and_ordered() {
        let zone = LocalZone::default();
        let d = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let start = zone.start_of_day(d);
        let end = zone.end_of_day(d);
        assert!(start < end);
        assert_eq!(start.date_naive(), d);
        assert_eq!(end.date_naive(), d);
        // RFC 3339 strings with the same offset sort chronologically.
        assert!(start.to_rfc3339() < end.to_rfc3339());
    }

    #[test]
    fn end_of_day_precedes_next_day_start() {
        let zone = LocalZone::default();
        let d = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let next = d.succ_opt().unwrap();
        assert!(zone.end_of_day(d) < zone.start_of_day(next));
    }
}
