//! Database models
//!
//! Rust structs representing task entities and their recurrence rules.
//! All models use serde so both storage backends share one encoding.

use crate::config::{MAX_HOUR_INTERVAL, MAX_MINUTE_INTERVAL, MIN_HOUR_INTERVAL, MIN_MINUTE_INTERVAL};
use crate::error::{AppError, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Wall-clock time of day used by daily and weekly rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 {
            return Err(AppError::InvalidRecurrence(format!(
                "hour must be between 0 and 23, got {}",
                hour
            )));
        }
        if minute > 59 {
            return Err(AppError::InvalidRecurrence(format!(
                "minute must be between 0 and 59, got {}",
                minute
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let (hour, minute) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| AppError::InvalidRecurrence(format!("expected HH:MM, got '{}'", s)))?;

        let hour: u32 = hour
            .parse()
            .map_err(|_| AppError::InvalidRecurrence(format!("invalid hour in '{}'", s)))?;
        let minute: u32 = minute
            .parse()
            .map_err(|_| AppError::InvalidRecurrence(format!("invalid minute in '{}'", s)))?;

        Self::new(hour, minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Map an ISO-8601 weekday number (Monday = 1 .. Sunday = 7) to a weekday
pub fn weekday_from_iso(day: u32) -> Result<Weekday> {
    match day {
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        7 => Ok(Weekday::Sun),
        _ => Err(AppError::InvalidRecurrence(format!(
            "weekday must be between 1 (Monday) and 7 (Sunday), got {}",
            day
        ))),
    }
}

/// How a task repeats
///
/// Deserialization runs [`Recurrence::validate`], so out-of-range
/// intervals never load from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", try_from = "RecurrenceRepr")]
pub enum Recurrence {
    EveryNMinutes { minutes: u32 },
    EveryNHours { hours: u32 },
    Daily { at: TimeOfDay },
    Weekly { at: TimeOfDay, weekday: Weekday },
}

/// Unchecked wire shape of [`Recurrence`]
#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RecurrenceRepr {
    EveryNMinutes { minutes: u32 },
    EveryNHours { hours: u32 },
    Daily { at: TimeOfDay },
    Weekly { at: TimeOfDay, weekday: Weekday },
}

impl TryFrom<RecurrenceRepr> for Recurrence {
    type Error = AppError;

    fn try_from(repr: RecurrenceRepr) -> Result<Self> {
        let rule = match repr {
            RecurrenceRepr::EveryNMinutes { minutes } => Recurrence::EveryNMinutes { minutes },
            RecurrenceRepr::EveryNHours { hours } => Recurrence::EveryNHours { hours },
            RecurrenceRepr::Daily { at } => Recurrence::Daily { at },
            RecurrenceRepr::Weekly { at, weekday } => Recurrence::Weekly { at, weekday },
        };
        rule.validate()?;
        Ok(rule)
    }
}

impl Recurrence {
    pub fn every_n_minutes(minutes: u32) -> Result<Self> {
        let rule = Recurrence::EveryNMinutes { minutes };
        rule.validate()?;
        Ok(rule)
    }

    pub fn every_n_hours(hours: u32) -> Result<Self> {
        let rule = Recurrence::EveryNHours { hours };
        rule.validate()?;
        Ok(rule)
    }

    pub fn daily(hour: u32, minute: u32) -> Result<Self> {
        Ok(Recurrence::Daily {
            at: TimeOfDay::new(hour, minute)?,
        })
    }

    pub fn weekly(hour: u32, minute: u32, weekday: Weekday) -> Result<Self> {
        Ok(Recurrence::Weekly {
            at: TimeOfDay::new(hour, minute)?,
            weekday,
        })
    }

    /// Check interval bounds. Time-of-day values are validated on construction.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Recurrence::EveryNMinutes { minutes } => {
                if !(MIN_MINUTE_INTERVAL..=MAX_MINUTE_INTERVAL).contains(&minutes) {
                    return Err(AppError::InvalidRecurrence(format!(
                        "minute interval must be between {} and {}, got {}",
                        MIN_MINUTE_INTERVAL, MAX_MINUTE_INTERVAL, minutes
                    )));
                }
            }
            Recurrence::EveryNHours { hours } => {
                if !(MIN_HOUR_INTERVAL..=MAX_HOUR_INTERVAL).contains(&hours) {
                    return Err(AppError::InvalidRecurrence(format!(
                        "hour interval must be between {} and {}, got {}",
                        MIN_HOUR_INTERVAL, MAX_HOUR_INTERVAL, hours
                    )));
                }
            }
            Recurrence::Daily { .. } | Recurrence::Weekly { .. } => {}
        }
        Ok(())
    }

    /// Position of the rule's kind in the Always-On listing
    pub fn sort_rank(&self) -> u8 {
        match self {
            Recurrence::EveryNMinutes { .. } => 0,
            Recurrence::EveryNHours { .. } => 1,
            Recurrence::Daily { .. } => 2,
            Recurrence::Weekly { .. } => 3,
        }
    }

    /// Storage column name of the rule's kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            Recurrence::EveryNMinutes { .. } => "minutes",
            Recurrence::EveryNHours { .. } => "hours",
            Recurrence::Daily { .. } => "daily",
            Recurrence::Weekly { .. } => "weekly",
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recurrence::EveryNMinutes { minutes } => write!(f, "every {} min", minutes),
            Recurrence::EveryNHours { hours } => write!(f, "every {} h", hours),
            Recurrence::Daily { at } => write!(f, "daily at {}", at),
            Recurrence::Weekly { at, weekday } => write!(f, "every {} at {}", weekday, at),
        }
    }
}

/// Combine a calendar date and a time of day in local time
///
/// Seconds are zeroed. Ambiguous local times resolve to the earlier instant.
pub fn combine_due_date(date: NaiveDate, at: TimeOfDay) -> Result<DateTime<Utc>> {
    let naive = date
        .and_hms_opt(at.hour(), at.minute(), 0)
        .ok_or_else(|| AppError::Validation(format!("invalid due date {} {}", date, at)))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| AppError::Validation(format!("due date {} does not exist locally", naive)))
}

/// A task with an optional due date and/or recurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub note: String,
    pub due_date: Option<DateTime<Utc>>,
    pub recurrence: Option<Recurrence>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Replace the user-editable fields
    pub fn apply(&mut self, fields: &TaskFields, now: DateTime<Utc>) {
        self.title = fields.title.clone();
        self.note = fields.note.clone();
        self.due_date = fields.due_date;
        self.recurrence = fields.recurrence;
        self.updated_at = now;
    }
}

/// User-entered fields for creating or replacing a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFields {
    pub title: String,
    #[serde(default)]
    pub note: String,
    pub due_date: Option<DateTime<Utc>>,
    pub recurrence: Option<Recurrence>,
}

impl TaskFields {
    /// Reject fields that cannot be saved
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("title is required".to_string()));
        }

        if self.due_date.is_none() && self.recurrence.is_none() {
            return Err(AppError::Validation(
                "a due date or a recurrence is required".to_string(),
            ));
        }

        if let Some(rule) = &self.recurrence {
            rule.validate()?;
        }

        Ok(())
    }
}

/// Named task views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFilter {
    /// Due-dated, not completed; by due date ascending
    ToDo,
    /// Recurring without due date, not completed; grouped by rule kind
    AlwaysOn,
    /// Completed; most recently completed first
    Done,
    /// Every task that is not completed
    Active,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            TaskFilter::ToDo => task.due_date.is_some() && !task.is_completed(),
            TaskFilter::AlwaysOn => {
                task.due_date.is_none() && task.recurrence.is_some() && !task.is_completed()
            }
            TaskFilter::Done => task.is_completed(),
            TaskFilter::Active => !task.is_completed(),
        }
    }

    /// Stable sort in the view's order
    pub fn sort(&self, tasks: &mut [Task]) {
        match self {
            TaskFilter::ToDo => tasks.sort_by_key(|t| (t.due_date, t.created_at)),
            TaskFilter::AlwaysOn => tasks.sort_by_key(|t| {
                (t.recurrence.map(|r| r.sort_rank()), t.created_at)
            }),
            TaskFilter::Done => tasks.sort_by(|a, b| b.completed_at.cmp(&a.completed_at)),
            TaskFilter::Active => tasks.sort_by_key(|t| t.created_at),
        }
    }
}

impl FromStr for TaskFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "todo" | "to-do" | "to_do" => Ok(TaskFilter::ToDo),
            "always-on" | "always_on" | "alwayson" => Ok(TaskFilter::AlwaysOn),
            "done" | "completed" => Ok(TaskFilter::Done),
            "active" => Ok(TaskFilter::Active),
            other => Err(AppError::Validation(format!("unknown task view '{}'", other))),
        }
    }
}

/// Row shape of the `tasks` table
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub note: String,
    pub due_date: Option<DateTime<Utc>>,
    pub recurrence_kind: Option<String>,
    pub recurrence_interval: Option<i64>,
    pub recurrence_hour: Option<i64>,
    pub recurrence_minute: Option<i64>,
    /// ISO-8601 weekday number, Monday = 1
    pub recurrence_weekday: Option<i64>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Flattened recurrence columns for binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecurrenceColumns {
    pub kind: Option<&'static str>,
    pub interval: Option<i64>,
    pub hour: Option<i64>,
    pub minute: Option<i64>,
    pub weekday: Option<i64>,
}

impl From<Option<Recurrence>> for RecurrenceColumns {
    fn from(rule: Option<Recurrence>) -> Self {
        let Some(rule) = rule else {
            return Self::default();
        };

        let mut columns = Self {
            kind: Some(rule.kind_name()),
            ..Self::default()
        };

        match rule {
            Recurrence::EveryNMinutes { minutes } => columns.interval = Some(i64::from(minutes)),
            Recurrence::EveryNHours { hours } => columns.interval = Some(i64::from(hours)),
            Recurrence::Daily { at } => {
                columns.hour = Some(i64::from(at.hour()));
                columns.minute = Some(i64::from(at.minute()));
            }
            Recurrence::Weekly { at, weekday } => {
                columns.hour = Some(i64::from(at.hour()));
                columns.minute = Some(i64::from(at.minute()));
                columns.weekday = Some(i64::from(weekday.number_from_monday()));
            }
        }

        columns
    }
}

fn column_u32(value: Option<i64>, column: &str, id: &str) -> Result<u32> {
    value
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| AppError::Generic(format!("task {} has invalid {}", id, column)))
}

impl TaskRow {
    fn recurrence(&self) -> Result<Option<Recurrence>> {
        let Some(kind) = self.recurrence_kind.as_deref() else {
            return Ok(None);
        };

        let rule = match kind {
            "minutes" => Recurrence::every_n_minutes(column_u32(
                self.recurrence_interval,
                "recurrence_interval",
                &self.id,
            )?)?,
            "hours" => Recurrence::every_n_hours(column_u32(
                self.recurrence_interval,
                "recurrence_interval",
                &self.id,
            )?)?,
            "daily" => Recurrence::daily(
                column_u32(self.recurrence_hour, "recurrence_hour", &self.id)?,
                column_u32(self.recurrence_minute, "recurrence_minute", &self.id)?,
            )?,
            "weekly" => Recurrence::weekly(
                column_u32(self.recurrence_hour, "recurrence_hour", &self.id)?,
                column_u32(self.recurrence_minute, "recurrence_minute", &self.id)?,
                weekday_from_iso(column_u32(
                    self.recurrence_weekday,
                    "recurrence_weekday",
                    &self.id,
                )?)?,
            )?,
            other => {
                return Err(AppError::Generic(format!(
                    "task {} has unknown recurrence kind '{}'",
                    self.id, other
                )))
            }
        };

        Ok(Some(rule))
    }
}

impl TryFrom<TaskRow> for Task {
    type Error = AppError;

    fn try_from(row: TaskRow) -> Result<Self> {
        let recurrence = row.recurrence()?;
        Ok(Task {
            id: row.id,
            title: row.title,
            note: row.note,
            due_date: row.due_date,
            recurrence,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
