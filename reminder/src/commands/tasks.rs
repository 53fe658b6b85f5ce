//! Task commands
//!
//! Add, edit, complete, delete and list tasks.

use crate::app::AppState;
use crate::database::{
    combine_due_date, weekday_from_iso, Recurrence, Task, TaskFields, TaskFilter, TimeOfDay,
};
use crate::error::{AppError, Result};
use crate::services::SavedTask;
use chrono::{Local, NaiveDate};
use clap::Args;

/// Editable task fields as given on the command line
#[derive(Args, Debug, Clone)]
pub struct TaskArgs {
    /// Task title
    #[arg(long)]
    pub title: String,

    /// Free-form note shown as the notification body
    #[arg(long, default_value = "")]
    pub note: String,

    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due_date: Option<NaiveDate>,

    /// Local time of day for the due date (HH:MM)
    #[arg(long, default_value = "09:00")]
    pub due_time: TimeOfDay,

    /// Repeat every N minutes (1-60)
    #[arg(long)]
    pub every_minutes: Option<u32>,

    /// Repeat every N hours (1-24)
    #[arg(long)]
    pub every_hours: Option<u32>,

    /// Repeat daily at HH:MM
    #[arg(long)]
    pub daily: Option<TimeOfDay>,

    /// Repeat weekly at HH:MM, on the day given by --weekday
    #[arg(long, requires = "weekday")]
    pub weekly: Option<TimeOfDay>,

    /// Day for --weekly, 1 = Monday through 7 = Sunday
    #[arg(long, requires = "weekly", value_parser = clap::value_parser!(u32).range(1..=7))]
    pub weekday: Option<u32>,
}

impl TaskArgs {
    fn recurrence(&self) -> Result<Option<Recurrence>> {
        let given = [
            self.every_minutes.is_some(),
            self.every_hours.is_some(),
            self.daily.is_some(),
            self.weekly.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count();

        if given > 1 {
            return Err(AppError::Validation(
                "choose at most one of --every-minutes, --every-hours, --daily, --weekly"
                    .to_string(),
            ));
        }

        if let Some(minutes) = self.every_minutes {
            return Recurrence::every_n_minutes(minutes).map(Some);
        }
        if let Some(hours) = self.every_hours {
            return Recurrence::every_n_hours(hours).map(Some);
        }
        if let Some(at) = self.daily {
            return Ok(Some(Recurrence::Daily { at }));
        }
        match (self.weekly, self.weekday) {
            (Some(at), Some(day)) => Ok(Some(Recurrence::Weekly {
                at,
                weekday: weekday_from_iso(day)?,
            })),
            (Some(_), None) => Err(AppError::Validation(
                "--weekly needs --weekday".to_string(),
            )),
            _ => Ok(None),
        }
    }

    /// Convert into validated task fields
    pub fn into_fields(self) -> Result<TaskFields> {
        let recurrence = self.recurrence()?;
        let due_date = self
            .due_date
            .map(|date| combine_due_date(date, self.due_time))
            .transpose()?;

        let fields = TaskFields {
            title: self.title,
            note: self.note,
            due_date,
            recurrence,
        };
        fields.validate()?;

        Ok(fields)
    }
}

/// Create a new task
pub async fn add_task(state: &AppState, args: TaskArgs) -> Result<SavedTask> {
    state.reminders_service.add(args.into_fields()?).await
}

/// Replace a task's fields
pub async fn edit_task(state: &AppState, id: &str, args: TaskArgs) -> Result<SavedTask> {
    state.reminders_service.update(id, args.into_fields()?).await
}

/// Mark a task completed
pub async fn complete_task(state: &AppState, id: &str) -> Result<SavedTask> {
    state.reminders_service.complete(id).await
}

/// Delete a task and its notifications
pub async fn delete_task(state: &AppState, id: &str) -> Result<()> {
    let failures = state.reminders_service.delete(id).await?;
    for failure in failures {
        tracing::warn!("Delete of {} left trigger state behind: {}", id, failure.message);
    }
    Ok(())
}

/// List tasks in a view
pub async fn list_tasks(state: &AppState, view: TaskFilter) -> Result<Vec<Task>> {
    state.reminders_service.list(view).await
}

/// One-line summary of a task for terminal output
pub fn describe_task(task: &Task) -> String {
    let mut line = format!("{}  {}", task.id, task.title);

    if let Some(due) = task.due_date {
        line.push_str(&format!(
            "  due {}",
            due.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ));
    }
    if let Some(rule) = &task.recurrence {
        line.push_str(&format!("  [{}]", rule));
    }
    if let Some(done) = task.completed_at {
        line.push_str(&format!(
            "  completed {}",
            done.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ));
    }
    if !task.note.is_empty() {
        line.push_str(&format!("\n    {}", task.note));
    }

    line
}
