//! Trigger compilation
//!
//! Turns a task into the concrete alert triggers it currently needs.
//! Compilation is pure: the same task and `now` always give the same
//! triggers, and a completed task never yields any.

use crate::config::{DEFAULT_NOTIFICATION_BODY, DUE_TAG_SUFFIX, RECURRING_TAG_SUFFIX};
use crate::database::{Recurrence, Task, TimeOfDay};
use chrono::{DateTime, Utc, Weekday};
use serde::Serialize;
use std::time::Duration;

/// Tag of a task's one-shot due-date trigger
pub fn due_tag(task_id: &str) -> String {
    format!("{}{}", task_id, DUE_TAG_SUFFIX)
}

/// Tag of a task's repeating or calendar trigger
pub fn recurring_tag(task_id: &str) -> String {
    format!("{}{}", task_id, RECURRING_TAG_SUFFIX)
}

/// Every tag a task can own
pub fn task_tags(task_id: &str) -> [String; 2] {
    [due_tag(task_id), recurring_tag(task_id)]
}

/// When a trigger fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerKind {
    /// Fires exactly once
    OneShot { at: DateTime<Utc> },
    /// Fires every `period`, starting at `first_fire`
    Repeating {
        first_fire: DateTime<Utc>,
        period: Duration,
    },
    /// Fires at a local time of day, every day or on one weekday
    CalendarRepeating {
        at: TimeOfDay,
        weekday: Option<Weekday>,
    },
}

/// What the user sees when a trigger fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

impl NotificationContent {
    pub fn for_task(task: &Task) -> Self {
        let body = if task.note.trim().is_empty() {
            DEFAULT_NOTIFICATION_BODY.to_string()
        } else {
            task.note.clone()
        };

        Self {
            title: task.title.clone(),
            body,
        }
    }
}

/// A concrete alert instruction owned by one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trigger {
    pub task_id: String,
    pub tag: String,
    pub kind: TriggerKind,
    pub content: NotificationContent,
}

/// Repeat period of an interval rule, `None` for calendar rules
pub fn interval_period(rule: &Recurrence) -> Option<Duration> {
    match *rule {
        Recurrence::EveryNMinutes { minutes } => Some(Duration::from_secs(u64::from(minutes) * 60)),
        Recurrence::EveryNHours { hours } => Some(Duration::from_secs(u64::from(hours) * 3600)),
        Recurrence::Daily { .. } | Recurrence::Weekly { .. } => None,
    }
}

fn recurring_kind(rule: &Recurrence, now: DateTime<Utc>) -> TriggerKind {
    match *rule {
        Recurrence::EveryNMinutes { .. } | Recurrence::EveryNHours { .. } => {
            let period = interval_period(rule).unwrap_or_default();
            let first_fire = chrono::Duration::from_std(period)
                .map(|step| now + step)
                .unwrap_or(now);
            TriggerKind::Repeating { first_fire, period }
        }
        Recurrence::Daily { at } => TriggerKind::CalendarRepeating { at, weekday: None },
        Recurrence::Weekly { at, weekday } => TriggerKind::CalendarRepeating {
            at,
            weekday: Some(weekday),
        },
    }
}

/// Compile a task into the triggers it needs right now
///
/// A due date yields a one-shot trigger even when it lies in the past;
/// the gateway decides what to do with it.
pub fn compile(task: &Task, now: DateTime<Utc>) -> Vec<Trigger> {
    if task.is_completed() {
        return Vec::new();
    }

    let content = NotificationContent::for_task(task);
    let mut triggers = Vec::with_capacity(2);

    if let Some(at) = task.due_date {
        triggers.push(Trigger {
            task_id: task.id.clone(),
            tag: due_tag(&task.id),
            kind: TriggerKind::OneShot { at },
            content: content.clone(),
        });
    }

    if let Some(rule) = &task.recurrence {
        triggers.push(Trigger {
            task_id: task.id.clone(),
            tag: recurring_tag(&task.id),
            kind: recurring_kind(rule, now),
            content,
        });
    }

    triggers
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task(due_date: Option<DateTime<Utc>>, recurrence: Option<Recurrence>) -> Task {
        let now = Utc::now();
        Task {
            id: "task-1".to_string(),
            title: "Buy milk".to_string(),
            note: "2%".to_string(),
            due_date,
            recurrence,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn all_rules() -> Vec<Recurrence> {
        vec![
            Recurrence::every_n_minutes(1).unwrap(),
            Recurrence::every_n_minutes(60).unwrap(),
            Recurrence::every_n_hours(1).unwrap(),
            Recurrence::every_n_hours(24).unwrap(),
            Recurrence::daily(0, 0).unwrap(),
            Recurrence::daily(23, 59).unwrap(),
            Recurrence::weekly(18, 0, Weekday::Fri).unwrap(),
            Recurrence::weekly(7, 30, Weekday::Sun).unwrap(),
        ]
    }

    #[test]
    fn test_recurring_only_yields_one_matching_trigger() {
        let now = Utc::now();

        for rule in all_rules() {
            let triggers = compile(&task(None, Some(rule)), now);
            assert_eq!(triggers.len(), 1, "rule {:?}", rule);

            let trigger = &triggers[0];
            assert_eq!(trigger.tag, "task-1_recurring");

            match (rule, &trigger.kind) {
                (Recurrence::EveryNMinutes { minutes }, TriggerKind::Repeating { period, .. }) => {
                    assert_eq!(period.as_secs(), u64::from(minutes) * 60)
                }
                (Recurrence::EveryNHours { hours }, TriggerKind::Repeating { period, .. }) => {
                    assert_eq!(period.as_secs(), u64::from(hours) * 3600)
                }
                (Recurrence::Daily { at }, TriggerKind::CalendarRepeating { at: t, weekday }) => {
                    assert_eq!(at, *t);
                    assert!(weekday.is_none());
                }
                (
                    Recurrence::Weekly { at, weekday },
                    TriggerKind::CalendarRepeating { at: t, weekday: w },
                ) => {
                    assert_eq!(at, *t);
                    assert_eq!(Some(weekday), *w);
                }
                (rule, kind) => panic!("rule {:?} compiled to {:?}", rule, kind),
            }
        }
    }

    #[test]
    fn test_completed_task_yields_nothing() {
        let now = Utc::now();
        let mut done = task(Some(now), Some(Recurrence::daily(9, 0).unwrap()));
        done.completed_at = Some(now);

        assert!(compile(&done, now).is_empty());

        for rule in all_rules() {
            let mut done = task(None, Some(rule));
            done.completed_at = Some(now);
            assert!(compile(&done, now).is_empty());
        }
    }

    #[test]
    fn test_due_and_recurring_yield_two_distinct_tags() {
        let now = Utc::now();
        let triggers = compile(
            &task(Some(now), Some(Recurrence::every_n_hours(3).unwrap())),
            now,
        );

        assert_eq!(triggers.len(), 2);
        assert_ne!(triggers[0].tag, triggers[1].tag);
        assert_eq!(triggers[0].tag, "task-1_due");
        assert_eq!(triggers[1].tag, "task-1_recurring");
    }

    #[test]
    fn test_due_date_compiles_to_one_shot() {
        let due = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let triggers = compile(&task(Some(due), None), Utc::now());

        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].kind, TriggerKind::OneShot { at: due });
        assert_eq!(triggers[0].content.title, "Buy milk");
        assert_eq!(triggers[0].content.body, "2%");
    }

    #[test]
    fn test_past_due_date_is_not_filtered() {
        let now = Utc::now();
        let past = now - chrono::Duration::days(3);

        let triggers = compile(&task(Some(past), None), now);
        assert_eq!(triggers[0].kind, TriggerKind::OneShot { at: past });
    }

    #[test]
    fn test_interval_first_fire_is_one_period_after_now() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let triggers = compile(&task(None, Some(Recurrence::every_n_minutes(15).unwrap())), now);

        assert_eq!(
            triggers[0].kind,
            TriggerKind::Repeating {
                first_fire: Utc.with_ymd_and_hms(2025, 1, 1, 12, 15, 0).unwrap(),
                period: Duration::from_secs(900),
            }
        );
    }

    #[test]
    fn test_compile_is_deterministic() {
        let now = Utc::now();
        let t = task(Some(now), Some(Recurrence::every_n_hours(2).unwrap()));

        assert_eq!(compile(&t, now), compile(&t, now));
    }

    #[test]
    fn test_empty_note_uses_default_body() {
        let mut t = task(Some(Utc::now()), None);
        t.note = String::new();

        let triggers = compile(&t, Utc::now());
        assert_eq!(triggers[0].content.body, DEFAULT_NOTIFICATION_BODY);
    }
}
