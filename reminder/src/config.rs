//! Application configuration constants
//!
//! Central location for all configuration constants, resource limits,
//! and validation boundaries used throughout the application.

// ===== Recurrence Limits =====

/// Smallest minute interval a recurring task may use
pub const MIN_MINUTE_INTERVAL: u32 = 1;
/// Largest minute interval a recurring task may use
pub const MAX_MINUTE_INTERVAL: u32 = 60;

/// Smallest hour interval a recurring task may use
pub const MIN_HOUR_INTERVAL: u32 = 1;
/// Largest hour interval a recurring task may use
pub const MAX_HOUR_INTERVAL: u32 = 24;

// ===== Trigger Tags =====

/// Suffix appended to a task id for its one-shot due-date trigger
pub const DUE_TAG_SUFFIX: &str = "_due";

/// Suffix appended to a task id for its repeating or calendar trigger
pub const RECURRING_TAG_SUFFIX: &str = "_recurring";

/// Notification body used when a task has no note
pub const DEFAULT_NOTIFICATION_BODY: &str = "You have a reminder!";

// ===== Completion Acknowledgement =====

/// Message shown after a task is completed
pub const COMPLETION_MESSAGE: &str = "Good job!";

/// How long the completion message stays visible, in milliseconds
pub const DEFAULT_ACKNOWLEDGEMENT_DELAY_MS: u64 = 2_000;

/// Upper bound for the acknowledgement delay (one minute)
pub const MAX_ACKNOWLEDGEMENT_DELAY_MS: u64 = 60_000;

// ===== Scheduling Retry Limits =====

/// Default number of attempts per trigger registration (no retry)
pub const DEFAULT_SCHEDULE_ATTEMPTS: u32 = 1;

/// Maximum number of attempts per trigger registration
pub const MAX_SCHEDULE_ATTEMPTS: u32 = 10;

/// Maximum pause between two registration attempts in milliseconds
pub const MAX_SCHEDULE_BACKOFF_MS: u64 = 30_000;

/// How often a running delivery process re-reads the task store, in seconds
pub const RECONCILE_INTERVAL_SECS: u64 = 15;

// ===== Pomodoro =====

/// Default work session length in minutes
pub const DEFAULT_POMODORO_WORK_MINUTES: u32 = 25;

/// Default break length in minutes
pub const DEFAULT_POMODORO_BREAK_MINUTES: u32 = 5;

/// Longest work or break session accepted in settings (4 hours)
pub const MAX_POMODORO_SESSION_MINUTES: u32 = 240;

// ===== Storage =====

/// File name of the SQLite database inside the data directory
pub const DATABASE_FILE_NAME: &str = "reminders.db";

/// File name of the flat key-value store inside the data directory
pub const JSON_STORE_FILE_NAME: &str = "reminders.json";

/// File name of the settings document inside the data directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";
