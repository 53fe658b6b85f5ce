//! Services module
//!
//! Business logic services that coordinate between commands, the task
//! store and the notification gateway.

pub mod gateway;
pub mod pomodoro;
pub mod reminders;
pub mod scheduler;
pub mod settings;
pub mod triggers;

pub use gateway::{NotificationEvent, NotificationGateway};
pub use pomodoro::{PomodoroService, PomodoroTimer, Session, SessionChanged};
pub use reminders::{
    GatewayOperation, RemindersService, RetryPolicy, SavedTask, SchedulingFailure, TaskChange,
};
pub use scheduler::LocalNotificationGateway;
pub use settings::{AppSettings, SettingsService, StorageBackend};
pub use triggers::{compile, Trigger, TriggerKind};
