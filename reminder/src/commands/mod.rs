//! Command handlers behind the CLI
//!
//! This module organizes commands into logical submodules:
//! - `tasks`: Task CRUD and listing
//! - `pomodoro`: Foreground work/break timer

pub mod pomodoro;
pub mod tasks;

use crate::app::AppState;
use crate::config::RECONCILE_INTERVAL_SECS;
use crate::error::Result;
use crate::services::NotificationEvent;
use chrono::Local;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;

pub use pomodoro::*;
pub use tasks::*;

/// Application information structure
#[derive(Debug, Serialize)]
pub struct AppInfo {
    pub version: String,
    pub app_data_dir: String,
}

/// Get application information
pub fn get_app_info(state: &AppState) -> AppInfo {
    AppInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        app_data_dir: state.app_data_dir.to_string_lossy().to_string(),
    }
}

fn print_notification(event: &NotificationEvent) {
    println!(
        "[{}] {}: {}",
        event.fired_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        event.title,
        event.body
    );
}

/// Print a fired notification unless its task was completed or deleted
/// by another process since it was armed
async fn deliver(state: &AppState, event: &NotificationEvent) -> Result<()> {
    if state
        .reminders_service
        .active_task(&event.task_id)
        .await?
        .is_some()
    {
        print_notification(event);
    } else {
        tracing::info!("Dropping notification {} for inactive task", event.tag);
        state.reminders_service.reconcile().await?;
    }
    Ok(())
}

/// Deliver notifications for stored tasks until Ctrl-C
///
/// Other invocations write to the same store but own separate gateways, so
/// the store is re-read periodically and registered triggers follow it.
pub async fn run_reminders(state: &AppState) -> Result<()> {
    let mut events = state.gateway.subscribe();
    let restored = state.start_notifications().await?;
    println!("Watching {} active tasks (Ctrl-C to stop)", restored);

    let mut refresh = tokio::time::interval(Duration::from_secs(RECONCILE_INTERVAL_SECS));
    refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately and the restore just ran
    refresh.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if let Err(e) = deliver(state, &event).await {
                        tracing::error!("Failed to deliver {}: {}", event.tag, e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} notifications", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = refresh.tick() => {
                if let Err(e) = state.reminders_service.reconcile().await {
                    tracing::error!("Failed to refresh triggers: {}", e);
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    state.shutdown().await
}
