//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.

use crate::config::{DATABASE_FILE_NAME, JSON_STORE_FILE_NAME};
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::reminders::RetryPolicy;
use crate::services::{
    AppSettings, LocalNotificationGateway, PomodoroService, PomodoroTimer, RemindersService,
    SettingsService, StorageBackend,
};
use crate::storage::{JsonTaskStore, TaskStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub app_data_dir: PathBuf,
    pub settings: AppSettings,
    pub settings_service: SettingsService,
    pub gateway: Arc<LocalNotificationGateway>,
    pub reminders_service: RemindersService,
    pub pomodoro_service: PomodoroService,
}

impl AppState {
    /// Application setup - called once on startup
    ///
    /// The gateway is created but not started; long-running commands start
    /// it and re-arm stored triggers.
    pub async fn initialize(app_data_dir: PathBuf) -> Result<Self> {
        tracing::info!("Initializing application");
        tracing::info!("App data directory: {:?}", app_data_dir);

        tokio::fs::create_dir_all(&app_data_dir).await?;

        let settings_service = SettingsService::new(app_data_dir.clone());
        let settings = settings_service.load().await?;

        let store = open_store(&app_data_dir, settings.storage.backend).await?;
        let gateway = Arc::new(LocalNotificationGateway::new().await?);

        let reminders_service = RemindersService::new(store, gateway.clone())
            .with_retry_policy(RetryPolicy::from(&settings.scheduling))
            .with_acknowledgement_delay(settings.acknowledgement.delay());

        let pomodoro_service = PomodoroService::new(PomodoroTimer::from_settings(&settings.pomodoro));

        tracing::info!("Application initialized successfully");

        Ok(Self {
            app_data_dir,
            settings,
            settings_service,
            gateway,
            reminders_service,
            pomodoro_service,
        })
    }

    /// Start delivery and register triggers for every active task
    pub async fn start_notifications(&self) -> Result<usize> {
        self.gateway.start().await?;

        let restored = self.reminders_service.restore_triggers().await?;
        for saved in restored.iter().filter(|s| !s.is_fully_scheduled()) {
            tracing::warn!(
                "Task {} restored with {} scheduling failures",
                saved.task.id,
                saved.failures.len()
            );
        }

        Ok(restored.len())
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.gateway.shutdown().await
    }
}

async fn open_store(app_data_dir: &Path, backend: StorageBackend) -> Result<Arc<dyn TaskStore>> {
    match backend {
        StorageBackend::Sqlite => {
            let pool = create_pool(&app_data_dir.join(DATABASE_FILE_NAME)).await?;
            Ok(Arc::new(Repository::new(pool)))
        }
        StorageBackend::Json => {
            let path = app_data_dir.join(JSON_STORE_FILE_NAME);
            tracing::info!("Using JSON task store at {:?}", path);
            Ok(Arc::new(JsonTaskStore::new(path)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Recurrence, TaskFields, TaskFilter};
    use tempfile::TempDir;

    fn weekly_fields() -> TaskFields {
        TaskFields {
            title: "Water plants".to_string(),
            note: String::new(),
            due_date: None,
            recurrence: Some(Recurrence::weekly(8, 0, chrono::Weekday::Sat).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_initialize_creates_defaults() {
        let temp = TempDir::new().unwrap();
        let state = AppState::initialize(temp.path().join("data")).await.unwrap();

        assert_eq!(state.settings.storage.backend, StorageBackend::Sqlite);
        assert!(temp.path().join("data").join(DATABASE_FILE_NAME).exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tasks_survive_restart() {
        let temp = TempDir::new().unwrap();

        let id = {
            let state = AppState::initialize(temp.path().to_path_buf()).await.unwrap();
            state.reminders_service.add(weekly_fields()).await.unwrap().task.id
        };

        let state = AppState::initialize(temp.path().to_path_buf()).await.unwrap();
        let active = state.reminders_service.list(TaskFilter::Active).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, id);

        assert_eq!(state.start_notifications().await.unwrap(), 1);
        assert_eq!(
            state.gateway.registered_tags().await,
            vec![format!("{}_recurring", id)]
        );
        state.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_json_backend_selected_from_settings() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(crate::config::SETTINGS_FILE_NAME),
            r#"{"storage":{"backend":"json"}}"#,
        )
        .unwrap();

        let state = AppState::initialize(temp.path().to_path_buf()).await.unwrap();
        state.reminders_service.add(weekly_fields()).await.unwrap();

        assert!(temp.path().join(JSON_STORE_FILE_NAME).exists());
        assert!(!temp.path().join(DATABASE_FILE_NAME).exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_running_instance_follows_other_invocations() {
        let temp = TempDir::new().unwrap();
        let running = AppState::initialize(temp.path().to_path_buf()).await.unwrap();
        assert_eq!(running.start_notifications().await.unwrap(), 0);

        let other = AppState::initialize(temp.path().to_path_buf()).await.unwrap();
        let id = other.reminders_service.add(weekly_fields()).await.unwrap().task.id;
        let tag = format!("{}_recurring", id);

        running.reminders_service.reconcile().await.unwrap();
        assert_eq!(running.gateway.registered_tags().await, vec![tag]);

        other.reminders_service.complete(&id).await.unwrap();
        assert!(running.reminders_service.active_task(&id).await.unwrap().is_none());

        running.reminders_service.reconcile().await.unwrap();
        assert!(running.gateway.registered_tags().await.is_empty());

        running.shutdown().await.unwrap();
    }
}
