//! Settings service
//!
//! Manages application settings persistence using JSON file storage.

use crate::config::{
    DEFAULT_ACKNOWLEDGEMENT_DELAY_MS, DEFAULT_POMODORO_BREAK_MINUTES, DEFAULT_POMODORO_WORK_MINUTES,
    DEFAULT_SCHEDULE_ATTEMPTS, MAX_ACKNOWLEDGEMENT_DELAY_MS, MAX_POMODORO_SESSION_MINUTES,
    MAX_SCHEDULE_ATTEMPTS, MAX_SCHEDULE_BACKOFF_MS, SETTINGS_FILE_NAME,
};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

/// Which task store backs the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Json,
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// Retry policy for trigger registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingSettings {
    /// Attempts per trigger, 1 means no retry
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between attempts in milliseconds
    #[serde(default)]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_SCHEDULE_ATTEMPTS
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: 0,
        }
    }
}

/// Completion message behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcknowledgementSettings {
    #[serde(default = "default_acknowledgement_delay")]
    pub delay_ms: u64,
}

fn default_acknowledgement_delay() -> u64 {
    DEFAULT_ACKNOWLEDGEMENT_DELAY_MS
}

impl Default for AcknowledgementSettings {
    fn default() -> Self {
        Self {
            delay_ms: default_acknowledgement_delay(),
        }
    }
}

impl AcknowledgementSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Pomodoro session lengths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PomodoroSettings {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u32,
    #[serde(default = "default_break_minutes")]
    pub break_minutes: u32,
}

fn default_work_minutes() -> u32 {
    DEFAULT_POMODORO_WORK_MINUTES
}

fn default_break_minutes() -> u32 {
    DEFAULT_POMODORO_BREAK_MINUTES
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            break_minutes: default_break_minutes(),
        }
    }
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppSettings {
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub scheduling: SchedulingSettings,
    #[serde(default)]
    pub acknowledgement: AcknowledgementSettings,
    #[serde(default)]
    pub pomodoro: PomodoroSettings,
}

impl AppSettings {
    /// Reject values outside the configured limits
    pub fn validate(&self) -> Result<()> {
        let attempts = self.scheduling.max_attempts;
        if !(1..=MAX_SCHEDULE_ATTEMPTS).contains(&attempts) {
            return Err(AppError::Validation(format!(
                "scheduling.max_attempts must be between 1 and {}, got {}",
                MAX_SCHEDULE_ATTEMPTS, attempts
            )));
        }

        if self.scheduling.backoff_ms > MAX_SCHEDULE_BACKOFF_MS {
            return Err(AppError::Validation(format!(
                "scheduling.backoff_ms must be at most {}, got {}",
                MAX_SCHEDULE_BACKOFF_MS, self.scheduling.backoff_ms
            )));
        }

        if self.acknowledgement.delay_ms > MAX_ACKNOWLEDGEMENT_DELAY_MS {
            return Err(AppError::Validation(format!(
                "acknowledgement.delay_ms must be at most {}, got {}",
                MAX_ACKNOWLEDGEMENT_DELAY_MS, self.acknowledgement.delay_ms
            )));
        }

        for (name, minutes) in [
            ("pomodoro.work_minutes", self.pomodoro.work_minutes),
            ("pomodoro.break_minutes", self.pomodoro.break_minutes),
        ] {
            if !(1..=MAX_POMODORO_SESSION_MINUTES).contains(&minutes) {
                return Err(AppError::Validation(format!(
                    "{} must be between 1 and {}, got {}",
                    name, MAX_POMODORO_SESSION_MINUTES, minutes
                )));
            }
        }

        Ok(())
    }
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            settings_path: app_data_dir.join(SETTINGS_FILE_NAME),
        }
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<AppSettings> {
        if !self.settings_path.exists() {
            tracing::info!("Settings file not found, creating default settings");
            let default = AppSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Generic(format!("Failed to parse settings: {}", e)))?;
        settings.validate()?;

        Ok(settings)
    }

    /// Save settings to disk
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        settings.validate()?;

        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| AppError::Generic(format!("Failed to serialize settings: {}", e)))?;

        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }

    /// Update the trigger registration retry policy
    pub async fn update_scheduling(&self, scheduling: SchedulingSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.scheduling = scheduling;
        self.save(&settings).await
    }

    /// Update Pomodoro session lengths
    pub async fn update_pomodoro(&self, pomodoro: PomodoroSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.pomodoro = pomodoro;
        self.save(&settings).await
    }
}
