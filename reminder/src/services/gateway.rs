//! Notification gateway contract
//!
//! The gateway owns delivery. It accepts compiled triggers and emits a
//! [`NotificationEvent`] whenever one fires.

use crate::error::Result;
use crate::services::triggers::Trigger;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Payload delivered when a trigger fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationEvent {
    pub task_id: String,
    pub tag: String,
    pub title: String,
    pub body: String,
    pub fired_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn fired(trigger: &Trigger, fired_at: DateTime<Utc>) -> Self {
        Self {
            task_id: trigger.task_id.clone(),
            tag: trigger.tag.clone(),
            title: trigger.content.title.clone(),
            body: trigger.content.body.clone(),
            fired_at,
        }
    }
}

/// Delivery service for compiled triggers
///
/// Scheduling a tag that is already registered replaces it. Cancelling
/// a task without registered triggers is a no-op.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Register one trigger
    async fn schedule(&self, trigger: &Trigger) -> Result<()>;

    /// Remove every trigger owned by a task
    async fn cancel(&self, task_id: &str) -> Result<()>;
}
