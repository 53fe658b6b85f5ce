/// Local notification gateway
/// Delivers compiled triggers in-process using tokio-cron-scheduler jobs.
/// Fired notifications are logged and broadcast to subscribers.
use crate::database::TimeOfDay;
use crate::error::{AppError, Result};
use crate::services::gateway::{NotificationEvent, NotificationGateway};
use crate::services::triggers::{task_tags, Trigger, TriggerKind};
use async_trait::async_trait;
use chrono::{Utc, Weekday};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Capacity of the fired-notification channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Shortest delay given to a one-shot job; past instants fire after it
const MIN_ONE_SHOT_DELAY: Duration = Duration::from_secs(1);

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Cron expression for a calendar trigger, seconds field first
pub fn calendar_cron(at: TimeOfDay, weekday: Option<Weekday>) -> String {
    let day = match weekday {
        Some(day) => day.to_string(),
        None => "*".to_string(),
    };
    format!("0 {} {} * * {}", at.minute(), at.hour(), day)
}

/// Gateway that runs triggers as in-process scheduler jobs
pub struct LocalNotificationGateway {
    scheduler: Arc<RwLock<JobScheduler>>,
    jobs: Arc<RwLock<HashMap<String, Uuid>>>,
    events: broadcast::Sender<NotificationEvent>,
}

impl LocalNotificationGateway {
    /// Create new gateway; call [`start`](Self::start) before jobs can fire
    pub async fn new() -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Scheduling(format!("Failed to create scheduler: {}", e)))?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            events,
        })
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<()> {
        let scheduler = self.scheduler.read().await;
        scheduler
            .start()
            .await
            .map_err(|e| AppError::Scheduling(format!("Failed to start scheduler: {}", e)))?;
        tracing::info!("Notification scheduler started");
        Ok(())
    }

    /// Receive every notification fired from now on
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.events.subscribe()
    }

    /// Tags of all currently registered triggers, sorted
    pub async fn registered_tags(&self) -> Vec<String> {
        let jobs = self.jobs.read().await;
        let mut tags: Vec<String> = jobs.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Shutdown scheduler gracefully
    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.write().await;
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Scheduling(format!("Failed to shutdown scheduler: {}", e)))?;
        tracing::info!("Notification scheduler shutdown");
        Ok(())
    }

    fn delivery(
        &self,
        trigger: &Trigger,
        one_shot: bool,
    ) -> impl FnMut(Uuid, JobScheduler) -> JobFuture + Send + Sync + 'static {
        let events = self.events.clone();
        let jobs = Arc::clone(&self.jobs);
        let trigger = trigger.clone();

        move |job_id, _scheduler| {
            let events = events.clone();
            let jobs = Arc::clone(&jobs);
            let trigger = trigger.clone();

            Box::pin(async move {
                let event = NotificationEvent::fired(&trigger, Utc::now());
                tracing::info!("Notification: {} - {} ({})", event.title, event.body, event.tag);

                if one_shot {
                    let mut jobs = jobs.write().await;
                    if jobs.get(&trigger.tag) == Some(&job_id) {
                        jobs.remove(&trigger.tag);
                    }
                }

                if events.send(event).is_err() {
                    tracing::debug!("No subscribers for notification {}", trigger.tag);
                }
            })
        }
    }

    fn build_job(&self, trigger: &Trigger) -> Result<Job> {
        let job = match &trigger.kind {
            TriggerKind::OneShot { at } => {
                let delay = (*at - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO)
                    .max(MIN_ONE_SHOT_DELAY);
                Job::new_one_shot_async(delay, self.delivery(trigger, true))
            }
            TriggerKind::Repeating { period, .. } => {
                Job::new_repeated_async(*period, self.delivery(trigger, false))
            }
            TriggerKind::CalendarRepeating { at, weekday } => Job::new_async_tz(
                calendar_cron(*at, *weekday),
                chrono::Local,
                self.delivery(trigger, false),
            ),
        };

        job.map_err(|e| {
            AppError::Scheduling(format!("Failed to create job for {}: {}", trigger.tag, e))
        })
    }

    async fn remove_tag(&self, tag: &str) -> Result<()> {
        let job_id = self.jobs.write().await.remove(tag);

        if let Some(job_id) = job_id {
            let scheduler = self.scheduler.read().await;
            scheduler
                .remove(&job_id)
                .await
                .map_err(|e| AppError::Scheduling(format!("Failed to remove job: {}", e)))?;
            tracing::debug!("Removed trigger {}", tag);
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationGateway for LocalNotificationGateway {
    async fn schedule(&self, trigger: &Trigger) -> Result<()> {
        self.remove_tag(&trigger.tag).await?;

        let job = self.build_job(trigger)?;
        let job_id = job.guid();

        // Registered before the job is added so an immediate one-shot can
        // clear its own entry.
        self.jobs.write().await.insert(trigger.tag.clone(), job_id);

        let added = {
            let scheduler = self.scheduler.read().await;
            scheduler.add(job).await
        };

        if let Err(e) = added {
            self.jobs.write().await.remove(&trigger.tag);
            return Err(AppError::Scheduling(format!(
                "Failed to schedule {}: {}",
                trigger.tag, e
            )));
        }

        tracing::info!("Scheduled trigger {}: {:?}", trigger.tag, trigger.kind);
        Ok(())
    }

    async fn cancel(&self, task_id: &str) -> Result<()> {
        for tag in task_tags(task_id) {
            self.remove_tag(&tag).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::triggers::{due_tag, recurring_tag, NotificationContent};

    fn trigger(tag: String, kind: TriggerKind) -> Trigger {
        Trigger {
            task_id: "t1".to_string(),
            tag,
            kind,
            content: NotificationContent {
                title: "Stretch".to_string(),
                body: "Stand up".to_string(),
            },
        }
    }

    #[test]
    fn test_calendar_cron() {
        let at = TimeOfDay::new(18, 0).unwrap();
        assert_eq!(calendar_cron(at, Some(Weekday::Fri)), "0 0 18 * * Fri");

        let at = TimeOfDay::new(7, 45).unwrap();
        assert_eq!(calendar_cron(at, None), "0 45 7 * * *");
    }

    #[tokio::test]
    async fn test_schedule_and_cancel_bookkeeping() {
        let gateway = LocalNotificationGateway::new().await.unwrap();

        gateway
            .schedule(&trigger(
                recurring_tag("t1"),
                TriggerKind::CalendarRepeating {
                    at: TimeOfDay::new(18, 0).unwrap(),
                    weekday: Some(Weekday::Fri),
                },
            ))
            .await
            .unwrap();
        gateway
            .schedule(&trigger(
                due_tag("t1"),
                TriggerKind::OneShot {
                    at: Utc::now() + chrono::Duration::days(1),
                },
            ))
            .await
            .unwrap();

        assert_eq!(
            gateway.registered_tags().await,
            vec!["t1_due".to_string(), "t1_recurring".to_string()]
        );

        gateway.cancel("t1").await.unwrap();
        assert!(gateway.registered_tags().await.is_empty());

        // Cancelling again is a no-op
        gateway.cancel("t1").await.unwrap();
    }

    #[tokio::test]
    async fn test_rescheduling_replaces_tag() {
        let gateway = LocalNotificationGateway::new().await.unwrap();
        let repeating = |minutes: u64| {
            trigger(
                recurring_tag("t1"),
                TriggerKind::Repeating {
                    first_fire: Utc::now(),
                    period: Duration::from_secs(minutes * 60),
                },
            )
        };

        gateway.schedule(&repeating(5)).await.unwrap();
        gateway.schedule(&repeating(10)).await.unwrap();

        assert_eq!(gateway.registered_tags().await, vec!["t1_recurring".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_past_one_shot_fires() {
        let gateway = LocalNotificationGateway::new().await.unwrap();
        let mut events = gateway.subscribe();
        gateway.start().await.unwrap();

        gateway
            .schedule(&trigger(
                due_tag("t1"),
                TriggerKind::OneShot {
                    at: Utc::now() - chrono::Duration::minutes(5),
                },
            ))
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("notification did not fire")
            .unwrap();

        assert_eq!(event.task_id, "t1");
        assert_eq!(event.tag, "t1_due");
        assert_eq!(event.title, "Stretch");

        gateway.shutdown().await.unwrap();
    }
}
