//! Pomodoro service
//!
//! Work/break countdown independent of tasks. The timer is a plain state
//! machine advanced one second per tick; the service drives it from a
//! tokio interval and broadcasts session changes.

use crate::services::settings::PomodoroSettings;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

/// Current phase of the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Session {
    Work,
    Break,
}

/// Emitted when a session runs out and the next one begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionChanged {
    pub session: Session,
    pub remaining_secs: u32,
}

/// Work/break countdown
#[derive(Debug, Clone)]
pub struct PomodoroTimer {
    work_secs: u32,
    break_secs: u32,
    remaining_secs: u32,
    running: bool,
    session: Session,
}

impl PomodoroTimer {
    pub fn new(work_minutes: u32, break_minutes: u32) -> Self {
        let work_secs = work_minutes.saturating_mul(60);
        Self {
            work_secs,
            break_secs: break_minutes.saturating_mul(60),
            remaining_secs: work_secs,
            running: false,
            session: Session::Work,
        }
    }

    pub fn from_settings(settings: &PomodoroSettings) -> Self {
        Self::new(settings.work_minutes, settings.break_minutes)
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Stop and return to a fresh work session
    pub fn reset(&mut self) {
        self.running = false;
        self.session = Session::Work;
        self.remaining_secs = self.work_secs;
    }

    /// Advance one second
    ///
    /// The tick after the countdown reaches zero switches session and
    /// keeps the timer running.
    pub fn tick(&mut self) -> Option<SessionChanged> {
        if !self.running {
            return None;
        }

        if self.remaining_secs > 0 {
            self.remaining_secs -= 1;
            return None;
        }

        self.session = match self.session {
            Session::Work => Session::Break,
            Session::Break => Session::Work,
        };
        self.remaining_secs = match self.session {
            Session::Work => self.work_secs,
            Session::Break => self.break_secs,
        };

        Some(SessionChanged {
            session: self.session,
            remaining_secs: self.remaining_secs,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn session(&self) -> Session {
        self.session
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    /// Remaining time as `MM:SS`
    pub fn format_remaining(&self) -> String {
        format!("{:02}:{:02}", self.remaining_secs / 60, self.remaining_secs % 60)
    }
}

/// Drives a shared timer once per second
#[derive(Clone)]
pub struct PomodoroService {
    timer: Arc<Mutex<PomodoroTimer>>,
    events: broadcast::Sender<SessionChanged>,
}

impl PomodoroService {
    pub fn new(timer: PomodoroTimer) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            timer: Arc::new(Mutex::new(timer)),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionChanged> {
        self.events.subscribe()
    }

    pub async fn start(&self) {
        self.timer.lock().await.start();
        tracing::info!("Pomodoro started");
    }

    pub async fn pause(&self) {
        self.timer.lock().await.pause();
        tracing::info!("Pomodoro paused");
    }

    pub async fn reset(&self) {
        self.timer.lock().await.reset();
        tracing::info!("Pomodoro reset");
    }

    /// Copy of the current timer state
    pub async fn snapshot(&self) -> PomodoroTimer {
        self.timer.lock().await.clone()
    }

    /// Start the background ticker
    pub fn spawn_ticker(&self) -> JoinHandle<()> {
        let service = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let changed = service.timer.lock().await.tick();
                if let Some(changed) = changed {
                    tracing::info!(
                        "Pomodoro session changed to {:?} ({}s)",
                        changed.session,
                        changed.remaining_secs
                    );
                    if service.events.send(changed).is_err() {
                        tracing::debug!("No subscribers for Pomodoro session change");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_timer_is_idle_work_session() {
        let timer = PomodoroTimer::new(25, 5);

        assert!(!timer.is_running());
        assert_eq!(timer.session(), Session::Work);
        assert_eq!(timer.remaining_secs(), 1500);
        assert_eq!(timer.format_remaining(), "25:00");
    }

    #[test]
    fn test_paused_timer_does_not_count() {
        let mut timer = PomodoroTimer::new(1, 1);

        assert!(timer.tick().is_none());
        assert_eq!(timer.remaining_secs(), 60);

        timer.start();
        timer.tick();
        timer.pause();
        timer.tick();
        assert_eq!(timer.remaining_secs(), 59);
        assert_eq!(timer.format_remaining(), "00:59");
    }

    #[test]
    fn test_sessions_alternate() {
        let mut timer = PomodoroTimer::new(1, 2);
        timer.start();

        for _ in 0..60 {
            assert!(timer.tick().is_none());
        }
        assert_eq!(timer.remaining_secs(), 0);

        let changed = timer.tick().unwrap();
        assert_eq!(changed.session, Session::Break);
        assert_eq!(changed.remaining_secs, 120);
        assert!(timer.is_running());

        for _ in 0..120 {
            timer.tick();
        }
        let changed = timer.tick().unwrap();
        assert_eq!(changed.session, Session::Work);
        assert_eq!(timer.remaining_secs(), 60);
    }

    #[test]
    fn test_reset_returns_to_work() {
        let mut timer = PomodoroTimer::new(1, 1);
        timer.start();
        for _ in 0..61 {
            timer.tick();
        }
        assert_eq!(timer.session(), Session::Break);

        timer.reset();
        assert!(!timer.is_running());
        assert_eq!(timer.session(), Session::Work);
        assert_eq!(timer.remaining_secs(), 60);
    }

    #[test]
    fn test_huge_session_length_saturates() {
        let mut timer = PomodoroTimer::new(u32::MAX, u32::MAX);
        assert_eq!(timer.remaining_secs(), u32::MAX);

        timer.start();
        timer.tick();
        assert_eq!(timer.remaining_secs(), u32::MAX - 1);
    }

    #[tokio::test]
    async fn test_service_controls_shared_timer() {
        let service = PomodoroService::new(PomodoroTimer::from_settings(
            &PomodoroSettings::default(),
        ));

        service.start().await;
        assert!(service.snapshot().await.is_running());

        service.pause().await;
        assert!(!service.snapshot().await.is_running());

        service.reset().await;
        assert_eq!(service.snapshot().await.format_remaining(), "25:00");
    }
}
