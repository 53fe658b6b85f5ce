//! Pomodoro command
//!
//! Runs the work/break timer in the foreground until interrupted.

use crate::app::AppState;
use crate::error::Result;
use crate::services::settings::PomodoroSettings;
use crate::services::{PomodoroService, PomodoroTimer, Session};
use clap::Args;

#[derive(Args, Debug, Clone, Default)]
pub struct PomodoroArgs {
    /// Work session length in minutes (overrides settings)
    #[arg(long)]
    pub work: Option<u32>,

    /// Break length in minutes (overrides settings)
    #[arg(long = "break")]
    pub break_minutes: Option<u32>,

    /// Store the given lengths as the new defaults
    #[arg(long)]
    pub save: bool,
}

impl PomodoroArgs {
    fn resolve(&self, configured: &PomodoroSettings) -> PomodoroSettings {
        PomodoroSettings {
            work_minutes: self.work.unwrap_or(configured.work_minutes),
            break_minutes: self.break_minutes.unwrap_or(configured.break_minutes),
        }
    }
}

fn session_label(session: Session) -> &'static str {
    match session {
        Session::Work => "Work",
        Session::Break => "Break",
    }
}

/// Run the timer until Ctrl-C
pub async fn run_pomodoro(state: &AppState, args: PomodoroArgs) -> Result<()> {
    let lengths = args.resolve(&state.settings.pomodoro);

    if args.save {
        state.settings_service.update_pomodoro(lengths.clone()).await?;
    } else {
        let mut check = state.settings.clone();
        check.pomodoro = lengths.clone();
        check.validate()?;
    }

    let service = if args.work.is_some() || args.break_minutes.is_some() {
        PomodoroService::new(PomodoroTimer::from_settings(&lengths))
    } else {
        state.pomodoro_service.clone()
    };

    let mut changes = service.subscribe();
    service.start().await;
    let ticker = service.spawn_ticker();

    let snapshot = service.snapshot().await;
    println!(
        "{} {} (Ctrl-C to stop)",
        session_label(snapshot.session()),
        snapshot.format_remaining()
    );

    loop {
        tokio::select! {
            changed = changes.recv() => match changed {
                Ok(changed) => {
                    let snapshot = service.snapshot().await;
                    println!(
                        "{} {}",
                        session_label(changed.session),
                        snapshot.format_remaining()
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    ticker.abort();
    service.reset().await;
    tracing::info!("Pomodoro stopped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_fall_back_to_settings() {
        let configured = PomodoroSettings {
            work_minutes: 50,
            break_minutes: 10,
        };

        let resolved = PomodoroArgs {
            break_minutes: Some(15),
            ..PomodoroArgs::default()
        }
        .resolve(&configured);

        assert_eq!(resolved.work_minutes, 50);
        assert_eq!(resolved.break_minutes, 15);
    }
}
