// Reminder - personal tasks with recurring notification schedules
// Entry point and command dispatch

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reminder::app::AppState;
use reminder::commands::{self, PomodoroArgs, TaskArgs};
use reminder::database::TaskFilter;
use reminder::services::SavedTask;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Personal task reminders.
#[derive(Parser, Debug)]
#[command(name = "reminder", version, about = "Personal task reminders")]
struct Cli {
    /// Directory holding settings and the task store.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a task
    Add(TaskArgs),
    /// Replace the fields of an existing task
    Edit {
        id: String,
        #[command(flatten)]
        args: TaskArgs,
    },
    /// Mark a task completed
    Complete { id: String },
    /// Delete a task
    Delete { id: String },
    /// List tasks: todo, always-on or done
    List {
        #[arg(default_value = "todo")]
        view: TaskFilter,
    },
    /// Deliver notifications until interrupted
    Run,
    /// Run a Pomodoro timer
    Pomodoro(PomodoroArgs),
    /// Show version and data directory
    Info,
}

impl Cli {
    fn default_data_dir() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(".reminder")
    }
}

fn report(saved: &SavedTask) {
    println!("{}", commands::describe_task(&saved.task));
    for failure in &saved.failures {
        eprintln!(
            "warning: {:?} {} failed: {}",
            failure.operation, failure.target, failure.message
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reminder=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(Cli::default_data_dir);

    tracing::info!("Starting reminder");
    let state = AppState::initialize(data_dir.clone())
        .await
        .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?;

    match cli.command {
        Command::Add(args) => report(&commands::add_task(&state, args).await?),
        Command::Edit { id, args } => report(&commands::edit_task(&state, &id, args).await?),
        Command::Complete { id } => {
            let saved = commands::complete_task(&state, &id).await?;
            report(&saved);
            if let Some(message) = state.reminders_service.current_acknowledgement() {
                println!("{}", message);
            }
        }
        Command::Delete { id } => {
            commands::delete_task(&state, &id).await?;
            println!("Deleted {}", id);
        }
        Command::List { view } => {
            for task in commands::list_tasks(&state, view).await? {
                println!("{}", commands::describe_task(&task));
            }
        }
        Command::Run => commands::run_reminders(&state).await?,
        Command::Pomodoro(args) => commands::run_pomodoro(&state, args).await?,
        Command::Info => {
            let info = commands::get_app_info(&state);
            println!("reminder {} ({})", info.version, info.app_data_dir);
        }
    }

    Ok(())
}
