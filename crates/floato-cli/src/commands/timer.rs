//! Foreground timer session.

use std::io::Write;
use std::sync::Arc;

use clap::Subcommand;
use floato_core::events::Event;
use floato_core::session::{Notifier, Orchestrator};
use floato_core::storage::{Config, Database, NotificationSound, NotificationsConfig};
use floato_core::timer::Phase;
use tokio::sync::broadcast;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run the session for the active task until everything is done
    Run {
        /// Override the configured work interval for this session
        #[arg(long)]
        work_minutes: Option<u32>,
    },
    /// Show the persisted task list and timer settings
    Status,
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Run { work_minutes } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_session(work_minutes))
        }
        TimerAction::Status => status(),
    }
}

/// Desktop notification sink backed by the system notification daemon.
struct DesktopNotifier {
    config: NotificationsConfig,
}

impl Notifier for DesktopNotifier {
    fn notify_completion(&self, task_title: &str) {
        if !self.config.enabled {
            return;
        }
        let title = task_title.to_string();
        let sound = match self.config.sound {
            NotificationSound::Glass => Some("Glass"),
            NotificationSound::Ping => Some("Ping"),
            NotificationSound::Submarine => Some("Submarine"),
            NotificationSound::Silent => None,
        };
        // Delivery happens off the timer loop; the session never waits on the
        // notification daemon.
        std::thread::spawn(move || {
            let mut notification = notify_rust::Notification::new();
            notification.summary("Pomodoro complete").body(&title);
            if let Some(sound) = sound {
                notification.sound_name(sound);
            }
            if let Err(e) = notification.show() {
                log::warn!("failed to deliver notification: {e}");
            }
        });
    }
}

async fn run_session(work_minutes: Option<u32>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load_or_default();
    if let Some(minutes) = work_minutes {
        config.set_work_minutes(minutes)?;
    }
    let notifier = Arc::new(DesktopNotifier {
        config: config.notifications.clone(),
    });
    let db = Database::open()?;
    let orch = Orchestrator::with_database(db, config, notifier)?;
    let mut rx = orch.subscribe();

    if !orch.start() {
        println!("No unfinished task to start. Add one with `floato task add <title>`.");
        return Ok(());
    }

    loop {
        match rx.recv().await {
            Ok(Event::SessionStarted { task_title, .. }) => {
                println!("\nWorking on: {task_title}");
            }
            Ok(Event::Tick { phase, .. }) => {
                let label = match phase {
                    Phase::Running(s) => format!("  {}  work ", mmss(s)),
                    Phase::OnBreak(s) => format!("  {}  break", mmss(s)),
                    Phase::Idle => String::new(),
                };
                print!("\r{label}");
                std::io::stdout().flush().ok();
            }
            Ok(Event::IntervalCompleted {
                task_title,
                finished_intervals,
                target_intervals,
                ..
            }) => {
                println!("\rInterval done: {task_title} ({finished_intervals}/{target_intervals})");
            }
            Ok(Event::TaskCompleted { task_title, .. }) => {
                println!("Task complete: {task_title}");
            }
            Ok(Event::SessionIdle { .. }) => {
                println!("\nNothing left to work on.");
                break;
            }
            Ok(Event::TaskListChanged { .. }) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::debug!("display lagged {skipped} events behind the session");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    Ok(())
}

fn status() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let db = Database::open()?;
    let list = floato_core::task::TaskList::from_tasks(db.load_tasks()?);
    let open: u32 = list
        .tasks()
        .iter()
        .filter(|t| !t.is_done)
        .map(|t| t.remaining_intervals())
        .sum();
    println!("work interval: {} min", config.timer.work_minutes);
    println!(
        "tasks: {} total, {} open ({} intervals remaining)",
        list.tasks().len(),
        list.tasks().iter().filter(|t| !t.is_done).count(),
        open
    );
    Ok(())
}

fn mmss(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmss_formats_zero_padded() {
        assert_eq!(mmss(0), "00:00");
        assert_eq!(mmss(59), "00:59");
        assert_eq!(mmss(1500), "25:00");
        assert_eq!(mmss(3600), "60:00");
    }
}
