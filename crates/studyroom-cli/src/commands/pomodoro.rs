use std::sync::{Arc, Mutex};

use clap::Subcommand;
use serde_json::json;
use studyroom_core::error::Result as CoreResult;
use studyroom_core::pomodoro::{CycleConfig, Notifier, OutboundMessage, PomodoroScheduler};
use studyroom_core::types::TaskType;

use super::CliResult;

#[derive(Subcommand)]
pub enum PomodoroAction {
    /// Run the focus/break chain for a task until Ctrl-C
    Start {
        #[arg(value_parser = super::parse_task)]
        task: TaskType,
    },
    /// Log a pause for a task timer
    Pause {
        #[arg(value_parser = super::parse_task)]
        task: TaskType,
    },
    /// Log a stop for a task timer
    Stop {
        #[arg(value_parser = super::parse_task)]
        task: TaskType,
    },
    /// Show or change this user's cycle durations
    Config {
        #[arg(long)]
        focus_min: Option<u64>,
        #[arg(long)]
        break_min: Option<u64>,
        #[arg(long)]
        long_break_min: Option<u64>,
        #[arg(long)]
        long_every: Option<u32>,
    },
}

/// Prints chain notifications to stdout; stands in for a chat transport.
struct StdoutNotifier;

impl Notifier for StdoutNotifier {
    fn push(&self, target: &str, message: &OutboundMessage) -> CoreResult<()> {
        println!("[{target}] {}", message.text);
        Ok(())
    }
}

pub fn run(action: PomodoroAction, user: &str) -> CliResult {
    let (config, ledger) = super::open_ledger()?;

    match action {
        PomodoroAction::Start { task } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async {
                let scheduler = PomodoroScheduler::new(
                    Arc::new(Mutex::new(ledger)),
                    Arc::new(StdoutNotifier),
                    config.pomodoro,
                );
                scheduler.start(user, user, task)?;
                let out = json!({ "status": "running", "task": task.as_str() });
                println!("{}", serde_json::to_string_pretty(&out)?);

                tokio::signal::ctrl_c().await?;
                scheduler.stop(user, task)?;
                let out = json!({ "status": "stopped", "task": task.as_str() });
                println!("{}", serde_json::to_string_pretty(&out)?);
                Ok::<(), Box<dyn std::error::Error>>(())
            })?;
        }
        PomodoroAction::Pause { task } => {
            let scheduler = PomodoroScheduler::new(
                Arc::new(Mutex::new(ledger)),
                Arc::new(StdoutNotifier),
                config.pomodoro,
            );
            scheduler.pause(user, task)?;
            let out = json!({ "status": "paused", "task": task.as_str() });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        PomodoroAction::Stop { task } => {
            let scheduler = PomodoroScheduler::new(
                Arc::new(Mutex::new(ledger)),
                Arc::new(StdoutNotifier),
                config.pomodoro,
            );
            scheduler.stop(user, task)?;
            let out = json!({ "status": "stopped", "task": task.as_str() });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        PomodoroAction::Config {
            focus_min,
            break_min,
            long_break_min,
            long_every,
        } => {
            let base = ledger.pomodoro_config(user)?.unwrap_or(config.pomodoro);
            if focus_min.is_none()
                && break_min.is_none()
                && long_break_min.is_none()
                && long_every.is_none()
            {
                println!("{}", serde_json::to_string_pretty(&base)?);
                return Ok(());
            }
            let updated = CycleConfig {
                focus_min: focus_min.unwrap_or(base.focus_min),
                break_min: break_min.unwrap_or(base.break_min),
                long_break_min: long_break_min.unwrap_or(base.long_break_min),
                long_every: long_every.unwrap_or(base.long_every),
            };
            ledger.set_pomodoro_config(user, &updated)?;
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
    }
    Ok(())
}
