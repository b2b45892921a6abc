pub mod card;
pub mod config;
pub mod confirm;
pub mod leaderboard;
pub mod plan;
pub mod pomodoro;
pub mod profile;
pub mod report;
pub mod stats;
pub mod study;

use studyroom_core::storage::{Config, Ledger};
use studyroom_core::types::{ConfirmationStatus, TaskType};

pub(crate) type CliResult = Result<(), Box<dyn std::error::Error>>;

pub(crate) fn open_ledger() -> Result<(Config, Ledger), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let ledger = Ledger::open(&config)?;
    Ok((config, ledger))
}

pub(crate) fn parse_task(s: &str) -> Result<TaskType, String> {
    s.parse()
}

pub(crate) fn parse_status(s: &str) -> Result<ConfirmationStatus, String> {
    s.parse()
}
