mod config;
pub mod ledger;

pub use config::Config;
pub use ledger::{
    CardInput, CardRow, ConfirmationRow, DayConfirmations, DaySessions, LeaderboardEntry, Ledger,
    PlanState, PomodoroEventRow, PomodoroSummary, Profile, SessionRecord, SrsState, StatusCounts,
    UserScore,
};

use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Returns `~/.config/studyroom[-dev]/` based on STUDYROOM_ENV.
///
/// Set STUDYROOM_ENV=dev to use a separate development data directory.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("STUDYROOM_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("studyroom-dev")
    } else {
        base_dir.join("studyroom")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::LoadFailed {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
