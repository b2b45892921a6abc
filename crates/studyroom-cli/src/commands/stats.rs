use chrono::NaiveDate;
use clap::Subcommand;
use serde_json::json;
use studyroom_core::stats::{weekly_confirmations, weekly_sessions};

use super::CliResult;

#[derive(Subcommand)]
pub enum StatsAction {
    /// One day's confirmations and study sessions
    Day {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Aggregate over every user instead of just --user
        #[arg(long)]
        all_users: bool,
    },
    /// Rollups for the last N days ending today
    Week {
        #[arg(long, default_value = "7")]
        days: u32,
        #[arg(long)]
        all_users: bool,
    },
    /// Focus-period counts from the pomodoro event log
    Pomodoro {
        #[arg(long, default_value = "7")]
        days: u32,
        #[arg(long)]
        all_users: bool,
    },
}

pub fn run(action: StatsAction, user: &str) -> CliResult {
    let (_, ledger) = super::open_ledger()?;

    match action {
        StatsAction::Day { date, all_users } => {
            let date = date.unwrap_or_else(|| ledger.zone().today());
            let filter = (!all_users).then_some(user);
            let confirmations = ledger.confirmations_for_date(date, filter)?;
            let sessions = ledger.sessions_for_date(date, filter)?;
            let out = json!({
                "date": date,
                "confirmations": confirmations,
                "sessions": sessions,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        StatsAction::Week { days, all_users } => {
            let today = ledger.zone().today();
            let filter = (!all_users).then_some(user);
            let confirmations = weekly_confirmations(&ledger, today, days, filter)?;
            let sessions = weekly_sessions(&ledger, today, days, filter)?;
            let out = json!({
                "confirmations": confirmations,
                "sessions": sessions,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        StatsAction::Pomodoro { days, all_users } => {
            let filter = (!all_users).then_some(user);
            let summary = ledger.pomodoro_summary(days, filter)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
