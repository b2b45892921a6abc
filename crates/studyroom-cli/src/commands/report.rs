use clap::Subcommand;
use serde_json::json;
use studyroom_core::types::TaskType;

use super::CliResult;

#[derive(Subcommand)]
pub enum ReportAction {
    /// Minutes spent on a task today
    Minutes {
        #[arg(value_parser = super::parse_task)]
        task: TaskType,
        minutes: i64,
    },
    /// Progress in task-specific units (e.g. 20 words)
    Progress {
        #[arg(value_parser = super::parse_task)]
        task: TaskType,
        /// What is being counted, e.g. "words" or "pages"
        metric: String,
        amount: i64,
    },
}

pub fn run(action: ReportAction, user: &str) -> CliResult {
    let (_, ledger) = super::open_ledger()?;

    let out = match action {
        ReportAction::Minutes { task, minutes } => {
            let id = ledger.report_minutes(user, task, minutes)?;
            json!({ "id": id, "task": task.as_str(), "minutes": minutes })
        }
        ReportAction::Progress {
            task,
            metric,
            amount,
        } => {
            let id = ledger.report_progress(user, task, &metric, amount)?;
            json!({ "id": id, "task": task.as_str(), "metric": metric, "amount": amount })
        }
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
