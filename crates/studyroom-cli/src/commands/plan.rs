use clap::Subcommand;
use serde_json::json;

use super::CliResult;

#[derive(Subcommand)]
pub enum PlanAction {
    /// Start or reposition a plan at a given day
    Set {
        /// Plan version label, e.g. "v1"
        version: String,
        #[arg(long, default_value = "1")]
        day: u32,
        /// Deliver daily plan messages to this user
        #[arg(long)]
        to_user: Option<String>,
    },
    /// Show the stored state for a plan version
    Show { version: String },
    /// Move the plan to the next day, capped at --max-day
    Advance {
        version: String,
        #[arg(long, default_value = "30")]
        max_day: u32,
    },
}

pub fn run(action: PlanAction, user: &str) -> CliResult {
    let (_, ledger) = super::open_ledger()?;

    match action {
        PlanAction::Set {
            version,
            day,
            to_user,
        } => {
            let target = to_user.as_deref().or(Some(user));
            ledger.set_plan_state(&version, day, target)?;
            let out = json!({ "version": version, "day": day, "to_user_id": target });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        PlanAction::Show { version } => match ledger.plan_state(&version)? {
            Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
            None => {
                let out = json!({ "version": version, "status": "not_started" });
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
        },
        PlanAction::Advance { version, max_day } => {
            let day = ledger.advance_plan_day(&version, max_day)?;
            let out = json!({ "version": version, "day": day });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}
