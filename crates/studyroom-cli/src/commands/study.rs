use clap::Subcommand;
use serde_json::json;

use super::CliResult;

#[derive(Subcommand)]
pub enum StudyAction {
    /// Open a new study session starting now
    Start,
    /// Close the most recent open session
    End,
}

pub fn run(action: StudyAction, user: &str) -> CliResult {
    let (_, ledger) = super::open_ledger()?;

    match action {
        StudyAction::Start => {
            let id = ledger.start_session(user)?;
            let out = json!({ "session_id": id, "user_id": user, "status": "started" });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        StudyAction::End => match ledger.end_latest_open_session(user)? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => {
                let out = json!({ "user_id": user, "status": "no_open_session" });
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
        },
    }
    Ok(())
}
