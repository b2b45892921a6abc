use clap::Subcommand;
use serde_json::json;

use super::CliResult;

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Set display name and/or picture for a user
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        picture: Option<String>,
    },
    /// Show every stored profile
    List,
}

pub fn run(action: ProfileAction, user: &str) -> CliResult {
    let (_, ledger) = super::open_ledger()?;

    match action {
        ProfileAction::Set { name, picture } => {
            ledger.upsert_profile(user, name.as_deref(), picture.as_deref())?;
            let out = json!({
                "user_id": user,
                "display_name": name,
                "picture_url": picture,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        ProfileAction::List => {
            let profiles = ledger.profiles_map()?;
            println!("{}", serde_json::to_string_pretty(&profiles)?);
        }
    }
    Ok(())
}
