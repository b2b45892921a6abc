use super::CliResult;

pub fn run() -> CliResult {
    let (_, ledger) = super::open_ledger()?;
    let entries = ledger.leaderboard()?;
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
