use clap::Args;
use serde_json::json;
use studyroom_core::points::{milestone_reached, PointsEngine};
use studyroom_core::types::{ConfirmationStatus, TaskType};

use super::CliResult;

#[derive(Args)]
pub struct ConfirmArgs {
    /// Task being confirmed
    #[arg(value_parser = super::parse_task)]
    pub task: TaskType,
    /// "done" or "miss"
    #[arg(value_parser = super::parse_status, default_value = "done")]
    pub status: ConfirmationStatus,
}

pub fn run(args: ConfirmArgs, user: &str) -> CliResult {
    let (config, ledger) = super::open_ledger()?;
    let id = ledger.record_confirmation(user, args.status, args.task)?;

    let mut out = json!({
        "id": id,
        "user_id": user,
        "task": args.task.as_str(),
        "status": args.status.as_str(),
    });

    // A whole-day done confirmation also closes the open study session.
    if args.status == ConfirmationStatus::Done && args.task == TaskType::All {
        if let Some(session) = ledger.end_latest_open_session(user)? {
            out["ended_session"] = serde_json::to_value(&session)?;
        }
    }

    if args.status == ConfirmationStatus::Done {
        let streak_before = ledger.points_and_streak(user)?.streak;
        let engine = PointsEngine::new(config.points.clone());
        let outcome = engine.award_done(&ledger, user, ledger.zone().today())?;
        out["points"] = json!(outcome.points);
        out["streak"] = json!(outcome.streak);
        out["full_done"] = json!(outcome.full_done);
        if let Some(m) = milestone_reached(streak_before, outcome.streak, &config.points.milestones)
        {
            out["milestone"] = json!(m);
        }
    }

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
