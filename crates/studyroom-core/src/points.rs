//! Points and streak derivation over the confirmation ledger.
//!
//! Every `done` confirmation earns a fixed award; repeated confirmations
//! for the same task and day earn again. A day where all four canonical
//! tasks are done extends (or restarts) the consecutive-day streak.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::Ledger;
use crate::types::TaskType;

/// Points tuning, part of the application config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsConfig {
    /// Points awarded per done confirmation.
    #[serde(default = "default_complete_task_points")]
    pub complete_task_points: i64,
    /// Streak lengths worth celebrating.
    #[serde(default = "default_milestones")]
    pub milestones: Vec<u32>,
}

fn default_complete_task_points() -> i64 {
    10
}

fn default_milestones() -> Vec<u32> {
    vec![3, 7, 14]
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            complete_task_points: default_complete_task_points(),
            milestones: default_milestones(),
        }
    }
}

/// Result of applying a done confirmation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DoneOutcome {
    /// New point total for the user.
    pub points: i64,
    /// Current streak after this confirmation.
    pub streak: u32,
    /// Whether all four canonical tasks are done for the day.
    pub full_done: bool,
}

/// Derives points and streaks; the only writer of the users table.
#[derive(Debug, Clone, Default)]
pub struct PointsEngine {
    cfg: PointsConfig,
}

impl PointsEngine {
    pub fn new(cfg: PointsConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &PointsConfig {
        &self.cfg
    }

    /// React to a `done` confirmation already recorded for `date`.
    ///
    /// Awards the per-task points unconditionally, then checks the
    /// four-task full-done condition for the day: continuing from
    /// yesterday extends the streak, anything else restarts it at 1.
    pub fn award_done(&self, ledger: &Ledger, user_id: &str, date: NaiveDate) -> Result<DoneOutcome> {
        let points = ledger.add_points(user_id, self.cfg.complete_task_points)?;

        let day = ledger.confirmations_for_date(date, Some(user_id))?;
        let full_done = TaskType::CANONICAL
            .iter()
            .all(|t| day.by_task.get(t).map(|c| c.done > 0).unwrap_or(false));
        if !full_done {
            let (streak, _) = ledger.streak_state(user_id)?;
            return Ok(DoneOutcome {
                points,
                streak,
                full_done: false,
            });
        }

        let (prev_streak, last_full_done) = ledger.streak_state(user_id)?;
        let streak = if last_full_done == Some(date - Duration::days(1)) {
            prev_streak + 1
        } else {
            1
        };
        ledger.set_streak(user_id, streak, date)?;
        Ok(DoneOutcome {
            points,
            streak,
            full_done: true,
        })
    }
}

/// The milestone hit by moving from `previous` to `current`, if any.
/// Pure; celebrating it is the caller's business.
pub fn milestone_reached(previous: u32, current: u32, milestones: &[u32]) -> Option<u32> {
    milestones
        .iter()
        .copied()
        .find(|m| current == *m && previous < *m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConfirmationStatus, LocalZone};

    fn setup() -> (Ledger, PointsEngine) {
        let ledger = Ledger::open_memory(LocalZone::default()).unwrap();
        (ledger, PointsEngine::new(PointsConfig::default()))
    }

    fn confirm_done(ledger: &Ledger, user: &str, task: TaskType) {
        ledger
            .record_confirmation(user, ConfirmationStatus::Done, task)
            .unwrap();
    }

    #[test]
    fn repeated_done_confirmations_keep_awarding() {
        let (ledger, engine) = setup();
        let today = ledger.zone().today();
        confirm_done(&ledger, "u1", TaskType::Vocab);
        let first = engine.award_done(&ledger, "u1", today).unwrap();
        confirm_done(&ledger, "u1", TaskType::Vocab);
        let second = engine.award_done(&ledger, "u1", today).unwrap();
        assert_eq!(first.points, 10);
        assert_eq!(second.points, 20);
    }

    #[test]
    fn partial_day_leaves_streak_alone() {
        let (ledger, engine) = setup();
        let today = ledger.zone().today();
        ledger.set_streak("u1", 5, today - Duration::days(1)).unwrap();
        confirm_done(&ledger, "u1", TaskType::Vocab);
        let outcome = engine.award_done(&ledger, "u1", today).unwrap();
        assert!(!outcome.full_done);
        assert_eq!(outcome.streak, 5);
        assert_eq!(ledger.streak_state("u1").unwrap().0, 5);
    }

    #[test]
    fn full_day_after_yesterday_extends_streak() {
        let (ledger, engine) = setup();
        let today = ledger.zone().today();
        ledger.set_streak("u1", 5, today - Duration::days(1)).unwrap();

        let mut last = None;
        for task in TaskType::CANONICAL {
            confirm_done(&ledger, "u1", task);
            last = Some(engine.award_done(&ledger, "u1", today).unwrap());
        }
        let outcome = last.unwrap();
        assert!(outcome.full_done);
        assert_eq!(outcome.streak, 6);
        // Four awards of 10 points each.
        assert_eq!(outcome.points, 40);
        assert_eq!(ledger.streak_state("u1").unwrap(), (6, Some(today)));
    }

    #[test]
    fn skipped_day_resets_streak_to_one() {
        let (ledger, engine) = setup();
        let today = ledger.zone().today();
        ledger.set_streak("u1", 9, today - Duration::days(3)).unwrap();

        for task in TaskType::CANONICAL {
            confirm_done(&ledger, "u1", task);
        }
        let outcome = engine.award_done(&ledger, "u1", today).unwrap();
        assert!(outcome.full_done);
        assert_eq!(outcome.streak, 1);
    }

    #[test]
    fn first_ever_full_day_starts_streak_at_one() {
        let (ledger, engine) = setup();
        let today = ledger.zone().today();
        for task in TaskType::CANONICAL {
            confirm_done(&ledger, "u1", task);
        }
        let outcome = engine.award_done(&ledger, "u1", today).unwrap();
        assert_eq!(outcome.streak, 1);
        assert!(outcome.full_done);
    }

    #[test]
    fn miss_confirmations_do_not_count_toward_full_done() {
        let (ledger, engine) = setup();
        let today = ledger.zone().today();
        for task in [TaskType::Vocab, TaskType::Grammar, TaskType::Listening] {
            confirm_done(&ledger, "u1", task);
        }
        ledger
            .record_confirmation("u1", ConfirmationStatus::Miss, TaskType::Reading)
            .unwrap();
        let outcome = engine.award_done(&ledger, "u1", today).unwrap();
        assert!(!outcome.full_done);
    }

    #[test]
    fn milestone_fires_once_on_crossing() {
        let ms = [3, 7, 14];
        assert_eq!(milestone_reached(2, 3, &ms), Some(3));
        assert_eq!(milestone_reached(3, 3, &ms), None);
        assert_eq!(milestone_reached(6, 7, &ms), Some(7));
        assert_eq!(milestone_reached(4, 5, &ms), None);
        assert_eq!(milestone_reached(0, 1, &ms), None);
    }
}
