//! Multi-day rollups composed from single-day ledger queries.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::error::Result;
use crate::storage::Ledger;
use crate::types::TaskType;

/// Per-day done counts for each canonical task over a date window.
///
/// All vectors share the index of `dates` (oldest first).
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyConfirmations {
    pub dates: Vec<NaiveDate>,
    pub done_by_task: BTreeMap<TaskType, Vec<u32>>,
    pub done_total: Vec<u32>,
    pub miss_total: Vec<u32>,
}

/// Per-day study-session totals over a date window.
#[derive(Debug, Clone, Serialize)]
pub struct WeeklySessions {
    pub dates: Vec<NaiveDate>,
    pub minutes: Vec<i64>,
    pub counts: Vec<u32>,
}

fn window(end_date: NaiveDate, days: u32) -> Vec<NaiveDate> {
    let days = days.max(1) as i64;
    (0..days)
        .rev()
        .map(|back| end_date - Duration::days(back))
        .collect()
}

/// Done counts per canonical task for the `days` days ending at `end_date`.
pub fn weekly_confirmations(
    ledger: &Ledger,
    end_date: NaiveDate,
    days: u32,
    user_id: Option<&str>,
) -> Result<WeeklyConfirmations> {
    let dates = window(end_date, days);
    let mut done_by_task: BTreeMap<TaskType, Vec<u32>> = TaskType::CANONICAL
        .iter()
        .map(|t| (*t, Vec::with_capacity(dates.len())))
        .collect();
    let mut done_total = Vec::with_capacity(dates.len());
    let mut miss_total = Vec::with_capacity(dates.len());

    for date in &dates {
        let day = ledger.confirmations_for_date(*date, user_id)?;
        for task in TaskType::CANONICAL {
            let done = day.by_task.get(&task).map(|c| c.done).unwrap_or(0);
            if let Some(column) = done_by_task.get_mut(&task) {
                column.push(done);
            }
        }
        done_total.push(day.summary.done);
        miss_total.push(day.summary.miss);
    }

    Ok(WeeklyConfirmations {
        dates,
        done_by_task,
        done_total,
        miss_total,
    })
}

/// Session minutes and counts for the `days` days ending at `end_date`.
pub fn weekly_sessions(
    ledger: &Ledger,
    end_date: NaiveDate,
    days: u32,
    user_id: Option<&str>,
) -> Result<WeeklySessions> {
    let dates = window(end_date, days);
    let mut minutes = Vec::with_capacity(dates.len());
    let mut counts = Vec::with_capacity(dates.len());

    for date in &dates {
        let day = ledger.sessions_for_date(*date, user_id)?;
        minutes.push(day.total_minutes);
        counts.push(day.count as u32);
    }

    Ok(WeeklySessions {
        dates,
        minutes,
        counts,
    })
}
