//! SM-2 spaced repetition scheduling.
//!
//! The scheduler itself is a pure function over [`SrsState`]; the
//! [`review_card`] operation wires it to the ledger: load-or-initialize the
//! state, apply the grade, stamp the next due date, and commit the upsert
//! together with its audit row.

use chrono::Duration;

use crate::error::{Result, ValidationError};
use crate::storage::{Ledger, SrsState};

/// SM-2 variant used for card scheduling.
#[derive(Debug, Clone, Copy)]
pub struct Sm2 {
    pub initial_ease: f64,
    pub minimum_ease: f64,
}

impl Default for Sm2 {
    fn default() -> Self {
        Self {
            initial_ease: 2.5,
            minimum_ease: 1.3,
        }
    }
}

impl Sm2 {
    /// Apply one review grade (0..=5, clamped) to a state.
    ///
    /// Success (grade >= 3) walks the 1, 6, round(interval * ease) ladder
    /// and nudges ease by the SM-2 formula, floored at `minimum_ease`.
    /// Failure resets reps, bumps lapses, sets interval to 1 and leaves
    /// ease untouched.
    ///
    /// The returned state has no due date; scheduling the next review is
    /// the caller's job.
    pub fn apply(&self, state: &SrsState, grade: u8) -> SrsState {
        let grade = grade.min(5);
        let mut next = state.clone();
        if grade >= 3 {
            next.interval_days = match state.reps {
                0 => 1,
                1 => 6,
                _ => ((state.interval_days as f64 * state.ease).round() as i64).max(1),
            };
            next.reps = state.reps + 1;
            let q = (5 - grade) as f64;
            next.ease = (state.ease + (0.1 - q * (0.08 + q * 0.02))).max(self.minimum_ease);
        } else {
            next.reps = 0;
            next.lapses = state.lapses + 1;
            next.interval_days = 1;
        }
        next.last_grade = Some(grade);
        next.due = None;
        next
    }
}

/// Outcome of a committed review.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReviewOutcome {
    pub card_id: i64,
    pub grade: u8,
    pub interval_before: i64,
    pub state: SrsState,
}

/// Review a card for a user and persist the result.
///
/// A card that has never been reviewed for this user starts from the fresh
/// default state rather than failing. Out-of-range grades are rejected
/// before any write.
pub fn review_card(
    ledger: &mut Ledger,
    user_id: &str,
    card_id: i64,
    grade: u8,
) -> Result<ReviewOutcome> {
    if grade > 5 {
        return Err(ValidationError::GradeOutOfRange(grade as i64).into());
    }
    let before = ledger.srs_state(card_id, user_id)?.unwrap_or_default();
    let interval_before = before.interval_days;

    let zone = ledger.zone();
    let mut next = Sm2::default().apply(&before, grade);
    let due_date = zone.today() + Duration::days(next.interval_days);
    next.due = Some(zone.end_of_day(due_date).to_rfc3339());

    ledger.commit_review(card_id, user_id, &next, grade, interval_before)?;
    Ok(ReviewOutcome {
        card_id,
        grade,
        interval_before,
        state: next,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CardInput;
    use crate::types::LocalZone;
    use proptest::prelude::*;

    fn fresh() -> SrsState {
        SrsState::default()
    }

    #[test]
    fn success_ladder_is_1_6_then_ease_scaled() {
        let sm2 = Sm2::default();
        let s1 = sm2.apply(&fresh(), 4);
        assert_eq!((s1.reps, s1.interval_days), (1, 1));
        // Grade 4 leaves ease at 2.5 exactly.
        assert!((s1.ease - 2.5).abs() < 1e-9);

        let s2 = sm2.apply(&s1, 4);
        assert_eq!((s2.reps, s2.interval_days), (2, 6));

        let s3 = sm2.apply(&s2, 4);
        assert_eq!((s3.reps, s3.interval_days), (3, 15)); // round(6 * 2.5)
    }

    #[test]
    fn grade_five_raises_ease_grade_three_lowers_it() {
        let sm2 = Sm2::default();
        let up = sm2.apply(&fresh(), 5);
        assert!((up.ease - 2.6).abs() < 1e-9);
        let down = sm2.apply(&fresh(), 3);
        assert!((down.ease - 2.36).abs() < 1e-9);
    }

    #[test]
    fn failure_resets_reps_and_interval_but_not_ease() {
        let sm2 = Sm2::default();
        let mut s = fresh();
        for _ in 0..3 {
            s = sm2.apply(&s, 5);
        }
        let ease_before = s.ease;
        let failed = sm2.apply(&s, 2);
        assert_eq!(failed.reps, 0);
        assert_eq!(failed.interval_days, 1);
        assert_eq!(failed.lapses, s.lapses + 1);
        assert!((failed.ease - ease_before).abs() < 1e-9);
    }

    #[test]
    fn grades_above_five_are_clamped() {
        let sm2 = Sm2::default();
        let s = sm2.apply(&fresh(), 9);
        assert_eq!(s.last_grade, Some(5));
    }

    proptest! {
        #[test]
        fn ease_never_drops_below_floor(grades in proptest::collection::vec(0u8..=5, 1..60)) {
            let sm2 = Sm2::default();
            let mut s = fresh();
            for g in grades {
                s = sm2.apply(&s, g);
                prop_assert!(s.ease >= sm2.minimum_ease - 1e-9);
                prop_assert!(s.interval_days >= 1);
            }
        }

        #[test]
        fn lapses_count_failures_exactly(grades in proptest::collection::vec(0u8..=5, 1..60)) {
            let sm2 = Sm2::default();
            let mut s = fresh();
            let failures = grades.iter().filter(|g| **g < 3).count() as u32;
            for g in grades.iter() {
                s = sm2.apply(&s, *g);
            }
            prop_assert_eq!(s.lapses, failures);
        }
    }

    #[test]
    fn review_rejects_out_of_range_grade() {
        let mut l = Ledger::open_memory(LocalZone::default()).unwrap();
        let card = l
            .create_card(
                "u1",
                &CardInput {
                    front: "水".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(review_card(&mut l, "u1", card.id, 6).is_err());
        assert_eq!(l.review_count("u1").unwrap(), 0);
    }

    #[test]
    fn reviewed_card_moves_from_today_to_tomorrow() {
        let mut l = Ledger::open_memory(LocalZone::default()).unwrap();
        let card = l
            .create_card(
                "u1",
                &CardInput {
                    front: "火".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        let today = l.zone().today();
        assert_eq!(l.due_cards("u1", today).unwrap().len(), 1);

        let outcome = review_card(&mut l, "u1", card.id, 4).unwrap();
        assert_eq!(outcome.state.interval_days, 1);
        assert_eq!(outcome.interval_before, 0);

        assert!(l.due_cards("u1", today).unwrap().is_empty());
        assert_eq!(
            l.due_cards("u1", today.succ_opt().unwrap()).unwrap().len(),
            1
        );
        assert_eq!(l.review_count("u1").unwrap(), 1);
    }

    #[test]
    fn review_without_srs_row_initializes_fresh_state() {
        let mut l = Ledger::open_memory(LocalZone::default()).unwrap();
        // Card id that was never created: state defaults, review still lands.
        let outcome = review_card(&mut l, "u1", 999, 3).unwrap();
        assert_eq!(outcome.state.reps, 1);
        assert_eq!(outcome.state.interval_days, 1);
        assert_eq!(l.review_count("u1").unwrap(), 1);
    }
}
