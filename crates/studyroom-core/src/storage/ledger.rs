//! SQLite-backed ledger for everything the coach records.
//!
//! One `Connection`, one fixed local zone. Every mutating method is a single
//! committed statement (or one explicit transaction where an upsert and its
//! audit row must land together), so an acknowledged write survives a crash.
//!
//! Timestamps are stored as RFC 3339 strings carrying the local offset;
//! because the offset never varies, string comparison is chronological and
//! day rollups are plain text ranges.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{data_dir, Config};
use crate::error::{Result, StorageError, ValidationError};
use crate::pomodoro::CycleConfig;
use crate::types::{ConfirmationStatus, LocalZone, PomodoroEventKind, TaskType};

/// Page size for the due-card query.
const DUE_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationRow {
    pub id: i64,
    pub user_id: String,
    pub status: ConfirmationStatus,
    pub task: TaskType,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub user_id: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub duration_minutes: Option<i64>,
}

/// Done/miss tallies for one slice of the day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub done: u32,
    pub miss: u32,
}

impl StatusCounts {
    fn bump(&mut self, status: ConfirmationStatus) {
        match status {
            ConfirmationStatus::Done => self.done += 1,
            ConfirmationStatus::Miss => self.miss += 1,
        }
    }
}

/// Single-day confirmation rollup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayConfirmations {
    pub date: NaiveDate,
    pub summary: StatusCounts,
    pub by_task: BTreeMap<TaskType, StatusCounts>,
    pub count: usize,
    pub rows: Vec<ConfirmationRow>,
}

/// Single-day session rollup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySessions {
    pub date: NaiveDate,
    pub total_minutes: i64,
    pub count: usize,
    pub rows: Vec<SessionRecord>,
}

/// Cached identity snapshot, written only when supplied externally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanState {
    pub version: String,
    pub day: u32,
    pub to_user_id: Option<String>,
    pub started_at: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UserScore {
    pub points: i64,
    pub streak: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub points: i64,
    pub streak: u32,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardInput {
    pub front: String,
    pub back: Option<String>,
    pub example: Option<String>,
    pub language: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardRow {
    pub id: i64,
    pub user_id: String,
    pub front: String,
    pub back: Option<String>,
    pub example: Option<String>,
    pub language: Option<String>,
    pub tags: Option<String>,
    pub created_at: String,
}

/// Scheduling state for one (card, user) pair. Mutated only through
/// [`Ledger::commit_review`]; a fresh card starts immediately due.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrsState {
    pub ease: f64,
    pub interval_days: i64,
    pub reps: u32,
    pub lapses: u32,
    pub due: Option<String>,
    pub last_grade: Option<u8>,
}

impl Default for SrsState {
    fn default() -> Self {
        Self {
            ease: 2.5,
            interval_days: 0,
            reps: 0,
            lapses: 0,
            due: None,
            last_grade: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PomodoroEventRow {
    pub id: i64,
    pub user_id: String,
    pub task: TaskType,
    pub event: PomodoroEventKind,
    pub at: String,
    pub meta: Option<serde_json::Value>,
}

/// N-day pomodoro rollup: one completed-focus count per date, plus per-task
/// totals across the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PomodoroSummary {
    pub dates: Vec<NaiveDate>,
    pub counts: Vec<u32>,
    pub by_task: BTreeMap<TaskType, u32>,
}

/// The durable ledger.
pub struct Ledger {
    conn: Connection,
    zone: LocalZone,
}

impl Ledger {
    /// Open the ledger at `~/.config/studyroom/studyroom.db`.
    pub fn open(config: &Config) -> Result<Self> {
        let path = data_dir()?.join("studyroom.db");
        Self::open_at(&path, config.zone())
    }

    /// Open the ledger at an explicit path.
    pub fn open_at(path: &Path, zone: LocalZone) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let ledger = Self { conn, zone };
        ledger.migrate()?;
        Ok(ledger)
    }

    /// Open an in-memory ledger (for tests).
    #[cfg(test)]
    pub fn open_memory(zone: LocalZone) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        let ledger = Self { conn, zone };
        ledger.migrate()?;
        Ok(ledger)
    }

    pub fn zone(&self) -> LocalZone {
        self.zone
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS confirmations (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id    TEXT NOT NULL,
                    status     TEXT NOT NULL CHECK(status IN ('done', 'miss')),
                    task       TEXT NOT NULL DEFAULT 'all',
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS study_sessions (
                    id               INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id          TEXT NOT NULL,
                    started_at       TEXT NOT NULL,
                    ended_at         TEXT,
                    duration_minutes INTEGER
                );

                CREATE TABLE IF NOT EXISTS task_minutes (
                    id      INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    date    TEXT NOT NULL,
                    task    TEXT NOT NULL,
                    minutes INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS task_progress (
                    id      INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    date    TEXT NOT NULL,
                    task    TEXT NOT NULL,
                    metric  TEXT NOT NULL,
                    amount  INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS pomodoro_events (
                    id      INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    task    TEXT NOT NULL,
                    event   TEXT NOT NULL,
                    at      TEXT NOT NULL,
                    meta    TEXT
                );

                CREATE TABLE IF NOT EXISTS pomodoro_user_config (
                    user_id        TEXT PRIMARY KEY,
                    focus_min      INTEGER NOT NULL,
                    break_min      INTEGER NOT NULL,
                    long_break_min INTEGER NOT NULL,
                    long_every     INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS cards (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id    TEXT NOT NULL,
                    front      TEXT NOT NULL,
                    back       TEXT,
                    example    TEXT,
                    language   TEXT,
                    tags       TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS srs (
                    card_id       INTEGER NOT NULL,
                    user_id       TEXT NOT NULL,
                    ease          REAL NOT NULL DEFAULT 2.5,
                    interval_days INTEGER NOT NULL DEFAULT 0,
                    reps          INTEGER NOT NULL DEFAULT 0,
                    lapses        INTEGER NOT NULL DEFAULT 0,
                    due           TEXT,
                    last_grade    INTEGER,
                    PRIMARY KEY (card_id, user_id)
                );

                CREATE TABLE IF NOT EXISTS reviews (
                    id              INTEGER PRIMARY KEY AUTOINCREMENT,
                    card_id         INTEGER NOT NULL,
                    user_id         TEXT NOT NULL,
                    reviewed_at     TEXT NOT NULL,
                    grade           INTEGER NOT NULL,
                    interval_before INTEGER,
                    interval_after  INTEGER,
                    ease_after      REAL
                );

                CREATE TABLE IF NOT EXISTS users (
                    user_id             TEXT PRIMARY KEY,
                    points              INTEGER NOT NULL DEFAULT 0,
                    streak              INTEGER NOT NULL DEFAULT 0,
                    last_full_done_date TEXT
                );

                CREATE TABLE IF NOT EXISTS user_profiles (
                    user_id      TEXT PRIMARY KEY,
                    display_name TEXT,
                    picture_url  TEXT,
                    updated_at   TEXT
                );

                CREATE TABLE IF NOT EXISTS plan_state (
                    version    TEXT PRIMARY KEY,
                    day        INTEGER NOT NULL,
                    to_user_id TEXT,
                    started_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_confirmations_user_created
                    ON confirmations(user_id, created_at);
                CREATE INDEX IF NOT EXISTS idx_sessions_user_ended
                    ON study_sessions(user_id, ended_at);
                CREATE INDEX IF NOT EXISTS idx_pomodoro_events_at
                    ON pomodoro_events(at);
                CREATE INDEX IF NOT EXISTS idx_srs_due
                    ON srs(user_id, due);",
            )
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        Ok(())
    }

    fn day_range(&self, date: NaiveDate) -> (String, String) {
        (
            self.zone.start_of_day(date).to_rfc3339(),
            self.zone.end_of_day(date).to_rfc3339(),
        )
    }

    // ── Confirmations ────────────────────────────────────────────────

    /// Append a done/miss confirmation stamped with the local time.
    pub fn record_confirmation(
        &self,
        user_id: &str,
        status: ConfirmationStatus,
        task: TaskType,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO confirmations (user_id, status, task, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                user_id,
                status.as_str(),
                task.as_str(),
                self.zone.now().to_rfc3339()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Single-day confirmation rollup, optionally filtered to one user.
    pub fn confirmations_for_date(
        &self,
        date: NaiveDate,
        user_id: Option<&str>,
    ) -> Result<DayConfirmations> {
        let (start, end) = self.day_range(date);
        let mut rows: Vec<ConfirmationRow> = Vec::new();
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(i64, String, String, String, String)> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
            ))
        };
        let raw: Vec<(i64, String, String, String, String)> = match user_id {
            Some(uid) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, user_id, status, task, created_at FROM confirmations
                     WHERE user_id = ?1 AND created_at >= ?2 AND created_at <= ?3
                     ORDER BY created_at ASC",
                )?;
                let iter = stmt.query_map(params![uid, start, end], map_row)?;
                iter.collect::<rusqlite::Result<_>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, user_id, status, task, created_at FROM confirmations
                     WHERE created_at >= ?1 AND created_at <= ?2
                     ORDER BY created_at ASC",
                )?;
                let iter = stmt.query_map(params![start, end], map_row)?;
                iter.collect::<rusqlite::Result<_>>()?
            }
        };
        for (id, user_id, status, task, created_at) in raw {
            rows.push(ConfirmationRow {
                id,
                user_id,
                status: parse_column(&status, "confirmations.status")?,
                task: parse_column(&task, "confirmations.task")?,
                created_at,
            });
        }

        let mut summary = StatusCounts::default();
        let mut by_task: BTreeMap<TaskType, StatusCounts> = BTreeMap::new();
        for row in &rows {
            summary.bump(row.status);
            by_task.entry(row.task).or_default().bump(row.status);
        }
        Ok(DayConfirmations {
            date,
            summary,
            by_task,
            count: rows.len(),
            rows,
        })
    }

    // ── Study sessions ───────────────────────────────────────────────

    /// Append an open session. Deliberately does not check whether another
    /// session is already open for the user.
    pub fn start_session(&self, user_id: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO study_sessions (user_id, started_at) VALUES (?1, ?2)",
            params![user_id, self.zone.now().to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Close the most recent open session for the user, computing its
    /// duration in whole minutes (at least 1). Idempotent: returns
    /// `Ok(None)` when nothing is open.
    pub fn end_latest_open_session(&self, user_id: &str) -> Result<Option<SessionRecord>> {
        let open: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT id, started_at FROM study_sessions
                 WHERE user_id = ?1 AND ended_at IS NULL
                 ORDER BY id DESC LIMIT 1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((id, started_at)) = open else {
            return Ok(None);
        };

        let started = parse_timestamp(&started_at)?;
        let now = self.zone.now();
        let elapsed_ms = (now - started).num_milliseconds();
        let duration_minutes = ((elapsed_ms as f64) / 60_000.0).round().max(1.0) as i64;
        let ended_at = now.to_rfc3339();
        self.conn.execute(
            "UPDATE study_sessions SET ended_at = ?1, duration_minutes = ?2 WHERE id = ?3",
            params![ended_at, duration_minutes, id],
        )?;
        Ok(Some(SessionRecord {
            id,
            user_id: user_id.to_string(),
            started_at,
            ended_at: Some(ended_at),
            duration_minutes: Some(duration_minutes),
        }))
    }

    /// Single-day session rollup. A session belongs to the day if it started
    /// or ended inside it.
    pub fn sessions_for_date(&self, date: NaiveDate, user_id: Option<&str>) -> Result<DaySessions> {
        let (start, end) = self.day_range(date);
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<SessionRecord> {
            Ok(SessionRecord {
                id: row.get(0)?,
                user_id: row.get(1)?,
                started_at: row.get(2)?,
                ended_at: row.get(3)?,
                duration_minutes: row.get(4)?,
            })
        };
        let rows: Vec<SessionRecord> = match user_id {
            Some(uid) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, user_id, started_at, ended_at, duration_minutes
                     FROM study_sessions
                     WHERE user_id = ?1 AND ((started_at >= ?2 AND started_at <= ?3)
                        OR (ended_at >= ?2 AND ended_at <= ?3))
                     ORDER BY id ASC",
                )?;
                let iter = stmt.query_map(params![uid, start, end], map_row)?;
                iter.collect::<rusqlite::Result<_>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, user_id, started_at, ended_at, duration_minutes
                     FROM study_sessions
                     WHERE (started_at >= ?1 AND started_at <= ?2)
                        OR (ended_at >= ?1 AND ended_at <= ?2)
                     ORDER BY id ASC",
                )?;
                let iter = stmt.query_map(params![start, end], map_row)?;
                iter.collect::<rusqlite::Result<_>>()?
            }
        };
        let total_minutes = rows.iter().filter_map(|r| r.duration_minutes).sum();
        Ok(DaySessions {
            date,
            total_minutes,
            count: rows.len(),
            rows,
        })
    }

    // ── Manual reports ───────────────────────────────────────────────

    /// Append a manual minutes report for today. Rejects non-positive
    /// minutes before writing anything.
    pub fn report_minutes(&self, user_id: &str, task: TaskType, minutes: i64) -> Result<i64> {
        if minutes <= 0 {
            return Err(ValidationError::NonPositiveAmount {
                field: "minutes",
                value: minutes,
            }
            .into());
        }
        self.conn.execute(
            "INSERT INTO task_minutes (user_id, date, task, minutes) VALUES (?1, ?2, ?3, ?4)",
            params![
                user_id,
                self.zone.today().to_string(),
                task.as_str(),
                minutes
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Append a manual progress report (e.g. "20 words") for today.
    pub fn report_progress(
        &self,
        user_id: &str,
        task: TaskType,
        metric: &str,
        amount: i64,
    ) -> Result<i64> {
        if amount <= 0 {
            return Err(ValidationError::NonPositiveAmount {
                field: "amount",
                value: amount,
            }
            .into());
        }
        self.conn.execute(
            "INSERT INTO task_progress (user_id, date, task, metric, amount)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                self.zone.today().to_string(),
                task.as_str(),
                metric,
                amount
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    // ── Users, profiles, plan ────────────────────────────────────────

    /// Every user id that has ever confirmed a task or started a session.
    pub fn distinct_user_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT user_id FROM confirmations
             UNION SELECT DISTINCT user_id FROM study_sessions
             ORDER BY user_id ASC",
        )?;
        let iter = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(iter.collect::<rusqlite::Result<_>>()?)
    }

    /// Cache an externally fetched identity snapshot.
    pub fn upsert_profile(
        &self,
        user_id: &str,
        display_name: Option<&str>,
        picture_url: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO user_profiles (user_id, display_name, picture_url, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                display_name = excluded.display_name,
                picture_url = excluded.picture_url,
                updated_at = excluded.updated_at",
            params![
                user_id,
                display_name,
                picture_url,
                self.zone.now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn profiles_map(&self) -> Result<BTreeMap<String, Profile>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id, display_name, picture_url FROM user_profiles")?;
        let iter = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                Profile {
                    display_name: row.get(1)?,
                    picture_url: row.get(2)?,
                },
            ))
        })?;
        Ok(iter.collect::<rusqlite::Result<_>>()?)
    }

    /// Upsert the current study-plan position for a plan version.
    pub fn set_plan_state(&self, version: &str, day: u32, to_user_id: Option<&str>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO plan_state (version, day, to_user_id, started_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(version) DO UPDATE SET
                day = excluded.day,
                to_user_id = excluded.to_user_id,
                started_at = excluded.started_at",
            params![version, day, to_user_id, self.zone.now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// `None` when the plan version has never been configured.
    pub fn plan_state(&self, version: &str) -> Result<Option<PlanState>> {
        Ok(self
            .conn
            .query_row(
                "SELECT version, day, to_user_id, started_at FROM plan_state WHERE version = ?1",
                params![version],
                |row| {
                    Ok(PlanState {
                        version: row.get(0)?,
                        day: row.get(1)?,
                        to_user_id: row.get(2)?,
                        started_at: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    /// Bump the plan day, clamped at `max_day`. An unconfigured plan starts
    /// from day 1, so the first advance lands on day 2.
    pub fn advance_plan_day(&self, version: &str, max_day: u32) -> Result<u32> {
        let current = self.plan_state(version)?;
        let next = current
            .as_ref()
            .map(|p| p.day)
            .unwrap_or(1)
            .saturating_add(1)
            .min(max_day);
        self.set_plan_state(version, next, current.and_then(|p| p.to_user_id).as_deref())?;
        Ok(next)
    }

    // ── Points & streaks (written by the points engine) ──────────────

    /// Add points to a user's total, creating the row lazily. Returns the
    /// new total.
    pub fn add_points(&self, user_id: &str, delta: i64) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO users (user_id, points, streak) VALUES (?1, ?2, 0)
             ON CONFLICT(user_id) DO UPDATE SET points = users.points + excluded.points",
            params![user_id, delta],
        )?;
        Ok(self.conn.query_row(
            "SELECT points FROM users WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?)
    }

    pub fn points_and_streak(&self, user_id: &str) -> Result<UserScore> {
        Ok(self
            .conn
            .query_row(
                "SELECT points, streak FROM users WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(UserScore {
                        points: row.get(0)?,
                        streak: row.get(1)?,
                    })
                },
            )
            .optional()?
            .unwrap_or_default())
    }

    /// Current streak and the date of the last full-done day, if any.
    pub fn streak_state(&self, user_id: &str) -> Result<(u32, Option<NaiveDate>)> {
        let row: Option<(u32, Option<String>)> = self
            .conn
            .query_row(
                "SELECT streak, last_full_done_date FROM users WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match row {
            Some((streak, Some(date))) => {
                let parsed = date.parse::<NaiveDate>().map_err(|e| {
                    StorageError::QueryFailed(format!("bad last_full_done_date '{date}': {e}"))
                })?;
                Ok((streak, Some(parsed)))
            }
            Some((streak, None)) => Ok((streak, None)),
            None => Ok((0, None)),
        }
    }

    pub fn set_streak(&self, user_id: &str, streak: u32, last_full_done: NaiveDate) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (user_id, points, streak, last_full_done_date)
             VALUES (?1, 0, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                streak = excluded.streak,
                last_full_done_date = excluded.last_full_done_date",
            params![user_id, streak, last_full_done.to_string()],
        )?;
        Ok(())
    }

    /// All users ordered by points desc, streak desc, user id asc, with
    /// cached display names joined in.
    pub fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT u.user_id, u.points, u.streak, p.display_name
             FROM users u LEFT JOIN user_profiles p ON p.user_id = u.user_id
             ORDER BY u.points DESC, u.streak DESC, u.user_id ASC",
        )?;
        let iter = stmt.query_map([], |row| {
            Ok(LeaderboardEntry {
                user_id: row.get(0)?,
                points: row.get(1)?,
                streak: row.get(2)?,
                display_name: row.get(3)?,
            })
        })?;
        Ok(iter.collect::<rusqlite::Result<_>>()?)
    }

    // ── Pomodoro persistence ─────────────────────────────────────────

    /// Append a pomodoro phase event. The `all` aggregate is not a timer
    /// key, so it is rejected here.
    pub fn log_pomodoro_event(
        &self,
        user_id: &str,
        task: TaskType,
        kind: PomodoroEventKind,
        meta: Option<&serde_json::Value>,
    ) -> Result<i64> {
        if task == TaskType::All {
            return Err(ValidationError::AggregateTask(task).into());
        }
        let meta_text = meta.map(serde_json::to_string).transpose()?;
        self.conn.execute(
            "INSERT INTO pomodoro_events (user_id, task, event, at, meta)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                task.as_str(),
                kind.as_str(),
                self.zone.now().to_rfc3339(),
                meta_text
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn set_pomodoro_config(&self, user_id: &str, cfg: &CycleConfig) -> Result<()> {
        self.conn.execute(
            "INSERT INTO pomodoro_user_config (user_id, focus_min, break_min, long_break_min, long_every)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                focus_min = excluded.focus_min,
                break_min = excluded.break_min,
                long_break_min = excluded.long_break_min,
                long_every = excluded.long_every",
            params![user_id, cfg.focus_min, cfg.break_min, cfg.long_break_min, cfg.long_every],
        )?;
        Ok(())
    }

    /// Per-user cycle override; `None` means fall back to global defaults.
    pub fn pomodoro_config(&self, user_id: &str) -> Result<Option<CycleConfig>> {
        Ok(self
            .conn
            .query_row(
                "SELECT focus_min, break_min, long_break_min, long_every
                 FROM pomodoro_user_config WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(CycleConfig {
                        focus_min: row.get(0)?,
                        break_min: row.get(1)?,
                        long_break_min: row.get(2)?,
                        long_every: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    /// All pomodoro events for one local day, oldest first.
    pub fn pomodoro_events_for_date(
        &self,
        date: NaiveDate,
        user_id: Option<&str>,
    ) -> Result<Vec<PomodoroEventRow>> {
        let (start, end) = self.day_range(date);
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(i64, String, String, String, String, Option<String>)> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        };
        let raw: Vec<(i64, String, String, String, String, Option<String>)> = match user_id {
            Some(uid) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, user_id, task, event, at, meta FROM pomodoro_events
                     WHERE user_id = ?1 AND at >= ?2 AND at <= ?3 ORDER BY id ASC",
                )?;
                let iter = stmt.query_map(params![uid, start, end], map_row)?;
                iter.collect::<rusqlite::Result<_>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, user_id, task, event, at, meta FROM pomodoro_events
                     WHERE at >= ?1 AND at <= ?2 ORDER BY id ASC",
                )?;
                let iter = stmt.query_map(params![start, end], map_row)?;
                iter.collect::<rusqlite::Result<_>>()?
            }
        };
        let mut rows = Vec::with_capacity(raw.len());
        for (id, user_id, task, event, at, meta) in raw {
            rows.push(PomodoroEventRow {
                id,
                user_id,
                task: parse_column(&task, "pomodoro_events.task")?,
                event: parse_column(&event, "pomodoro_events.event")?,
                at,
                meta: meta.map(|m| serde_json::from_str(&m)).transpose()?,
            });
        }
        Ok(rows)
    }

    /// Count completed focus starts per local day over the trailing window
    /// ending today.
    pub fn pomodoro_summary(&self, days: u32, user_id: Option<&str>) -> Result<PomodoroSummary> {
        let days = days.max(1);
        let today = self.zone.today();
        let first = today - chrono::Duration::days(days as i64 - 1);
        let start = self.zone.start_of_day(first).to_rfc3339();
        let end = self.zone.end_of_day(today).to_rfc3339();

        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, String)> {
            Ok((row.get(0)?, row.get(1)?))
        };
        let raw: Vec<(String, String)> = match user_id {
            Some(uid) => {
                let mut stmt = self.conn.prepare(
                    "SELECT task, at FROM pomodoro_events
                     WHERE event = 'start_focus' AND user_id = ?1 AND at >= ?2 AND at <= ?3",
                )?;
                let iter = stmt.query_map(params![uid, start, end], map_row)?;
                iter.collect::<rusqlite::Result<_>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT task, at FROM pomodoro_events
                     WHERE event = 'start_focus' AND at >= ?1 AND at <= ?2",
                )?;
                let iter = stmt.query_map(params![start, end], map_row)?;
                iter.collect::<rusqlite::Result<_>>()?
            }
        };

        let dates: Vec<NaiveDate> = (0..days)
            .map(|i| first + chrono::Duration::days(i as i64))
            .collect();
        let mut counts = vec![0u32; days as usize];
        let mut by_task: BTreeMap<TaskType, u32> = TaskType::CANONICAL
            .iter()
            .map(|t| (*t, 0))
            .collect();
        for (task, at) in raw {
            let date = parse_timestamp(&at)?.date_naive();
            if let Some(idx) = dates.iter().position(|d| *d == date) {
                counts[idx] += 1;
            }
            let task: TaskType = parse_column(&task, "pomodoro_events.task")?;
            *by_task.entry(task).or_insert(0) += 1;
        }
        Ok(PomodoroSummary {
            dates,
            counts,
            by_task,
        })
    }

    // ── Cards & SRS ──────────────────────────────────────────────────

    /// Insert a card and its initial SRS row (due at the end of today) in
    /// one transaction.
    pub fn create_card(&mut self, user_id: &str, input: &CardInput) -> Result<CardRow> {
        let created_at = self.zone.now().to_rfc3339();
        let due = self.zone.end_of_day(self.zone.today()).to_rfc3339();
        let tx = self.conn.transaction().map_err(StorageError::from)?;
        tx.execute(
            "INSERT INTO cards (user_id, front, back, example, language, tags, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user_id,
                input.front,
                input.back,
                input.example,
                input.language,
                input.tags,
                created_at
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO srs (card_id, user_id, ease, interval_days, reps, lapses, due, last_grade)
             VALUES (?1, ?2, 2.5, 0, 0, 0, ?3, NULL)",
            params![id, user_id, due],
        )?;
        tx.commit().map_err(StorageError::from)?;
        Ok(CardRow {
            id,
            user_id: user_id.to_string(),
            front: input.front.clone(),
            back: input.back.clone(),
            example: input.example.clone(),
            language: input.language.clone(),
            tags: input.tags.clone(),
            created_at,
        })
    }

    /// Cards due on or before the end of `date`, oldest due first, capped
    /// at one page.
    pub fn due_cards(&self, user_id: &str, date: NaiveDate) -> Result<Vec<CardRow>> {
        let end = self.zone.end_of_day(date).to_rfc3339();
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.user_id, c.front, c.back, c.example, c.language, c.tags, c.created_at
             FROM cards c JOIN srs s ON c.id = s.card_id AND c.user_id = s.user_id
             WHERE c.user_id = ?1 AND (s.due IS NULL OR s.due <= ?2)
             ORDER BY s.due ASC, c.id ASC
             LIMIT ?3",
        )?;
        let iter = stmt.query_map(params![user_id, end, DUE_PAGE_SIZE], map_card)?;
        Ok(iter.collect::<rusqlite::Result<_>>()?)
    }

    /// Most recently created cards, newest first.
    pub fn recent_cards(&self, user_id: Option<&str>, limit: u32) -> Result<Vec<CardRow>> {
        let limit = limit.clamp(1, 500);
        match user_id {
            Some(uid) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, user_id, front, back, example, language, tags, created_at
                     FROM cards WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
                )?;
                let iter = stmt.query_map(params![uid, limit], map_card)?;
                Ok(iter.collect::<rusqlite::Result<_>>()?)
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, user_id, front, back, example, language, tags, created_at
                     FROM cards ORDER BY id DESC LIMIT ?1",
                )?;
                let iter = stmt.query_map(params![limit], map_card)?;
                Ok(iter.collect::<rusqlite::Result<_>>()?)
            }
        }
    }

    /// Scheduling state for a (card, user) pair; `None` when the card has
    /// never been seen for this user.
    pub fn srs_state(&self, card_id: i64, user_id: &str) -> Result<Option<SrsState>> {
        Ok(self
            .conn
            .query_row(
                "SELECT ease, interval_days, reps, lapses, due, last_grade
                 FROM srs WHERE card_id = ?1 AND user_id = ?2",
                params![card_id, user_id],
                |row| {
                    Ok(SrsState {
                        ease: row.get(0)?,
                        interval_days: row.get(1)?,
                        reps: row.get(2)?,
                        lapses: row.get(3)?,
                        due: row.get(4)?,
                        last_grade: row.get(5)?,
                    })
                },
            )
            .optional()?)
    }

    /// Upsert the post-review SRS state and append the audit row in one
    /// transaction, so readers never see one without the other.
    pub fn commit_review(
        &mut self,
        card_id: i64,
        user_id: &str,
        state: &SrsState,
        grade: u8,
        interval_before: i64,
    ) -> Result<()> {
        let reviewed_at = self.zone.now().to_rfc3339();
        let tx = self.conn.transaction().map_err(StorageError::from)?;
        tx.execute(
            "INSERT INTO srs (card_id, user_id, ease, interval_days, reps, lapses, due, last_grade)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(card_id, user_id) DO UPDATE SET
                ease = excluded.ease,
                interval_days = excluded.interval_days,
                reps = excluded.reps,
                lapses = excluded.lapses,
                due = excluded.due,
                last_grade = excluded.last_grade",
            params![
                card_id,
                user_id,
                state.ease,
                state.interval_days,
                state.reps,
                state.lapses,
                state.due,
                state.last_grade
            ],
        )?;
        tx.execute(
            "INSERT INTO reviews (card_id, user_id, reviewed_at, grade, interval_before, interval_after, ease_after)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                card_id,
                user_id,
                reviewed_at,
                grade,
                interval_before,
                state.interval_days,
                state.ease
            ],
        )?;
        tx.commit().map_err(StorageError::from)?;
        Ok(())
    }

    /// Number of review audit rows for a user (all cards).
    pub fn review_count(&self, user_id: &str) -> Result<u32> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM reviews WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?)
    }
}

fn map_card(row: &rusqlite::Row<'_>) -> rusqlite::Result<CardRow> {
    Ok(CardRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        front: row.get(2)?,
        back: row.get(3)?,
        example: row.get(4)?,
        language: row.get(5)?,
        tags: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw)
        .map_err(|e| StorageError::QueryFailed(format!("bad timestamp '{raw}': {e}")).into())
}

fn parse_column<T: std::str::FromStr<Err = String>>(raw: &str, column: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|e| StorageError::QueryFailed(format!("bad {column}: {e}")).into())
}
