//! # Studyroom Core Library
//!
//! Core business logic for the Studyroom study-habit coach. All operations
//! are available through a standalone CLI binary; any chat or GUI front end
//! is a thin layer over this same library.
//!
//! ## Architecture
//!
//! - **Ledger**: append-mostly SQLite storage for confirmations, study
//!   sessions, reports, cards, reviews and pomodoro events
//! - **SRS**: a pure SM-2 scheduler over per-card review state
//! - **Pomodoro**: a per-(user, task) focus/break timer chain driven by
//!   tokio timers, with a pluggable notifier
//! - **Points**: points and consecutive-day streak derivation
//! - **Stats**: day and week rollups composed from single-day queries
//!
//! ## Key Components
//!
//! - [`Ledger`]: persistence and single-day queries
//! - [`Config`]: TOML application configuration
//! - [`Sm2`]: the spaced-repetition algorithm
//! - [`PomodoroScheduler`]: focus/break timer state machine
//! - [`PointsEngine`]: points and streak updates

pub mod error;
pub mod points;
pub mod pomodoro;
pub mod srs;
pub mod stats;
pub mod storage;
pub mod types;

pub use error::{ConfigError, CoreError, StorageError, ValidationError};
pub use points::{milestone_reached, DoneOutcome, PointsConfig, PointsEngine};
pub use pomodoro::{BreakPhase, CycleConfig, Notifier, OutboundMessage, PomodoroScheduler};
pub use srs::{review_card, ReviewOutcome, Sm2};
pub use stats::{weekly_confirmations, weekly_sessions, WeeklyConfirmations, WeeklySessions};
pub use storage::{data_dir, CardInput, CardRow, Config, Ledger, SrsState};
pub use types::{ConfirmationStatus, LocalZone, PomodoroEventKind, TaskType};
