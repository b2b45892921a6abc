//! Pomodoro cycle durations and the long-break cadence rule.

use serde::{Deserialize, Serialize};

/// Focus/break durations for one user (or the global defaults).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Focus period length in minutes.
    #[serde(default = "default_focus_min")]
    pub focus_min: u64,
    /// Short break length in minutes.
    #[serde(default = "default_break_min")]
    pub break_min: u64,
    /// Long break length in minutes.
    #[serde(default = "default_long_break_min")]
    pub long_break_min: u64,
    /// Every Nth completed focus cycle earns a long break.
    #[serde(default = "default_long_every")]
    pub long_every: u32,
}

fn default_focus_min() -> u64 {
    25
}
fn default_break_min() -> u64 {
    5
}
fn default_long_break_min() -> u64 {
    15
}
fn default_long_every() -> u32 {
    4
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            focus_min: default_focus_min(),
            break_min: default_break_min(),
            long_break_min: default_long_break_min(),
            long_every: default_long_every(),
        }
    }
}

/// The break that follows a completed focus period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakPhase {
    pub long: bool,
    pub minutes: u64,
}

impl CycleConfig {
    /// Which break follows the `completed_cycles`-th focus period.
    pub fn break_after(&self, completed_cycles: u32) -> BreakPhase {
        let long = self.long_every > 0 && completed_cycles % self.long_every == 0;
        BreakPhase {
            long,
            minutes: if long {
                self.long_break_min
            } else {
                self.break_min
            },
        }
    }
}
