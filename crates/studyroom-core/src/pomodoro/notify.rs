//! Outbound notification seam.
//!
//! The core only decides *what* to say and to *whom*; rendering and
//! transport belong to the caller's notifier implementation.

use serde::Serialize;

use crate::error::Result;
use crate::types::TaskType;

use super::cycle::BreakPhase;

/// A plain-text message plus optional quick-action hints the transport may
/// render as buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub text: String,
    pub quick_replies: Vec<String>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quick_replies: Vec::new(),
        }
    }

    /// Sent when a focus period elapses and a break begins.
    pub fn focus_finished(task: TaskType, focus_min: u64, brk: &BreakPhase) -> Self {
        let kind = if brk.long { "long break" } else { "short break" };
        Self {
            text: format!(
                "Focus on {task} done ({focus_min} min). Starting a {kind}: {} min.",
                brk.minutes
            ),
            quick_replies: vec![
                format!("{task} done"),
                format!("{task} miss"),
                format!("report {task} minutes"),
            ],
        }
    }

    /// Sent when a break elapses and the next focus period begins.
    pub fn break_finished(task: TaskType, long: bool) -> Self {
        let kind = if long { "Long break" } else { "Break" };
        Self {
            text: format!("{kind} over. Back to {task}! Reply \"{task} done\" to stop the timer."),
            quick_replies: vec![format!("{task} done"), "stop".to_string()],
        }
    }
}

/// Delivery of outbound messages to a target user id.
pub trait Notifier: Send + Sync {
    fn push(&self, target: &str, message: &OutboundMessage) -> Result<()>;
}
