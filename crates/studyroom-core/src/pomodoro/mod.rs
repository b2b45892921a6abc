mod cycle;
mod notify;
mod scheduler;

pub use cycle::{BreakPhase, CycleConfig};
pub use notify::{Notifier, OutboundMessage};
pub use scheduler::PomodoroScheduler;
