//! Per-(user, task) focus/break timer chains.
//!
//! The scheduler owns a keyed registry of spawned timer tasks plus the
//! process-local completed-cycle counters. At most one timer task is live
//! per key: `start` always aborts the previous one under the registry lock
//! before spawning. Counters survive `pause` and replacement `start`s, are
//! cleared by `stop`, and are not persisted across process restarts.
//!
//! Failures inside the timer chain (ledger appends, notification delivery)
//! are logged and swallowed so the chain keeps advancing; only the initial
//! `start`/`pause`/`stop` appends surface errors to the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

use crate::error::{Result, ValidationError};
use crate::storage::Ledger;
use crate::types::{PomodoroEventKind, TaskType};

use super::cycle::CycleConfig;
use super::notify::{Notifier, OutboundMessage};

type Key = (String, TaskType);

struct Entry {
    handle: Option<JoinHandle<()>>,
    cycles: u32,
}

type Registry = Arc<Mutex<HashMap<Key, Entry>>>;

/// Drives self-perpetuating focus/break cycles until paused or stopped.
pub struct PomodoroScheduler {
    registry: Registry,
    ledger: Arc<Mutex<Ledger>>,
    notifier: Arc<dyn Notifier>,
    defaults: CycleConfig,
}

impl PomodoroScheduler {
    pub fn new(
        ledger: Arc<Mutex<Ledger>>,
        notifier: Arc<dyn Notifier>,
        defaults: CycleConfig,
    ) -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            ledger,
            notifier,
            defaults,
        }
    }

    /// Begin (or restart) the cycle chain for a (user, task) key.
    ///
    /// Any live timer for the key is cancelled first, so two rapid `start`
    /// calls leave exactly one timer running. The cycle counter for the key
    /// is kept, which is what makes `start` double as resume, albeit with
    /// a full-duration focus period.
    pub fn start(&self, user_id: &str, notify_target: &str, task: TaskType) -> Result<()> {
        let cfg = self.config_for(user_id, task)?;
        let key: Key = (user_id.to_string(), task);

        {
            let mut registry = self.registry.lock().unwrap();
            let entry = registry.entry(key.clone()).or_insert(Entry {
                handle: None,
                cycles: 0,
            });
            if let Some(handle) = entry.handle.take() {
                handle.abort();
                debug!(user_id, task = %task, "replaced live pomodoro timer");
            }
            entry.handle = Some(tokio::spawn(run_chain(
                Arc::clone(&self.registry),
                Arc::clone(&self.ledger),
                Arc::clone(&self.notifier),
                self.defaults,
                key.clone(),
                notify_target.to_string(),
            )));
        }

        self.log(user_id, task, PomodoroEventKind::StartFocus, cfg.focus_min)
    }

    /// Cancel the live timer without touching the cycle counter.
    pub fn pause(&self, user_id: &str, task: TaskType) -> Result<()> {
        self.cancel_handle(user_id, task, false)?;
        self.log_bare(user_id, task, PomodoroEventKind::Pause)
    }

    /// Cancel the live timer and forget the key entirely.
    pub fn stop(&self, user_id: &str, task: TaskType) -> Result<()> {
        self.cancel_handle(user_id, task, true)?;
        self.log_bare(user_id, task, PomodoroEventKind::Stop)
    }

    /// Whether a timer task is currently live for the key.
    pub fn is_active(&self, user_id: &str, task: TaskType) -> bool {
        let registry = self.registry.lock().unwrap();
        registry
            .get(&(user_id.to_string(), task))
            .and_then(|e| e.handle.as_ref())
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Completed focus cycles recorded for the key since the last stop.
    pub fn completed_cycles(&self, user_id: &str, task: TaskType) -> u32 {
        let registry = self.registry.lock().unwrap();
        registry
            .get(&(user_id.to_string(), task))
            .map(|e| e.cycles)
            .unwrap_or(0)
    }

    fn config_for(&self, user_id: &str, task: TaskType) -> Result<CycleConfig> {
        if task == TaskType::All {
            return Err(ValidationError::AggregateTask(task).into());
        }
        let ledger = self.ledger.lock().unwrap();
        Ok(ledger.pomodoro_config(user_id)?.unwrap_or(self.defaults))
    }

    fn cancel_handle(&self, user_id: &str, task: TaskType, forget: bool) -> Result<()> {
        if task == TaskType::All {
            return Err(ValidationError::AggregateTask(task).into());
        }
        let key = (user_id.to_string(), task);
        let mut registry = self.registry.lock().unwrap();
        if forget {
            if let Some(mut entry) = registry.remove(&key) {
                if let Some(handle) = entry.handle.take() {
                    handle.abort();
                }
            }
        } else if let Some(entry) = registry.get_mut(&key) {
            if let Some(handle) = entry.handle.take() {
                handle.abort();
            }
        }
        Ok(())
    }

    fn log(
        &self,
        user_id: &str,
        task: TaskType,
        kind: PomodoroEventKind,
        minutes: u64,
    ) -> Result<()> {
        let ledger = self.ledger.lock().unwrap();
        ledger.log_pomodoro_event(user_id, task, kind, Some(&json!({ "minutes": minutes })))?;
        Ok(())
    }

    fn log_bare(&self, user_id: &str, task: TaskType, kind: PomodoroEventKind) -> Result<()> {
        let ledger = self.ledger.lock().unwrap();
        ledger.log_pomodoro_event(user_id, task, kind, None)?;
        Ok(())
    }
}

/// The timer chain for one key: focus, break, focus, ... until aborted.
///
/// Cycle durations are re-resolved from the ledger when each focus period
/// begins, so a config change lands on the next cycle without a restart.
async fn run_chain(
    registry: Registry,
    ledger: Arc<Mutex<Ledger>>,
    notifier: Arc<dyn Notifier>,
    defaults: CycleConfig,
    key: Key,
    notify_target: String,
) {
    let (user_id, task) = (key.0.clone(), key.1);
    let mut cfg = current_config(&ledger, &user_id, defaults);
    loop {
        sleep(Duration::from_secs(cfg.focus_min * 60)).await;

        log_quiet(
            &ledger,
            &user_id,
            task,
            PomodoroEventKind::EndFocus,
            cfg.focus_min,
        );
        let completed = {
            let mut reg = registry.lock().unwrap();
            // A concurrent stop may have removed the key between the sleep
            // waking and this lock; the chain ends rather than resurrecting
            // the counter.
            match reg.get_mut(&key) {
                Some(entry) => {
                    entry.cycles += 1;
                    entry.cycles
                }
                None => return,
            }
        };
        let brk = cfg.break_after(completed);

        push_quiet(
            &notifier,
            &notify_target,
            &OutboundMessage::focus_finished(task, cfg.focus_min, &brk),
        );
        let kind = if brk.long {
            PomodoroEventKind::StartLongBreak
        } else {
            PomodoroEventKind::StartBreak
        };
        log_quiet(&ledger, &user_id, task, kind, brk.minutes);

        sleep(Duration::from_secs(brk.minutes * 60)).await;

        cfg = current_config(&ledger, &user_id, defaults);
        push_quiet(
            &notifier,
            &notify_target,
            &OutboundMessage::break_finished(task, brk.long),
        );
        log_quiet(
            &ledger,
            &user_id,
            task,
            PomodoroEventKind::StartFocus,
            cfg.focus_min,
        );
    }
}

fn current_config(
    ledger: &Arc<Mutex<Ledger>>,
    user_id: &str,
    defaults: CycleConfig,
) -> CycleConfig {
    let ledger = ledger.lock().unwrap();
    match ledger.pomodoro_config(user_id) {
        Ok(cfg) => cfg.unwrap_or(defaults),
        Err(e) => {
            warn!(user_id, error = %e, "failed to load pomodoro config, using defaults");
            defaults
        }
    }
}

fn log_quiet(
    ledger: &Arc<Mutex<Ledger>>,
    user_id: &str,
    task: TaskType,
    kind: PomodoroEventKind,
    minutes: u64,
) {
    let ledger = ledger.lock().unwrap();
    if let Err(e) =
        ledger.log_pomodoro_event(user_id, task, kind, Some(&json!({ "minutes": minutes })))
    {
        warn!(user_id, task = %task, event = kind.as_str(), error = %e, "failed to log pomodoro event");
    }
}

fn push_quiet(notifier: &Arc<dyn Notifier>, target: &str, message: &OutboundMessage) {
    if let Err(e) = notifier.push(target, message) {
        warn!(target, error = %e, "pomodoro notification failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::types::LocalZone;

    struct RecordingNotifier {
        sent: Mutex<Vec<(String, OutboundMessage)>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl Notifier for RecordingNotifier {
        fn push(&self, target: &str, message: &OutboundMessage) -> Result<()> {
            if self.fail {
                return Err(CoreError::Notify {
                    target: target.to_string(),
                    message: "unreachable".to_string(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((target.to_string(), message.clone()));
            Ok(())
        }
    }

    fn scheduler(
        cfg: CycleConfig,
        notifier: Arc<RecordingNotifier>,
    ) -> (PomodoroScheduler, Arc<Mutex<Ledger>>) {
        let ledger = Arc::new(Mutex::new(
            Ledger::open_memory(LocalZone::default()).unwrap(),
        ));
        let s = PomodoroScheduler::new(Arc::clone(&ledger), notifier, cfg);
        (s, ledger)
    }

    fn one_minute_cycles() -> CycleConfig {
        CycleConfig {
            focus_min: 1,
            break_min: 1,
            long_break_min: 2,
            long_every: 2,
        }
    }

    fn logged_kinds(ledger: &Arc<Mutex<Ledger>>, user: &str) -> Vec<PomodoroEventKind> {
        let l = ledger.lock().unwrap();
        let today = l.zone().today();
        l.pomodoro_events_for_date(today, Some(user))
            .unwrap()
            .into_iter()
            .map(|e| e.event)
            .collect()
    }

    // Let spawned timer tasks run until they park on their next sleep.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance_min(minutes: u64) {
        tokio::time::advance(Duration::from_secs(minutes * 60)).await;
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn focus_elapse_logs_end_focus_and_break() {
        let notifier = RecordingNotifier::new(false);
        let (s, ledger) = scheduler(one_minute_cycles(), Arc::clone(&notifier));
        s.start("u1", "u1", TaskType::Vocab).unwrap();
        settle().await;

        advance_min(1).await;

        assert_eq!(s.completed_cycles("u1", TaskType::Vocab), 1);
        // One focus-finished notification.
        assert_eq!(notifier.count(), 1);
        assert_eq!(
            logged_kinds(&ledger, "u1"),
            vec![
                PomodoroEventKind::StartFocus,
                PomodoroEventKind::EndFocus,
                PomodoroEventKind::StartBreak,
            ]
        );
        // Break duration in the event meta matches the configured value.
        let l = ledger.lock().unwrap();
        let events = l
            .pomodoro_events_for_date(l.zone().today(), Some("u1"))
            .unwrap();
        assert_eq!(events[2].meta.as_ref().unwrap()["minutes"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_leaves_exactly_one_live_timer() {
        let notifier = RecordingNotifier::new(false);
        let (s, _ledger) = scheduler(one_minute_cycles(), Arc::clone(&notifier));
        s.start("u1", "u1", TaskType::Vocab).unwrap();
        settle().await;
        s.start("u1", "u1", TaskType::Vocab).unwrap();
        settle().await;

        assert!(s.is_active("u1", TaskType::Vocab));
        advance_min(1).await;

        // Two timers would have produced two end-of-focus notifications.
        assert_eq!(notifier.count(), 1);
        assert_eq!(s.completed_cycles("u1", TaskType::Vocab), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn chain_self_perpetuates_and_goes_long_on_cadence() {
        let notifier = RecordingNotifier::new(false);
        let (s, ledger) = scheduler(one_minute_cycles(), Arc::clone(&notifier));
        s.start("u1", "u1", TaskType::Reading).unwrap();
        settle().await;

        // Cycle 1: focus + short break.
        advance_min(1).await; // end focus 1 -> short break (1 min)
        advance_min(1).await; // break over -> focus 2 starts
        // Cycle 2: second focus completes, cadence says long break.
        advance_min(1).await;

        assert_eq!(s.completed_cycles("u1", TaskType::Reading), 2);
        // focus1-finished, break1-finished, focus2-finished.
        assert_eq!(notifier.count(), 3);

        assert_eq!(
            logged_kinds(&ledger, "u1"),
            vec![
                PomodoroEventKind::StartFocus,
                PomodoroEventKind::EndFocus,
                PomodoroEventKind::StartBreak,
                PomodoroEventKind::StartFocus,
                PomodoroEventKind::EndFocus,
                PomodoroEventKind::StartLongBreak,
            ]
        );

        // Second break is the long one.
        let last = notifier.sent.lock().unwrap().last().unwrap().1.clone();
        assert!(last.text.contains("long break"));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_cancels_timer_but_keeps_counter() {
        let notifier = RecordingNotifier::new(false);
        let (s, _ledger) = scheduler(one_minute_cycles(), Arc::clone(&notifier));
        s.start("u1", "u1", TaskType::Grammar).unwrap();
        settle().await;
        advance_min(1).await; // complete one cycle
        assert_eq!(s.completed_cycles("u1", TaskType::Grammar), 1);

        s.pause("u1", TaskType::Grammar).unwrap();
        settle().await;
        assert!(!s.is_active("u1", TaskType::Grammar));

        // Nothing fires while paused.
        let before = notifier.count();
        advance_min(10).await;
        assert_eq!(notifier.count(), before);

        // Resume keeps the cadence position.
        assert_eq!(s.completed_cycles("u1", TaskType::Grammar), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_clears_counter_and_restart_begins_fresh() {
        let notifier = RecordingNotifier::new(false);
        let (s, _ledger) = scheduler(one_minute_cycles(), Arc::clone(&notifier));
        s.start("u1", "u1", TaskType::Vocab).unwrap();
        settle().await;
        advance_min(1).await;
        assert_eq!(s.completed_cycles("u1", TaskType::Vocab), 1);

        s.stop("u1", TaskType::Vocab).unwrap();
        settle().await;
        assert!(!s.is_active("u1", TaskType::Vocab));
        assert_eq!(s.completed_cycles("u1", TaskType::Vocab), 0);

        s.start("u1", "u1", TaskType::Vocab).unwrap();
        settle().await;
        advance_min(1).await;
        // With long_every = 2, a carried-over counter would make this the
        // long break; a fresh one keeps it short.
        let last = notifier.sent.lock().unwrap().last().unwrap().1.clone();
        assert!(last.text.contains("short break"));
    }

    #[tokio::test(start_paused = true)]
    async fn notifier_failure_does_not_break_the_chain() {
        let notifier = RecordingNotifier::new(true);
        let (s, ledger) = scheduler(one_minute_cycles(), Arc::clone(&notifier));
        s.start("u1", "u1", TaskType::Listening).unwrap();
        settle().await;

        advance_min(1).await; // focus over, notify fails
        advance_min(1).await; // break over, notify fails, next focus starts

        let summary = ledger
            .lock()
            .unwrap()
            .pomodoro_summary(1, Some("u1"))
            .unwrap();
        // The chain logged the follow-up start_focus despite failures.
        assert_eq!(summary.counts.iter().sum::<u32>(), 2);
        assert!(s.is_active("u1", TaskType::Listening));
    }

    #[tokio::test(start_paused = true)]
    async fn aggregate_task_is_rejected() {
        let notifier = RecordingNotifier::new(false);
        let (s, _ledger) = scheduler(one_minute_cycles(), notifier);
        assert!(s.start("u1", "u1", TaskType::All).is_err());
        assert!(s.pause("u1", TaskType::All).is_err());
        assert!(s.stop("u1", TaskType::All).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn config_change_applies_on_next_focus_cycle() {
        let notifier = RecordingNotifier::new(false);
        let (s, ledger) = scheduler(one_minute_cycles(), Arc::clone(&notifier));
        s.start("u1", "u1", TaskType::Vocab).unwrap();
        settle().await;

        advance_min(1).await; // focus 1 done, short break starts
        assert_eq!(s.completed_cycles("u1", TaskType::Vocab), 1);

        // Lengthen the focus period while the break is running.
        ledger
            .lock()
            .unwrap()
            .set_pomodoro_config(
                "u1",
                &CycleConfig {
                    focus_min: 3,
                    ..one_minute_cycles()
                },
            )
            .unwrap();

        advance_min(1).await; // break over, focus 2 starts at the new length
        advance_min(1).await; // the old 1-minute length would end here
        assert_eq!(s.completed_cycles("u1", TaskType::Vocab), 1);
        advance_min(2).await; // full 3 minutes elapsed
        assert_eq!(s.completed_cycles("u1", TaskType::Vocab), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn chain_ends_instead_of_resurrecting_a_stopped_key() {
        let notifier = RecordingNotifier::new(false);
        let (s, _ledger) = scheduler(one_minute_cycles(), Arc::clone(&notifier));

        // A chain whose registry key is already gone, as happens when a stop
        // lands between the focus sleep waking and the counter update.
        let key = ("u1".to_string(), TaskType::Vocab);
        let handle = tokio::spawn(run_chain(
            Arc::clone(&s.registry),
            Arc::clone(&s.ledger),
            Arc::clone(&s.notifier),
            one_minute_cycles(),
            key.clone(),
            "u1".to_string(),
        ));
        settle().await;
        advance_min(1).await;

        assert!(handle.is_finished());
        assert_eq!(s.completed_cycles("u1", TaskType::Vocab), 0);
        assert!(!s.registry.lock().unwrap().contains_key(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn per_user_config_overrides_defaults() {
        let notifier = RecordingNotifier::new(false);
        let (s, ledger) = scheduler(
            CycleConfig {
                focus_min: 25,
                break_min: 5,
                long_break_min: 15,
                long_every: 4,
            },
            Arc::clone(&notifier),
        );
        ledger
            .lock()
            .unwrap()
            .set_pomodoro_config(
                "u1",
                &CycleConfig {
                    focus_min: 1,
                    break_min: 1,
                    long_break_min: 2,
                    long_every: 4,
                },
            )
            .unwrap();
        s.start("u1", "u1", TaskType::Vocab).unwrap();
        settle().await;

        // The override's 1-minute focus elapses long before the 25-minute
        // default would have.
        advance_min(1).await;
        assert_eq!(notifier.count(), 1);
    }
}
