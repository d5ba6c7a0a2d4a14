//! Environment lockdown state machine.
//!
//! ```text
//! Inactive ──enable──▶ Active ◀──dismiss── ViolationShown
//!                        │  ──violation──▶      │
//!                        └────── strike limit ──┴──▶ Terminated
//! ```
//!
//! Browser events arrive through `handle`; delayed actions (fullscreen grace,
//! silent re-entry, the locked-message delay) are deadlines fired by `poll`.
//! Cancelling a delayed action is clearing its deadline.

use crate::collector::types::EnvironmentEvent;
use crate::config::Config;
use crate::host::{EnvironmentHost, SpeechControl};
use crate::ledger::{Registration, SharedStrikeLedger, ViolationKind, WarningEvent};
use crate::lockdown::keys::{BlockedInput, KeyPolicy};
use crate::lockdown::state::{LockdownPhase, LockdownState};
use crate::store::{mark_blocked, KeyValueStore};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub const TAB_HIDDEN_MESSAGE: &str =
    "You switched tabs or minimized the window. This has been recorded as a violation.";
pub const FOCUS_LOST_MESSAGE: &str =
    "The interview window lost focus. This has been recorded as a violation.";
pub const FULLSCREEN_EXIT_MESSAGE: &str =
    "You exited fullscreen mode. This has been recorded as a violation.";
pub const LOCKED_MESSAGE: &str =
    "Session locked: the maximum number of violations has been reached.";

/// What the host should do with the event it just delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "reason", rename_all = "snake_case")]
pub enum Disposition {
    /// Lockdown not live; the event was not looked at
    Ignored,
    Allowed,
    /// Suppress the browser default action
    Blocked(BlockedInput),
    /// Show the leave-page confirmation
    ConfirmUnload,
}

/// Something the session controller must hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Violation(WarningEvent),
    Terminated,
}

/// Delays driving the machine.
#[derive(Debug, Clone, Copy)]
pub struct LockdownTimings {
    pub grace: Duration,
    pub reentry_delay: Duration,
    pub termination_delay: Duration,
}

impl LockdownTimings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            grace: Duration::milliseconds(config.grace_ms as i64),
            reentry_delay: Duration::milliseconds(config.reentry_delay_ms as i64),
            termination_delay: Duration::milliseconds(config.termination_delay_ms as i64),
        }
    }
}

impl Default for LockdownTimings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct LockdownMachine {
    access_id: String,
    state: LockdownState,
    /// Checked first by every handler
    enabled: bool,
    grace_deadline: Option<DateTime<Utc>>,
    reentry_at: Option<DateTime<Utc>>,
    notify_terminate_at: Option<DateTime<Utc>>,
    termination_notified: bool,
    timings: LockdownTimings,
    keys: KeyPolicy,
    ledger: SharedStrikeLedger,
    host: Box<dyn EnvironmentHost>,
    speech: Box<dyn SpeechControl>,
    store: Box<dyn KeyValueStore>,
    notifications: Vec<Notification>,
}

impl LockdownMachine {
    pub fn new(
        access_id: &str,
        ledger: SharedStrikeLedger,
        timings: LockdownTimings,
        host: Box<dyn EnvironmentHost>,
        speech: Box<dyn SpeechControl>,
        store: Box<dyn KeyValueStore>,
    ) -> Self {
        Self {
            access_id: access_id.to_string(),
            state: LockdownState::new(),
            enabled: false,
            grace_deadline: None,
            reentry_at: None,
            notify_terminate_at: None,
            termination_notified: false,
            timings,
            keys: KeyPolicy::new(),
            ledger,
            host,
            speech,
            store,
            notifications: Vec::new(),
        }
    }

    /// Begin enforcing. Fullscreen is requested; refusal is logged, not fatal.
    pub fn enable(&mut self) {
        if self.state.terminated || self.enabled {
            return;
        }
        self.enabled = true;
        self.state.phase = LockdownPhase::Active;
        tracing::info!(access_id = %self.access_id, "lockdown enabled");
        self.request_fullscreen();
    }

    /// Stop enforcing and cancel pending timers. Handlers become no-ops.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.cancel_fullscreen_timers();
        if !self.state.terminated {
            self.state.phase = LockdownPhase::Inactive;
            self.state.show_violation_overlay = false;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current state with the strike count read from the ledger.
    pub fn state(&self) -> LockdownState {
        let mut state = self.state.clone();
        state.violation_count = self.ledger.strike_count();
        state
    }

    pub fn phase(&self) -> LockdownPhase {
        self.state.phase
    }

    /// Whether a fullscreen grace period is running.
    pub fn grace_pending(&self) -> bool {
        self.grace_deadline.is_some()
    }

    /// Drain notifications for the session controller.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// React to a browser event.
    pub fn handle(&mut self, event: &EnvironmentEvent, now: DateTime<Utc>) -> Disposition {
        if !self.enabled {
            if let EnvironmentEvent::FullscreenChanged { is_fullscreen } = event {
                self.state.is_fullscreen = *is_fullscreen;
            }
            return Disposition::Ignored;
        }

        match event {
            EnvironmentEvent::FullscreenChanged { is_fullscreen } => {
                self.on_fullscreen_changed(*is_fullscreen, now);
                Disposition::Allowed
            }
            EnvironmentEvent::VisibilityChanged { hidden: true } => {
                self.record_violation(ViolationKind::TabSwitch, TAB_HIDDEN_MESSAGE, now);
                Disposition::Allowed
            }
            EnvironmentEvent::VisibilityChanged { hidden: false } => Disposition::Allowed,
            EnvironmentEvent::FocusLost => {
                self.record_violation(ViolationKind::TabSwitch, FOCUS_LOST_MESSAGE, now);
                Disposition::Allowed
            }
            EnvironmentEvent::KeyPressed(input) => match self.keys.classify(input) {
                Some(blocked) => {
                    tracing::debug!(?blocked, key = %input.key, "blocked shortcut");
                    Disposition::Blocked(blocked)
                }
                None => Disposition::Allowed,
            },
            EnvironmentEvent::ContextMenu => Disposition::Blocked(BlockedInput::ContextMenu),
            EnvironmentEvent::BeforeUnload => Disposition::ConfirmUnload,
        }
    }

    /// The candidate acknowledged the overlay.
    pub fn dismiss_overlay(&mut self) {
        if !self.enabled || self.state.phase != LockdownPhase::ViolationShown {
            return;
        }
        self.state.clear_violation();
        self.request_fullscreen();
    }

    /// Fire any deadlines that are due.
    pub fn poll(&mut self, now: DateTime<Utc>) {
        if due(self.reentry_at, now) {
            self.reentry_at = None;
            if self.enabled && !self.state.is_fullscreen {
                tracing::debug!("silent fullscreen re-entry");
                self.request_fullscreen();
            }
        }

        if due(self.grace_deadline, now) {
            self.grace_deadline = None;
            if self.enabled && !self.state.is_fullscreen {
                let registration = self.record_violation(
                    ViolationKind::FullscreenExit,
                    FULLSCREEN_EXIT_MESSAGE,
                    now,
                );
                // A sustained exit must still cost a strike once the window closes.
                if let Registration::Throttled { retry_at } = registration {
                    tracing::debug!(%retry_at, "fullscreen exit throttled, re-arming");
                    self.grace_deadline = Some(retry_at);
                }
            }
        }

        if due(self.notify_terminate_at, now) {
            self.notify_terminate_at = None;
            if !self.termination_notified {
                self.termination_notified = true;
                self.notifications.push(Notification::Terminated);
            }
        }
    }

    /// Terminate because another source took the last strike.
    pub fn force_terminate(&mut self, now: DateTime<Utc>) {
        self.terminate(now);
    }

    fn on_fullscreen_changed(&mut self, is_fullscreen: bool, now: DateTime<Utc>) {
        self.state.is_fullscreen = is_fullscreen;

        if is_fullscreen {
            if self.grace_deadline.is_some() {
                tracing::debug!("fullscreen restored within grace period");
            }
            self.cancel_fullscreen_timers();
            return;
        }

        if self.grace_deadline.is_none() {
            tracing::info!(grace_ms = self.timings.grace.num_milliseconds(), "fullscreen exited");
            self.grace_deadline = Some(now + self.timings.grace);
            self.reentry_at = Some(now + self.timings.reentry_delay);
        }
    }

    fn record_violation(
        &mut self,
        kind: ViolationKind,
        message: &str,
        now: DateTime<Utc>,
    ) -> Registration {
        let registration = self.ledger.register_violation(kind, message, now);
        match registration {
            Registration::Recorded { terminating, .. } => {
                self.notifications.push(Notification::Violation(WarningEvent {
                    timestamp: now,
                    kind,
                    message: message.to_string(),
                }));
                self.state.show_violation(message);
                if terminating {
                    self.terminate(now);
                }
            }
            Registration::Throttled { .. } => {
                // Same burst as the last strike: refresh the message only.
                self.state.violation_message = message.to_string();
            }
            Registration::Closed => self.terminate(now),
        }
        registration
    }

    fn terminate(&mut self, now: DateTime<Utc>) {
        if self.state.terminated {
            return;
        }
        tracing::warn!(access_id = %self.access_id, "strike limit reached, locking session");

        self.enabled = false;
        self.cancel_fullscreen_timers();
        self.state.lock(LOCKED_MESSAGE);

        self.speech.stop_listening();
        self.speech.stop_speaking();

        if let Err(e) = mark_blocked(self.store.as_mut(), &self.access_id) {
            tracing::error!(error = %e, "could not persist blocked flag");
        }

        // Handlers are already disabled, so the resulting fullscreen change is ignored.
        self.host.exit_fullscreen();

        self.notify_terminate_at = Some(now + self.timings.termination_delay);
    }

    fn request_fullscreen(&mut self) {
        if let Err(e) = self.host.request_fullscreen() {
            tracing::warn!(error = %e, "fullscreen request failed");
        }
    }

    fn cancel_fullscreen_timers(&mut self) {
        self.grace_deadline = None;
        self.reentry_at = None;
    }
}

fn due(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    deadline.map_or(false, |d| now >= d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::KeyInput;
    use crate::host::{HostError, NoopSpeech};
    use crate::ledger::create_shared_ledger;
    use crate::store::{is_blocked, MemoryStore, StoreError};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        fullscreen_requests: u32,
        fullscreen_exits: u32,
        stop_listening: u32,
        stop_speaking: u32,
        blocked_writes: Vec<String>,
    }

    type SharedCalls = Arc<Mutex<Calls>>;

    struct FakeHost {
        calls: SharedCalls,
        deny: bool,
    }

    impl EnvironmentHost for FakeHost {
        fn request_fullscreen(&mut self) -> Result<(), HostError> {
            self.calls.lock().unwrap().fullscreen_requests += 1;
            if self.deny {
                Err(HostError::Denied("no user gesture".to_string()))
            } else {
                Ok(())
            }
        }

        fn exit_fullscreen(&mut self) {
            self.calls.lock().unwrap().fullscreen_exits += 1;
        }
    }

    struct FakeSpeech(SharedCalls);

    impl SpeechControl for FakeSpeech {
        fn start_listening(&mut self) {}
        fn stop_listening(&mut self) {
            self.0.lock().unwrap().stop_listening += 1;
        }
        fn speak(&mut self, _text: &str) {}
        fn stop_speaking(&mut self) {
            self.0.lock().unwrap().stop_speaking += 1;
        }
    }

    struct FakeStore(SharedCalls, MemoryStore);

    impl KeyValueStore for FakeStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.1.get(key)
        }
        fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
            self.0.lock().unwrap().blocked_writes.push(key.to_string());
            self.1.set(key, value)
        }
    }

    fn t(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn machine(max: u32) -> (LockdownMachine, SharedCalls, SharedStrikeLedger) {
        machine_with(max, false)
    }

    fn machine_with(max: u32, deny: bool) -> (LockdownMachine, SharedCalls, SharedStrikeLedger) {
        let calls = SharedCalls::default();
        let ledger = create_shared_ledger("cand-1", max, 2000);
        let mut machine = LockdownMachine::new(
            "cand-1",
            ledger.clone(),
            LockdownTimings::default(),
            Box::new(FakeHost {
                calls: calls.clone(),
                deny,
            }),
            Box::new(FakeSpeech(calls.clone())),
            Box::new(FakeStore(calls.clone(), MemoryStore::new())),
        );
        machine.enable();
        machine.handle(&EnvironmentEvent::FullscreenChanged { is_fullscreen: true }, t(0));
        (machine, calls, ledger)
    }

    fn exit_fullscreen(machine: &mut LockdownMachine, at: i64) {
        machine.handle(
            &EnvironmentEvent::FullscreenChanged {
                is_fullscreen: false,
            },
            t(at),
        );
    }

    #[test]
    fn test_enable_requests_fullscreen() {
        let (machine, calls, _) = machine(3);
        assert_eq!(machine.phase(), LockdownPhase::Active);
        assert_eq!(calls.lock().unwrap().fullscreen_requests, 1);
    }

    #[test]
    fn test_fullscreen_denial_is_not_fatal() {
        let (machine, calls, _) = machine_with(3, true);
        assert!(machine.is_enabled());
        assert_eq!(machine.phase(), LockdownPhase::Active);
        assert_eq!(calls.lock().unwrap().fullscreen_requests, 1);
    }

    #[test]
    fn test_inactive_machine_ignores_events() {
        let ledger = create_shared_ledger("cand-1", 3, 2000);
        let mut machine = LockdownMachine::new(
            "cand-1",
            ledger.clone(),
            LockdownTimings::default(),
            Box::new(crate::host::NoopHost),
            Box::new(NoopSpeech),
            Box::new(MemoryStore::new()),
        );
        assert_eq!(
            machine.handle(&EnvironmentEvent::FocusLost, t(0)),
            Disposition::Ignored
        );
        assert_eq!(
            machine.handle(&EnvironmentEvent::KeyPressed(KeyInput::plain("F12")), t(0)),
            Disposition::Ignored
        );
        assert_eq!(ledger.strike_count(), 0);
    }

    #[test]
    fn test_fullscreen_restored_within_grace() {
        let (mut machine, calls, ledger) = machine(3);
        exit_fullscreen(&mut machine, 0);
        assert!(machine.grace_pending());

        machine.poll(t(300));
        assert_eq!(calls.lock().unwrap().fullscreen_requests, 2);

        machine.handle(&EnvironmentEvent::FullscreenChanged { is_fullscreen: true }, t(1000));
        machine.poll(t(1500));
        machine.poll(t(5000));
        assert_eq!(ledger.strike_count(), 0);
        assert!(!machine.grace_pending());
        assert_eq!(machine.phase(), LockdownPhase::Active);
    }

    #[test]
    fn test_sustained_fullscreen_exit_is_one_strike() {
        let (mut machine, _, ledger) = machine(3);
        exit_fullscreen(&mut machine, 0);
        // A second exit event during the grace window does not restart it.
        exit_fullscreen(&mut machine, 800);
        machine.poll(t(1499));
        assert_eq!(ledger.strike_count(), 0);
        machine.poll(t(1500));
        machine.poll(t(4000));
        assert_eq!(ledger.strike_count(), 1);

        let state = machine.state();
        assert_eq!(state.phase, LockdownPhase::ViolationShown);
        assert_eq!(state.violation_message, FULLSCREEN_EXIT_MESSAGE);
        assert_eq!(ledger.events()[0].kind, ViolationKind::FullscreenExit);
    }

    #[test]
    fn test_tab_switch_and_blur_in_same_burst_count_once() {
        let (mut machine, _, ledger) = machine(3);
        machine.handle(&EnvironmentEvent::VisibilityChanged { hidden: true }, t(0));
        machine.handle(&EnvironmentEvent::FocusLost, t(5));
        assert_eq!(ledger.strike_count(), 1);
        assert_eq!(machine.state().violation_message, FOCUS_LOST_MESSAGE);

        let notifications = machine.take_notifications();
        assert_eq!(notifications.len(), 1);
        assert!(matches!(
            &notifications[0],
            Notification::Violation(e) if e.kind == ViolationKind::TabSwitch
        ));
    }

    #[test]
    fn test_grace_expiry_inside_rate_limit_rearms() {
        let (mut machine, _, ledger) = machine(3);
        machine.handle(&EnvironmentEvent::FocusLost, t(0));
        machine.dismiss_overlay();
        exit_fullscreen(&mut machine, 100);

        machine.poll(t(1600));
        assert_eq!(ledger.strike_count(), 1);
        assert!(machine.grace_pending());

        machine.poll(t(1999));
        assert_eq!(ledger.strike_count(), 1);
        machine.poll(t(2000));
        assert_eq!(ledger.strike_count(), 2);
        assert_eq!(ledger.events()[1].kind, ViolationKind::FullscreenExit);
        assert!(!machine.grace_pending());
    }

    #[test]
    fn test_rearmed_grace_cancelled_by_restore() {
        let (mut machine, _, ledger) = machine(3);
        machine.handle(&EnvironmentEvent::FocusLost, t(0));
        exit_fullscreen(&mut machine, 100);
        machine.poll(t(1600));
        assert!(machine.grace_pending());

        machine.handle(&EnvironmentEvent::FullscreenChanged { is_fullscreen: true }, t(1800));
        machine.poll(t(5000));
        assert_eq!(ledger.strike_count(), 1);
    }

    #[test]
    fn test_dismiss_returns_to_active_and_reenters_fullscreen() {
        let (mut machine, calls, _) = machine(3);
        machine.handle(&EnvironmentEvent::FocusLost, t(0));
        assert_eq!(machine.phase(), LockdownPhase::ViolationShown);

        machine.dismiss_overlay();
        assert_eq!(machine.phase(), LockdownPhase::Active);
        assert!(!machine.state().show_violation_overlay);
        assert_eq!(calls.lock().unwrap().fullscreen_requests, 2);
    }

    #[test]
    fn test_termination_sequence() {
        let (mut machine, calls, ledger) = machine(3);
        for i in 0..3 {
            machine.handle(&EnvironmentEvent::VisibilityChanged { hidden: true }, t(i * 3000));
        }
        assert_eq!(ledger.strike_count(), 3);

        let state = machine.state();
        assert!(state.terminated);
        assert_eq!(state.phase, LockdownPhase::Terminated);
        assert_eq!(state.violation_message, LOCKED_MESSAGE);
        assert!(!machine.is_enabled());

        {
            let calls = calls.lock().unwrap();
            assert_eq!(calls.stop_listening, 1);
            assert_eq!(calls.stop_speaking, 1);
            assert_eq!(calls.fullscreen_exits, 1);
            assert_eq!(calls.blocked_writes, vec!["blocked_cand-1".to_string()]);
        }

        // Self-inflicted exit and later events are silent.
        exit_fullscreen(&mut machine, 6100);
        assert!(!machine.grace_pending());
        assert_eq!(
            machine.handle(&EnvironmentEvent::FocusLost, t(9000)),
            Disposition::Ignored
        );

        let before: Vec<_> = machine.take_notifications();
        assert!(!before.contains(&Notification::Terminated));

        machine.poll(t(6000 + 2999));
        assert!(machine.take_notifications().is_empty());
        machine.poll(t(9000));
        assert_eq!(machine.take_notifications(), vec![Notification::Terminated]);
        machine.poll(t(20000));
        assert!(machine.take_notifications().is_empty());
        assert_eq!(ledger.strike_count(), 3);
    }

    #[test]
    fn test_termination_cancels_grace_timer() {
        let (mut machine, _, ledger) = machine(1);
        exit_fullscreen(&mut machine, 0);
        machine.handle(&EnvironmentEvent::FocusLost, t(100));
        assert!(machine.state().terminated);
        assert!(!machine.grace_pending());
        machine.poll(t(5000));
        assert_eq!(ledger.strike_count(), 1);
    }

    #[test]
    fn test_force_terminate_from_vision() {
        let (mut machine, calls, ledger) = machine(1);
        let reg = ledger.register_violation(ViolationKind::FaceMissing, "gone", t(0));
        assert!(reg.is_terminating());
        machine.force_terminate(t(0));
        machine.force_terminate(t(10));
        assert_eq!(calls.lock().unwrap().blocked_writes.len(), 1);
        assert!(machine.state().terminated);
    }

    #[test]
    fn test_blocked_inputs_do_not_strike() {
        let (mut machine, _, ledger) = machine(3);
        assert_eq!(
            machine.handle(&EnvironmentEvent::KeyPressed(KeyInput::plain("F12")), t(0)),
            Disposition::Blocked(BlockedInput::DevTools)
        );
        assert_eq!(
            machine.handle(&EnvironmentEvent::ContextMenu, t(0)),
            Disposition::Blocked(BlockedInput::ContextMenu)
        );
        assert_eq!(
            machine.handle(&EnvironmentEvent::KeyPressed(KeyInput::plain("a")), t(0)),
            Disposition::Allowed
        );
        assert_eq!(
            machine.handle(&EnvironmentEvent::BeforeUnload, t(0)),
            Disposition::ConfirmUnload
        );
        assert_eq!(ledger.strike_count(), 0);
    }

    #[test]
    fn test_blocked_flag_persisted() {
        let ledger = create_shared_ledger("cand-9", 1, 2000);
        let store = crate::store::JsonFileStore::open(
            std::env::temp_dir()
                .join(format!("proctor-lockdown-{}", ledger.session_id()))
                .join("store.json"),
        )
        .unwrap();
        let mut machine = LockdownMachine::new(
            "cand-9",
            ledger,
            LockdownTimings::default(),
            Box::new(crate::host::NoopHost),
            Box::new(NoopSpeech),
            Box::new(store),
        );
        machine.enable();
        machine.handle(&EnvironmentEvent::FocusLost, t(0));
        assert!(machine.state().terminated);
        assert!(is_blocked(machine.store.as_ref(), "cand-9").unwrap());
    }
}
