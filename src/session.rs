//! A single proctored session.
//!
//! `ProctorSession` owns the vision monitor and the lockdown machine, hands
//! both the same strike ledger, and relays their notifications to the
//! session controller. It is single-threaded: callers serialize inputs.

use crate::collector::types::{DetectorFrame, EnvironmentEvent, InputKind, SessionInput};
use crate::config::Config;
use crate::core::monitor::{FrameOutcome, SensorStatus, VisionMonitor, VisualMetrics};
use crate::host::{EnvironmentHost, SessionObserver, SpeechControl};
use crate::ledger::{create_shared_ledger, Registration, SharedStrikeLedger, WarningEvent};
use crate::lockdown::machine::{Disposition, LockdownMachine, LockdownTimings, Notification};
use crate::lockdown::state::LockdownState;
use crate::store::KeyValueStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything the UI needs to render the proctoring overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub access_id: String,
    pub lockdown: LockdownState,
    pub metrics: VisualMetrics,
    pub sensor: SensorStatus,
    pub feedback: Option<String>,
    pub max_violations: u32,
    pub events: Vec<WarningEvent>,
    pub session_confidence: f64,
}

pub struct ProctorSession {
    ledger: SharedStrikeLedger,
    monitor: VisionMonitor,
    lockdown: LockdownMachine,
    observer: Box<dyn SessionObserver>,
}

impl ProctorSession {
    pub fn new(
        access_id: &str,
        config: &Config,
        host: Box<dyn EnvironmentHost>,
        speech: Box<dyn SpeechControl>,
        store: Box<dyn KeyValueStore>,
        observer: Box<dyn SessionObserver>,
    ) -> Self {
        let config = config.clone().validated();
        let ledger = create_shared_ledger(access_id, config.max_warnings, config.rate_limit_ms);
        let monitor = VisionMonitor::new(config.sensitivity, ledger.clone());
        let lockdown = LockdownMachine::new(
            access_id,
            ledger.clone(),
            LockdownTimings::from_config(&config),
            host,
            speech,
            store,
        );

        tracing::info!(
            session_id = ledger.session_id(),
            access_id,
            sensitivity = %config.sensitivity,
            max_warnings = config.max_warnings,
            "session created"
        );

        Self {
            ledger,
            monitor,
            lockdown,
            observer,
        }
    }

    /// Begin the interview: enable the lockdown.
    pub fn start(&mut self) {
        self.lockdown.enable();
    }

    /// Route a timestamped input. Returns the disposition for environment events.
    pub fn apply(&mut self, input: &SessionInput) -> Option<Disposition> {
        match &input.input {
            InputKind::Frame(frame) => {
                self.process_frame(frame, input.at);
                None
            }
            InputKind::Environment(event) => Some(self.handle_event(event, input.at)),
            InputKind::DismissOverlay => {
                self.dismiss_overlay();
                None
            }
        }
    }

    /// Run the vision pipeline on one frame.
    pub fn process_frame(&mut self, frame: &DetectorFrame, now: DateTime<Utc>) -> FrameOutcome {
        self.lockdown.poll(now);
        let outcome = self.monitor.process(frame, now);

        if let FrameOutcome::Processed { violations, .. } = &outcome {
            for violation in violations {
                match violation.registration {
                    Registration::Recorded {
                        vision_count,
                        terminating,
                        ..
                    } => {
                        self.observer.on_warning(vision_count);
                        self.observer.on_violation(&WarningEvent {
                            timestamp: now,
                            kind: violation.condition.kind(),
                            message: violation.condition.message().to_string(),
                        });
                        if terminating {
                            self.lockdown.force_terminate(now);
                        }
                    }
                    Registration::Throttled { .. } => {}
                    Registration::Closed => self.lockdown.force_terminate(now),
                }
            }
        }

        self.flush();
        outcome
    }

    /// Deliver a browser event to the lockdown machine.
    pub fn handle_event(&mut self, event: &EnvironmentEvent, now: DateTime<Utc>) -> Disposition {
        self.lockdown.poll(now);
        let disposition = self.lockdown.handle(event, now);
        self.flush();
        disposition
    }

    pub fn dismiss_overlay(&mut self) {
        self.lockdown.dismiss_overlay();
    }

    /// Fire due timers. Call regularly (the server ticks every 50ms).
    pub fn poll(&mut self, now: DateTime<Utc>) {
        self.lockdown.poll(now);
        self.flush();
    }

    /// Record a camera/model start-up failure.
    pub fn mark_camera_unavailable(&mut self, reason: &str) {
        self.monitor.mark_unavailable(reason);
    }

    fn flush(&mut self) {
        for notification in self.lockdown.take_notifications() {
            match notification {
                Notification::Violation(event) => self.observer.on_violation(&event),
                Notification::Terminated => self.observer.on_terminate(),
            }
        }
    }

    pub fn ledger(&self) -> &SharedStrikeLedger {
        &self.ledger
    }

    pub fn lockdown_state(&self) -> LockdownState {
        self.lockdown.state()
    }

    pub fn metrics(&self) -> &VisualMetrics {
        self.monitor.metrics()
    }

    pub fn is_terminated(&self) -> bool {
        self.lockdown.state().terminated
    }

    /// Average confidence over the session, handed to final scoring.
    pub fn session_confidence(&self) -> f64 {
        self.monitor.session_confidence()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.ledger.session_id().to_string(),
            access_id: self.ledger.access_id().to_string(),
            lockdown: self.lockdown.state(),
            metrics: self.monitor.metrics().clone(),
            sensor: self.monitor.status().clone(),
            feedback: self.monitor.feedback().map(str::to_string),
            max_violations: self.ledger.max_violations(),
            events: self.ledger.events(),
            session_confidence: self.monitor.session_confidence(),
        }
    }
}
