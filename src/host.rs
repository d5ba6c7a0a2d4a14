//! Capability interfaces the core drives but does not implement.
//!
//! The browser shell owns fullscreen, the speech layer owns the microphone
//! and synthesizer, and the session controller owns persistence and
//! navigation. The core only talks to them through these traits.

use crate::ledger::WarningEvent;

/// Errors reported by the environment host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The browser refused (e.g. no user gesture)
    Denied(String),
    Unsupported,
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostError::Denied(reason) => write!(f, "Fullscreen request denied: {reason}"),
            HostError::Unsupported => write!(f, "Fullscreen is not supported"),
        }
    }
}

impl std::error::Error for HostError {}

/// Window/fullscreen control in the candidate's browser.
pub trait EnvironmentHost: Send {
    /// Ask for fullscreen. May be refused; callers treat failure as non-fatal.
    fn request_fullscreen(&mut self) -> Result<(), HostError>;

    /// Leave fullscreen programmatically.
    fn exit_fullscreen(&mut self);
}

/// Speech input/output. All calls are idempotent.
pub trait SpeechControl: Send {
    fn start_listening(&mut self);
    fn stop_listening(&mut self);
    fn speak(&mut self, text: &str);
    fn stop_speaking(&mut self);
}

/// Notifications for the session controller.
pub trait SessionObserver: Send {
    /// A debounced vision violation was counted; carries the cumulative vision strike count.
    fn on_warning(&mut self, vision_strikes: u32);

    /// Any counted violation.
    fn on_violation(&mut self, violation: &WarningEvent);

    /// The session is over. Called at most once.
    fn on_terminate(&mut self);
}

/// Host for headless runs; fullscreen always succeeds.
#[derive(Debug, Default)]
pub struct NoopHost;

impl EnvironmentHost for NoopHost {
    fn request_fullscreen(&mut self) -> Result<(), HostError> {
        Ok(())
    }

    fn exit_fullscreen(&mut self) {}
}

#[derive(Debug, Default)]
pub struct NoopSpeech;

impl SpeechControl for NoopSpeech {
    fn start_listening(&mut self) {}
    fn stop_listening(&mut self) {}
    fn speak(&mut self, _text: &str) {}
    fn stop_speaking(&mut self) {}
}

/// Observer that only logs.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl SessionObserver for LoggingObserver {
    fn on_warning(&mut self, vision_strikes: u32) {
        tracing::warn!(vision_strikes, "vision warning");
    }

    fn on_violation(&mut self, violation: &WarningEvent) {
        tracing::warn!(kind = %violation.kind, message = %violation.message, "violation");
    }

    fn on_terminate(&mut self) {
        tracing::warn!("session terminated");
    }
}
